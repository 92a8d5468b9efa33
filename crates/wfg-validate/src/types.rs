use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DefinitionKind {
    Workflow,
    Policy,
    SkillMapping,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warn,
    Fail,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(alias = "rule_id")]
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Finding {
    pub fn fail(rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity: Severity::Fail,
            message: message.into(),
            location: None,
        }
    }

    pub fn warn(rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity: Severity::Warn,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// A parsed definition document, already classified.
#[derive(Clone, Debug)]
pub struct LintInput {
    pub file_name: String,
    pub kind: DefinitionKind,
    pub doc: Value,
}

/// Findings for one file, split by severity.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file: String,
    #[serde(default)]
    pub kind: Option<DefinitionKind>,
    pub violations: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl FileReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LintSummary {
    pub valid: bool,
    pub violations: Vec<FileReport>,
    pub warnings: Vec<FileReport>,
    pub checked_files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn findings_share_the_report_casing() {
        let report = FileReport {
            file: "wf.yaml".to_string(),
            kind: Some(DefinitionKind::SkillMapping),
            violations: vec![Finding::fail("steps_present", "no steps").at("steps")],
            warnings: vec![],
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["violations"][0]["ruleId"], "steps_present");
        assert_eq!(v["kind"], "skillMapping");
        assert!(v["violations"][0].get("rule_id").is_none());

        let legacy: Finding = serde_json::from_value(json!({"rule_id": "x", "severity": "warn", "message": "m"})).unwrap();
        assert_eq!(legacy.rule_id, "x");
    }
}
