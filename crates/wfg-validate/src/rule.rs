use serde_json::Value;

use crate::types::{DefinitionKind, Finding, LintInput};

pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn applies_to(&self, kind: DefinitionKind) -> bool;
    fn eval(&self, input: &LintInput) -> Vec<Finding>;
}

/// Absent, null, false, zero and the empty string all count as unset.
pub fn is_unset(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

fn items<'a>(doc: &'a Value, key: &str) -> &'a [Value] {
    doc.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn required_fields(kind: DefinitionKind) -> &'static [&'static str] {
    match kind {
        DefinitionKind::Workflow => &["name", "phases"],
        DefinitionKind::Policy => &["name", "rules"],
        DefinitionKind::SkillMapping => &["mappings"],
    }
}

fn recommended_fields(kind: DefinitionKind) -> &'static [&'static str] {
    match kind {
        DefinitionKind::Workflow | DefinitionKind::Policy => &["version", "description"],
        DefinitionKind::SkillMapping => &[],
    }
}

pub struct RequiredFieldsRule;

impl Rule for RequiredFieldsRule {
    fn id(&self) -> &str {
        "missing_required"
    }

    fn applies_to(&self, _kind: DefinitionKind) -> bool {
        true
    }

    fn eval(&self, input: &LintInput) -> Vec<Finding> {
        required_fields(input.kind)
            .iter()
            .filter(|f| is_unset(input.doc.get(**f)))
            .map(|f| Finding::fail(self.id(), format!("required field `{f}` is missing")).at(*f))
            .collect()
    }
}

pub struct RecommendedFieldsRule;

impl Rule for RecommendedFieldsRule {
    fn id(&self) -> &str {
        "missing_recommended"
    }

    fn applies_to(&self, kind: DefinitionKind) -> bool {
        kind != DefinitionKind::SkillMapping
    }

    fn eval(&self, input: &LintInput) -> Vec<Finding> {
        recommended_fields(input.kind)
            .iter()
            .filter(|f| is_unset(input.doc.get(**f)))
            .map(|f| Finding::warn(self.id(), format!("recommended field `{f}` is missing")).at(*f))
            .collect()
    }
}

pub struct PhaseNameRule;

impl Rule for PhaseNameRule {
    fn id(&self) -> &str {
        "missing_phase_name"
    }

    fn applies_to(&self, kind: DefinitionKind) -> bool {
        kind == DefinitionKind::Workflow
    }

    fn eval(&self, input: &LintInput) -> Vec<Finding> {
        items(&input.doc, "phases")
            .iter()
            .enumerate()
            .filter(|(_, p)| is_unset(p.get("name")))
            .map(|(i, _)| Finding::fail(self.id(), format!("phases[{i}] has no name")).at(format!("phases[{i}]")))
            .collect()
    }
}

pub struct MappingFieldsRule;

impl Rule for MappingFieldsRule {
    fn id(&self) -> &str {
        "missing_mapping_field"
    }

    fn applies_to(&self, kind: DefinitionKind) -> bool {
        kind == DefinitionKind::SkillMapping
    }

    fn eval(&self, input: &LintInput) -> Vec<Finding> {
        let mut out = Vec::new();
        for (i, mapping) in items(&input.doc, "mappings").iter().enumerate() {
            for field in ["name", "required_skills"] {
                if is_unset(mapping.get(field)) {
                    out.push(
                        Finding::fail(self.id(), format!("mappings[{i}] is missing `{field}`"))
                            .at(format!("mappings[{i}].{field}")),
                    );
                }
            }
        }
        out
    }
}

/// Softer checks on skill mappings: empty skill lists, missing triggers,
/// negative priorities and the `block_on_missing_skill` setting.
pub struct SkillMappingHygieneRule;

impl SkillMappingHygieneRule {
    fn non_empty(v: Option<&Value>) -> bool {
        v.and_then(Value::as_array).is_some_and(|a| !a.is_empty())
    }
}

impl Rule for SkillMappingHygieneRule {
    fn id(&self) -> &str {
        "skill_mapping"
    }

    fn applies_to(&self, kind: DefinitionKind) -> bool {
        kind == DefinitionKind::SkillMapping
    }

    fn eval(&self, input: &LintInput) -> Vec<Finding> {
        let mut out = Vec::new();
        for (i, m) in items(&input.doc, "mappings").iter().enumerate() {
            let name = m.get("name").and_then(Value::as_str).unwrap_or("?");
            let loc = format!("mappings[{i}]");
            if m.get("required_skills").and_then(Value::as_array).is_some_and(|a| a.is_empty()) {
                out.push(Finding::warn("empty_skills", format!("{loc} ({name}) has no required_skills")).at(&loc));
            }
            if !Self::non_empty(m.get("when_contains_all")) && !Self::non_empty(m.get("when_contains_any")) {
                out.push(Finding::warn("no_trigger", format!("{loc} ({name}) has no trigger")).at(&loc));
            }
            if m.get("priority").and_then(Value::as_f64).is_some_and(|p| p < 0.0) {
                out.push(Finding::fail("invalid_priority", format!("{loc} ({name}) priority must be >= 0")).at(&loc));
            }
        }
        if let Some(settings) = input.doc.get("settings") {
            if !settings.get("block_on_missing_skill").is_some_and(Value::is_boolean) {
                out.push(
                    Finding::warn("missing_setting", "settings.block_on_missing_skill should be set")
                        .at("settings.block_on_missing_skill"),
                );
            }
        }
        out
    }
}

pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(RequiredFieldsRule),
        Box::new(RecommendedFieldsRule),
        Box::new(PhaseNameRule),
        Box::new(MappingFieldsRule),
        Box::new(SkillMappingHygieneRule),
    ]
}
