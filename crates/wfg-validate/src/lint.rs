use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;

use crate::rule::{default_rules, Rule};
use crate::types::{DefinitionKind, FileReport, Finding, LintInput, LintSummary, Severity};

/// File-name patterns that mark a file as a definition.
pub const DEFAULT_DEFINITION_PATTERNS: [&str; 5] = [
    r"(?i)workflow.*\.(yaml|yml|json)$",
    r"(?i)policy.*\.(yaml|yml|json)$",
    r"(?i)skill-mapping\.json$",
    r"(?i)\.workflow\.json$",
    r"(?i)\.policy\.json$",
];

pub const DEFAULT_DEFINITION_DIRS: [&str; 3] = [".workflow/config", "config", "artifacts"];

/// Classify by file name first, then by shape.
pub fn detect_kind(file_name: &str, doc: &Value) -> Option<DefinitionKind> {
    let has = |k: &str| doc.get(k).is_some_and(|v| !v.is_null());
    if file_name.contains("skill-mapping") || has("mappings") {
        Some(DefinitionKind::SkillMapping)
    } else if file_name.contains("workflow") || has("phases") {
        Some(DefinitionKind::Workflow)
    } else if file_name.contains("policy") || has("rules") {
        Some(DefinitionKind::Policy)
    } else {
        None
    }
}

pub struct DefinitionLinter {
    targets: Vec<Regex>,
    rules: Vec<Box<dyn Rule>>,
}

impl Default for DefinitionLinter {
    fn default() -> Self {
        let targets = DEFAULT_DEFINITION_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            targets,
            rules: default_rules(),
        }
    }
}

impl DefinitionLinter {
    pub fn with_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let targets = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            targets,
            rules: default_rules(),
        })
    }

    pub fn is_definition_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        self.targets.iter().any(|re| re.is_match(&name))
    }

    pub fn lint_document(&self, file_name: &str, doc: Value) -> (Option<DefinitionKind>, Vec<Finding>) {
        let Some(kind) = detect_kind(file_name, &doc) else {
            return (None, vec![]);
        };
        let input = LintInput {
            file_name: file_name.to_string(),
            kind,
            doc,
        };
        let findings = self
            .rules
            .iter()
            .filter(|r| r.applies_to(kind))
            .flat_map(|r| r.eval(&input))
            .collect();
        (Some(kind), findings)
    }

    pub fn lint_file(&self, path: &Path) -> FileReport {
        let file = path.to_string_lossy().into_owned();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (kind, findings) = match parse_definition(path) {
            Ok(doc) => self.lint_document(&file_name, doc),
            Err(message) => (None, vec![Finding::fail("parse_error", message)]),
        };
        let (violations, warnings): (Vec<Finding>, Vec<Finding>) =
            findings.into_iter().partition(|f| f.severity == Severity::Fail);
        FileReport {
            file,
            kind,
            violations,
            warnings,
        }
    }

    /// Lints every definition file directly inside each of `dirs` (relative
    /// to `root`). Missing directories are skipped.
    pub fn lint_all<S: AsRef<str>>(&self, root: &Path, dirs: &[S]) -> LintSummary {
        let mut summary = LintSummary {
            valid: true,
            ..LintSummary::default()
        };
        for dir in dirs {
            let dir = root.join(dir.as_ref());
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            let mut files: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_file() && self.is_definition_file(p))
                .collect();
            files.sort();
            for path in files {
                let report = self.lint_file(&path);
                summary.checked_files.push(report.file.clone());
                if !report.violations.is_empty() {
                    summary.valid = false;
                    summary.violations.push(FileReport {
                        warnings: vec![],
                        ..report.clone()
                    });
                }
                if !report.warnings.is_empty() {
                    summary.warnings.push(FileReport {
                        violations: vec![],
                        ..report
                    });
                }
            }
        }
        summary
    }
}

/// JSON by extension, YAML otherwise. The YAML document is converted to a
/// JSON value so rules see one shape.
pub fn parse_definition(path: &Path) -> Result<Value, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
    let is_json = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let doc: Value = if is_json {
        serde_json::from_str(&raw).map_err(|e| format!("parse {}: {e}", path.display()))?
    } else {
        serde_yaml::from_str(&raw).map_err(|e| format!("parse {}: {e}", path.display()))?
    };
    if !doc.is_object() {
        return Err(format!("{} is not a mapping", path.display()));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn target_patterns() {
        let l = DefinitionLinter::default();
        assert!(l.is_definition_file(Path::new("config/workflow.yaml")));
        assert!(l.is_definition_file(Path::new("Policy-main.yml")));
        assert!(l.is_definition_file(Path::new("skill-mapping.json")));
        assert!(l.is_definition_file(Path::new("render.workflow.json")));
        assert!(!l.is_definition_file(Path::new("main.py")));
        assert!(!l.is_definition_file(Path::new("skill-mapping.yaml")));
    }

    #[test]
    fn detect_by_name_then_shape() {
        assert_eq!(detect_kind("skill-mapping.json", &serde_json::json!({})), Some(DefinitionKind::SkillMapping));
        assert_eq!(detect_kind("defs.json", &serde_json::json!({"phases": []})), Some(DefinitionKind::Workflow));
        assert_eq!(detect_kind("defs.json", &serde_json::json!({"rules": []})), Some(DefinitionKind::Policy));
        assert_eq!(detect_kind("defs.json", &serde_json::json!({"x": 1})), None);
    }

    #[test]
    fn yaml_workflow_missing_phases() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("workflow.yaml");
        fs::write(&p, "name: render\nversion: 1\n").unwrap();
        let r = DefinitionLinter::default().lint_file(&p);
        assert!(!r.is_valid());
        assert_eq!(r.kind, Some(DefinitionKind::Workflow));
        assert_eq!(r.violations[0].rule_id, "missing_required");
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn broken_json_is_a_violation() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("policy.json");
        fs::write(&p, "{ not json").unwrap();
        let r = DefinitionLinter::default().lint_file(&p);
        assert_eq!(r.violations[0].rule_id, "parse_error");
    }

    #[test]
    fn lint_all_walks_configured_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::create_dir_all(dir.path().join("artifacts")).unwrap();
        fs::write(
            dir.path().join("config/workflow.yaml"),
            "name: w\nversion: '1'\ndescription: d\nphases:\n  - name: one\n",
        )
        .unwrap();
        fs::write(dir.path().join("artifacts/policy.json"), r#"{"name": "p"}"#).unwrap();
        fs::write(dir.path().join("artifacts/notes.md"), "# notes").unwrap();

        let s = DefinitionLinter::default().lint_all(dir.path(), &DEFAULT_DEFINITION_DIRS);
        assert!(!s.valid);
        assert_eq!(s.checked_files.len(), 2);
        assert_eq!(s.violations.len(), 1);
        assert!(s.violations[0].file.ends_with("policy.json"));
    }

    #[test]
    fn clean_tree_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let s = DefinitionLinter::default().lint_all(dir.path(), &DEFAULT_DEFINITION_DIRS);
        assert!(s.valid);
        assert!(s.checked_files.is_empty());
    }
}
