use serde::Serialize;
use wfg_contract::validate_intent_contract;
use wfg_core::{now, ValidationRecord, WorkflowState};
use wfg_validate::LintSummary;

use crate::evaluate::Guard;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartValidation {
    pub valid: bool,
    pub blockers: Vec<String>,
    pub results: Vec<ValidationRecord>,
    pub lint: LintSummary,
}

impl Guard {
    /// Pre-flight for a workflow: the intent contract (required only in
    /// strict mode) and every definition file in the configured dirs.
    pub fn validate_workflow_start(&self, strict: bool) -> StartValidation {
        let mut blockers = Vec::new();
        let mut results = Vec::new();

        let contract = validate_intent_contract(&self.root);
        let detail = match &contract {
            Ok(c) => c.path.clone(),
            Err(e) => e.to_string(),
        };
        if strict {
            if let Err(e) = &contract {
                blockers.push(format!("intent contract: {e}"));
            }
        }
        results.push(ValidationRecord {
            check: "intent_contract".to_string(),
            passed: contract.is_ok(),
            detail,
            checked_at: now(),
        });

        let lint = self.linter.lint_all(&self.root, &self.config.paths.definition_dirs);
        for report in &lint.violations {
            for finding in &report.violations {
                blockers.push(format!("{}: [{}] {}", report.file, finding.rule_id, finding.message));
            }
        }
        results.push(ValidationRecord {
            check: "definition_lint".to_string(),
            passed: lint.valid,
            detail: format!("{} files checked, {} invalid", lint.checked_files.len(), lint.violations.len()),
            checked_at: now(),
        });

        StartValidation {
            valid: blockers.is_empty(),
            blockers,
            results,
            lint,
        }
    }
}

/// Replaces the state's blockers and last results with this run's.
pub fn apply_start_validation(state: &mut WorkflowState, validation: &StartValidation) {
    state.clear_blockers();
    for b in &validation.blockers {
        state.add_blocker(b.clone());
    }
    state.validations.last_results = validation.results.clone();
}
