use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use wfg_contract::{intent_contract_changed, validate_intent_contract, validate_reference_analysis};
use wfg_core::{Gate, GateDecision, ToolKind, WorkflowState};
use wfg_ledger::{basename, exploration_evidence, has_been_read, is_deviation_approved};
use wfg_registry::{check_integrity, verify_provenance, Integrity};
use wfg_validate::DefinitionLinter;

use crate::classify::Classifier;
use crate::config::GateConfig;
use crate::event::ToolEvent;

const CONTRACT_REMEDIATION: &str = "Create or complete artifacts/intent_contract.yaml (objective, non_goals, inputs, \
     constraints, definition_of_done, allowed_deviations_policy) before running this action.";

/// Policy gates for one working directory. Holds no workflow state; the
/// caller passes it in on every call.
pub struct Guard {
    pub root: PathBuf,
    pub config: GateConfig,
    pub classifier: Classifier,
    pub linter: DefinitionLinter,
}

impl Guard {
    pub fn new(root: PathBuf, config: GateConfig) -> Result<Self> {
        let classifier = Classifier::new(&config.patterns)?;
        let linter = DefinitionLinter::with_patterns(&config.patterns.definition_files)
            .context("invalid definition file pattern")?;
        Ok(Self {
            root,
            config,
            classifier,
            linter,
        })
    }

    /// Decide whether a proposed invocation may run. Gates are checked in a
    /// fixed order and the first block wins; warnings are only returned when
    /// nothing blocks.
    pub fn evaluate(&self, state: Option<&WorkflowState>, event: &ToolEvent) -> GateDecision {
        let kind = event.kind();
        let Some(state) = state else {
            return self.evaluate_without_state(&kind, event);
        };
        let strict = state.is_strict();
        let target = event.target_path(&self.root);
        let mut warning = None;

        if strict && kind.is_dangerous() {
            match validate_intent_contract(&self.root) {
                Err(err) => {
                    return GateDecision::block(Gate::IntentContract, err.reason_code(), err.to_string(), CONTRACT_REMEDIATION)
                        .with_details(json!({ "missingFields": err.missing_fields() }));
                }
                Ok(contract) if intent_contract_changed(state, &contract) => {
                    warning = Some(GateDecision::warn(
                        Gate::IntentContract,
                        "intent_contract_changed",
                        format!("{} changed since it was pinned", contract.path),
                        "Confirm the new contract with the operator, then run `wfg pin-contract`.",
                    ));
                }
                Ok(_) => {}
            }
        }

        if strict && kind == ToolKind::Bash && self.classifier.is_generative_command(event.command()) {
            if let Some(block) = self.check_provenance(state) {
                return block;
            }
        }

        if strict && self.config.deviation.enabled {
            if let Some(block) = self.check_deviation(state, &kind, event, target.as_deref()) {
                return block;
            }
        }

        if let Some(path) = target.as_deref().filter(|_| kind.writes_file()) {
            if let Some(block) = self.check_file_write(state, &kind, path) {
                return block;
            }
            if kind == ToolKind::Write && !path.exists() && self.classifier.is_script(path) {
                if let Some(decision) = self.check_new_script(Some(state), path) {
                    return decision;
                }
            }
        }

        warning.unwrap_or_else(GateDecision::allow)
    }

    fn evaluate_without_state(&self, kind: &ToolKind, event: &ToolEvent) -> GateDecision {
        if *kind == ToolKind::Bash && self.classifier.is_dangerous_command(event.command()) {
            let command: String = event.command().chars().take(80).collect();
            return GateDecision::warn(
                Gate::WorkflowState,
                "no_workflow_state",
                format!("`{command}` is a dangerous command and no workflow has been started"),
                "Start a workflow with `wfg init <workflow_id>` first.",
            );
        }
        if *kind == ToolKind::Write {
            if let Some(path) = event.target_path(&self.root) {
                if !path.exists() && self.classifier.is_script(&path) {
                    return self.check_new_script(None, &path).unwrap_or_else(GateDecision::allow);
                }
            }
        }
        GateDecision::allow()
    }

    fn check_provenance(&self, state: &WorkflowState) -> Option<GateDecision> {
        let analysis = match validate_reference_analysis(&self.root) {
            Ok(a) => a,
            Err(err) => {
                return Some(GateDecision::block(
                    Gate::ReferenceProvenance,
                    err.reason_code(),
                    err.to_string(),
                    "Produce a valid artifacts/reference_analysis.json covering every reference asset before generating.",
                ));
            }
        };
        let check = verify_provenance(state, &analysis);
        if check.valid {
            return None;
        }
        let ids: Vec<&str> = check.mismatches.iter().map(|m| m.asset_id.as_str()).collect();
        Some(
            GateDecision::block(
                Gate::ReferenceProvenance,
                check.reason,
                format!("reference assets do not match their locked digests: {}", ids.join(", ")),
                "Re-analyse the listed assets, or re-register them if the change is intended.",
            )
            .with_details(json!({ "mismatches": check.mismatches })),
        )
    }

    fn check_deviation(
        &self,
        state: &WorkflowState,
        kind: &ToolKind,
        event: &ToolEvent,
        target: Option<&Path>,
    ) -> Option<GateDecision> {
        let (deviation, message) = match kind {
            ToolKind::Bash => {
                let pattern = self.classifier.approval_pattern(event.command())?;
                let command: String = event.command().chars().take(80).collect();
                (format!("bash:{pattern}"), format!("`{command}` needs operator approval"))
            }
            ToolKind::Write | ToolKind::Edit => {
                let path = target?;
                if !self.classifier.is_sensitive_path(&path.to_string_lossy()) {
                    return None;
                }
                let name = basename(&path.to_string_lossy());
                (format!("write:{name}"), format!("{name} is a sensitive file and needs operator approval"))
            }
            _ => return None,
        };
        if is_deviation_approved(state, &deviation) {
            return None;
        }
        Some(
            GateDecision::block(
                Gate::DeviationApproval,
                "approval_required",
                message,
                format!("Ask the operator, then record it with `wfg approve '{deviation}'`."),
            )
            .with_details(json!({ "deviation": deviation })),
        )
    }

    fn check_file_write(&self, state: &WorkflowState, kind: &ToolKind, path: &Path) -> Option<GateDecision> {
        let display = path.to_string_lossy();
        let name = basename(&display);

        if self.classifier.is_baseline(&display) {
            if let Integrity::HashMismatch { expected, actual } = check_integrity(state, path) {
                return Some(
                    GateDecision::block(
                        Gate::BaselineIntegrity,
                        "hash_mismatch",
                        format!("baseline file {name} no longer matches its pinned digest"),
                        "Use the baseline as registered. If it must change, get explicit approval and run `wfg reset-baseline`.",
                    )
                    .with_details(json!({ "path": display, "expected": expected, "actual": actual })),
                );
            }
        }

        if state.is_strict() && path.exists() && !has_been_read(state, &display) {
            let verb = if *kind == ToolKind::Write { "overwrite" } else { "edit" };
            return Some(
                GateDecision::block(
                    Gate::ReadBeforeWrite,
                    "read_before_write",
                    format!("attempted to {verb} {name} without reading it first"),
                    format!("Read {display} before changing it."),
                )
                .with_details(json!({ "path": display })),
            );
        }
        None
    }

    /// `None` means the write may proceed silently.
    fn check_new_script(&self, state: Option<&WorkflowState>, path: &Path) -> Option<GateDecision> {
        let display = path.to_string_lossy();
        let name = basename(&display);

        if let Some(existing) = state.and_then(|s| s.baseline.files.get(&name)) {
            return Some(
                GateDecision::block(
                    Gate::NewScript,
                    "baseline_name_collision",
                    format!("{name} would shadow the registered baseline {}", existing.path),
                    format!("Reuse the existing baseline {}.", existing.path),
                )
                .with_details(json!({ "path": display, "baseline": existing.path })),
            );
        }

        match state.filter(|s| s.is_strict()) {
            Some(state) => {
                let found = exploration_evidence(state);
                if found.is_sufficient() {
                    return None;
                }
                let missing = found.missing();
                Some(
                    GateDecision::block(
                        Gate::NewScript,
                        "missing_exploration_evidence",
                        format!("creating new script {name} without exploring what already exists"),
                        format!(
                            "Before creating a new script, record: {}. Search the repository, read candidate \
                             scripts, then record a reuse/create decision with `wfg decide`.",
                            missing.join(", ")
                        ),
                    )
                    .with_details(json!({ "path": display, "missing": missing, "found": found })),
                )
            }
            None => Some(
                GateDecision::warn(
                    Gate::NewScript,
                    "new_script",
                    format!("creating new script {name}"),
                    "Check whether an existing script already does this.",
                )
                .with_details(json!({ "path": display })),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use wfg_core::{AssetChoice, Decision, HookPhase};
    use wfg_ledger::{capture_read, capture_search, record_asset_reuse_decision, record_deviation_approval};

    const CONTRACT: &str = "objective: o\nnon_goals: [n]\ninputs: {files: []}\nconstraints: [c]\ndefinition_of_done: [d]\nallowed_deviations_policy: ask\n";

    fn guard(root: &Path) -> Guard {
        Guard::new(root.to_path_buf(), GateConfig::default()).unwrap()
    }

    fn with_contract(root: &Path) {
        fs::create_dir_all(root.join("artifacts")).unwrap();
        fs::write(root.join("artifacts/intent_contract.yaml"), CONTRACT).unwrap();
    }

    fn before(tool: &str) -> ToolEvent {
        ToolEvent::new(tool, HookPhase::Before)
    }

    #[test]
    fn reads_are_never_gated() {
        let dir = tempfile::tempdir().unwrap();
        let s = WorkflowState::new("wf", true);
        let d = guard(dir.path()).evaluate(Some(&s), &before("Read").with_file("x.txt"));
        assert!(d.is_allow());
    }

    #[test]
    fn strict_bash_without_contract_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let s = WorkflowState::new("wf", true);
        let d = guard(dir.path()).evaluate(Some(&s), &before("Bash").with_command("ls"));
        assert_eq!(d.gate, Some(Gate::IntentContract));
        assert_eq!(d.reason(), "not_found");
    }

    #[test]
    fn advisory_mode_skips_contract() {
        let dir = tempfile::tempdir().unwrap();
        let s = WorkflowState::new("wf", false);
        let d = guard(dir.path()).evaluate(Some(&s), &before("Bash").with_command("ls"));
        assert!(d.is_allow());
    }

    #[test]
    fn no_state_dangerous_command_warns() {
        let dir = tempfile::tempdir().unwrap();
        let d = guard(dir.path()).evaluate(None, &before("Bash").with_command("rm -rf out"));
        assert_eq!(d.decision, Decision::Warn);
        assert_eq!(d.reason(), "no_workflow_state");
        assert!(guard(dir.path()).evaluate(None, &before("Bash").with_command("ls")).is_allow());
    }

    #[test]
    fn unread_existing_file_is_blocked_in_strict_mode() {
        let dir = tempfile::tempdir().unwrap();
        with_contract(dir.path());
        fs::write(dir.path().join("util.txt"), "x").unwrap();
        let mut s = WorkflowState::new("wf", true);
        let g = guard(dir.path());
        let ev = before("Edit").with_file("util.txt");
        assert_eq!(g.evaluate(Some(&s), &ev).reason(), "read_before_write");

        capture_read(&mut s, &dir.path().join("util.txt").to_string_lossy(), None);
        assert!(g.evaluate(Some(&s), &ev).is_allow());
    }

    #[test]
    fn sensitive_write_needs_approval() {
        let dir = tempfile::tempdir().unwrap();
        with_contract(dir.path());
        let mut s = WorkflowState::new("wf", true);
        let g = guard(dir.path());
        let ev = before("Write").with_file(".env");
        let d = g.evaluate(Some(&s), &ev);
        assert_eq!(d.reason(), "approval_required");
        assert_eq!(d.details["deviation"], "write:.env");

        record_deviation_approval(&mut s, "write:.env", None);
        assert!(g.evaluate(Some(&s), &ev).is_allow());
    }

    #[test]
    fn approval_can_be_switched_off() {
        let dir = tempfile::tempdir().unwrap();
        with_contract(dir.path());
        let mut cfg = GateConfig::default();
        cfg.deviation.enabled = false;
        let g = Guard::new(dir.path().to_path_buf(), cfg).unwrap();
        let s = WorkflowState::new("wf", true);
        assert!(g.evaluate(Some(&s), &before("Bash").with_command("sudo ls")).is_allow());
    }

    #[test]
    fn new_script_in_advisory_mode_warns() {
        let dir = tempfile::tempdir().unwrap();
        let s = WorkflowState::new("wf", false);
        let d = guard(dir.path()).evaluate(Some(&s), &before("Write").with_file("tool.sh"));
        assert_eq!(d.decision, Decision::Warn);
        assert_eq!(d.reason(), "new_script");
    }

    #[test]
    fn two_reads_are_enough_exploration() {
        let dir = tempfile::tempdir().unwrap();
        with_contract(dir.path());
        let mut s = WorkflowState::new("wf", true);
        let g = guard(dir.path());
        let ev = before("Write").with_file("helper.js");
        let d = g.evaluate(Some(&s), &ev);
        assert_eq!(d.reason(), "missing_exploration_evidence");
        assert_eq!(d.details["missing"], json!(["search", "read", "decision"]));

        capture_read(&mut s, "/a.js", None);
        assert!(g.evaluate(Some(&s), &ev).is_block());
        capture_read(&mut s, "/b.js", None);
        assert!(g.evaluate(Some(&s), &ev).is_allow());
    }

    #[test]
    fn search_and_decision_are_enough_exploration() {
        let dir = tempfile::tempdir().unwrap();
        with_contract(dir.path());
        let mut s = WorkflowState::new("wf", true);
        capture_search(&mut s, "Grep", "render", &[]);
        record_asset_reuse_decision(&mut s, "helper.py", AssetChoice::Create, "nothing similar exists");
        let d = guard(dir.path()).evaluate(Some(&s), &before("Write").with_file("helper.py"));
        assert!(d.is_allow());
    }

    #[test]
    fn contract_edit_after_pinning_warns() {
        let dir = tempfile::tempdir().unwrap();
        with_contract(dir.path());
        let mut s = WorkflowState::new("wf", true);
        let c = validate_intent_contract(dir.path()).unwrap();
        wfg_contract::pin_intent_contract(&mut s, &c);
        fs::write(dir.path().join("artifacts/intent_contract.yaml"), format!("{CONTRACT}# v2\n")).unwrap();
        let d = guard(dir.path()).evaluate(Some(&s), &before("Bash").with_command("ls"));
        assert_eq!(d.decision, Decision::Warn);
        assert_eq!(d.reason(), "intent_contract_changed");
    }
}
