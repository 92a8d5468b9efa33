use serde_json::json;
use tracing::debug;
use wfg_core::{EvidenceType, Gate, GateDecision, ToolKind, WorkflowState};
use wfg_ledger::{capture, capture_artifact, capture_command, capture_read, capture_search};
use wfg_registry::{register_baseline, Registration};

use crate::evaluate::Guard;
use crate::event::ToolEvent;

impl Guard {
    /// After-path bookkeeping for an invocation that already ran. Only a
    /// definition file that fails lint produces a non-allow decision.
    pub fn observe(&self, state: Option<&mut WorkflowState>, event: &ToolEvent) -> GateDecision {
        let kind = event.kind();
        let target = event.target_path(&self.root);

        if let Some(state) = state {
            match &kind {
                ToolKind::Read => {
                    if let Some(path) = &target {
                        let path_str = path.to_string_lossy();
                        capture_read(state, &path_str, event.session_id.as_deref());
                        if self.classifier.is_baseline(&path_str)
                            && register_baseline(state, path) == Registration::Registered
                        {
                            debug!(path = %path.display(), "baseline registered");
                        }
                    }
                }
                ToolKind::Search => {
                    let pattern = event.tool_input.pattern.as_deref().unwrap_or("");
                    capture_search(state, &event.tool_name, pattern, &[]);
                }
                ToolKind::Write | ToolKind::Edit => {
                    if let Some(path) = &target {
                        capture_artifact(state, &path.to_string_lossy(), kind == ToolKind::Write);
                    }
                }
                ToolKind::Bash => {
                    capture_command(state, event.command());
                }
                ToolKind::Skill | ToolKind::Delegate => {
                    capture(
                        state,
                        EvidenceType::SkillInvoked,
                        json!({
                            "tool": event.tool_name,
                            "skill": event.tool_input.skill,
                            "subagentType": event.tool_input.subagent_type,
                        }),
                    );
                }
                ToolKind::Other(_) => {}
            }
        }

        match target.filter(|p| kind.writes_file() && p.is_file() && self.linter.is_definition_file(p)) {
            Some(path) => {
                let report = self.linter.lint_file(&path);
                if report.is_valid() {
                    return GateDecision::allow();
                }
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                GateDecision::block(
                    Gate::DefinitionLint,
                    "definition_invalid",
                    format!("{name} is not a valid definition ({} violations)", report.violations.len()),
                    "Fix the listed violations before relying on this definition.",
                )
                .with_details(serde_json::to_value(&report).unwrap_or_default())
            }
            None => GateDecision::allow(),
        }
    }
}
