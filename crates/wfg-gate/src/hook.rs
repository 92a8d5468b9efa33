use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};
use wfg_core::{GateDecision, HookPhase, WorkflowState};
use wfg_ledger::record_required_skills;
use wfg_report::ViolationLog;
use wfg_store::{FsStateStore, StateStore};

use crate::classify::{PromptClassification, PromptClassifier};
use crate::config::GateConfig;
use crate::evaluate::Guard;
use crate::event::ToolEvent;

/// Load state, decide, save state. One instance per invocation.
pub struct HookRunner {
    pub guard: Guard,
    pub store: Box<dyn StateStore>,
    pub violations: Option<ViolationLog>,
}

impl HookRunner {
    /// Reads config without creating it. A config that fails to load or whose
    /// patterns fail to compile is replaced by the defaults, so the gates keep
    /// running against the loaded state.
    pub fn open(root: PathBuf) -> Result<Self> {
        let config = GateConfig::load_or_default(&root);
        let guard = match Guard::new(root.clone(), config) {
            Ok(guard) => guard,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "guard config patterns invalid, using defaults");
                Guard::new(root.clone(), GateConfig::default())?
            }
        };
        let violations = guard.config.violation_log_path(&root).map(ViolationLog::new);
        let store = Box::new(FsStateStore::for_dir(&root));
        Ok(Self {
            guard,
            store,
            violations,
        })
    }

    pub fn with_store(guard: Guard, store: Box<dyn StateStore>) -> Self {
        Self {
            guard,
            store,
            violations: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.guard.root
    }

    /// Before events never touch the state file. After events persist
    /// whatever they captured; a failed save is logged and does not change
    /// the decision.
    pub fn handle(&self, event: &ToolEvent) -> GateDecision {
        let mut state = self.store.load_lenient();
        let decision = match event.hook_event {
            HookPhase::Before => self.guard.evaluate(state.as_ref(), event),
            HookPhase::After => {
                let decision = self.guard.observe(state.as_mut(), event);
                if let Some(state) = state.as_mut() {
                    self.persist(state);
                }
                decision
            }
        };
        debug!(tool = %event.tool_name, phase = ?event.hook_event, decision = ?decision.decision, "hook decision");
        if decision.is_block() {
            info!(tool = %event.tool_name, reason = decision.reason(), "blocked");
            self.record_violation(&decision, event);
        }
        decision
    }

    /// Feeds skills and same-workflow requests from an operator prompt into
    /// the state. Without a workflow the classification is still returned.
    pub fn record_prompt(&self, classifier: &dyn PromptClassifier, prompt: &str) -> PromptClassification {
        let found = classifier.classify(prompt);
        if found.is_empty() {
            return found;
        }
        if let Some(mut state) = self.store.load_lenient() {
            record_required_skills(&mut state, &found.skills);
            if found.requires_same_workflow {
                state.request_same_workflow();
            }
            self.persist(&mut state);
        }
        found
    }

    fn persist(&self, state: &mut WorkflowState) {
        if let Err(err) = self.store.save(state) {
            warn!(error = %format!("{err:#}"), "failed to save workflow state");
        }
    }

    fn record_violation(&self, decision: &GateDecision, event: &ToolEvent) {
        let Some(log) = &self.violations else {
            return;
        };
        let location = event
            .tool_input
            .file_path
            .clone()
            .or_else(|| event.tool_input.command.clone())
            .unwrap_or_else(|| event.tool_name.clone());
        if let Err(err) = log.append_decision(decision, &location) {
            warn!(error = %format!("{err:#}"), "failed to append violation log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::SkillMentionClassifier;
    use wfg_core::SkillId;
    use wfg_store::InMemoryStateStore;

    fn runner(root: &Path, state: Option<WorkflowState>) -> HookRunner {
        let guard = Guard::new(root.to_path_buf(), GateConfig::default()).unwrap();
        let store = match state {
            Some(s) => InMemoryStateStore::with_state(s),
            None => InMemoryStateStore::new(),
        };
        HookRunner::with_store(guard, Box::new(store))
    }

    #[test]
    fn after_event_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let r = runner(dir.path(), Some(WorkflowState::new("wf", false)));
        r.handle(&ToolEvent::new("Bash", HookPhase::After).with_command("ls"));
        let s = r.store.load().unwrap().unwrap();
        assert_eq!(s.evidence.skill_evidence.len(), 1);
    }

    #[test]
    fn before_event_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let r = runner(dir.path(), None);
        let d = r.handle(&ToolEvent::new("Bash", HookPhase::Before).with_command("ls"));
        assert!(d.is_allow());
        assert!(r.store.load().unwrap().is_none());
    }

    #[test]
    fn prompt_records_required_skills() {
        let dir = tempfile::tempdir().unwrap();
        let r = runner(dir.path(), Some(WorkflowState::new("wf", true)));
        let c = SkillMentionClassifier::new().unwrap();
        assert!(r.record_prompt(&c, "nothing to see").is_empty());
        let found = r.record_prompt(&c, "use the subtitle skill please");
        assert_eq!(found.skills, vec![SkillId::from_str("subtitle")]);
        let s = r.store.load().unwrap().unwrap();
        assert!(s.evidence.required_skills.contains_key(&SkillId::from_str("subtitle")));
        assert!(!s.meta.requires_same_workflow);
    }

    #[test]
    fn same_workflow_prompt_is_persisted_without_skills() {
        let dir = tempfile::tempdir().unwrap();
        let r = runner(dir.path(), Some(WorkflowState::new("wf", true)));
        let c = SkillMentionClassifier::new().unwrap();
        let found = r.record_prompt(&c, "redo it with the same workflow as before");
        assert!(found.skills.is_empty());
        assert!(found.requires_same_workflow);
        let s = r.store.load().unwrap().unwrap();
        assert!(s.meta.requires_same_workflow);
        assert!(s.meta.same_workflow_requested_at.is_some());
    }

    #[test]
    fn allowed_event_leaves_directory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let r = HookRunner::open(dir.path().to_path_buf()).unwrap();
        assert!(r.handle(&ToolEvent::new("Read", HookPhase::Before).with_file("a.txt")).is_allow());
        assert!(!GateConfig::config_path(dir.path()).exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn damaged_config_still_gates() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = GateConfig::config_path(dir.path());
        std::fs::create_dir_all(cfg.parent().unwrap()).unwrap();
        std::fs::write(&cfg, "not = [valid").unwrap();
        let r = HookRunner::open(dir.path().to_path_buf()).unwrap();
        r.store.save(&mut WorkflowState::new("wf", true)).unwrap();
        let d = r.handle(&ToolEvent::new("Write", HookPhase::Before).with_file("x.txt"));
        assert!(d.is_block());
        assert_eq!(d.reason(), "not_found");
    }

    #[test]
    fn uncompilable_pattern_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = GateConfig::default();
        cfg.patterns.baseline.push("(unclosed".to_string());
        cfg.save_to(&GateConfig::config_path(dir.path())).unwrap();
        let r = HookRunner::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(r.guard.config, GateConfig::default());
    }

    #[test]
    fn open_logs_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let r = HookRunner::open(dir.path().to_path_buf()).unwrap();
        let mut s = WorkflowState::new("wf", true);
        r.store.save(&mut s).unwrap();
        let d = r.handle(&ToolEvent::new("Write", HookPhase::Before).with_file("out.txt"));
        assert_eq!(d.reason(), "not_found");
        let log = std::fs::read_to_string(dir.path().join(".workflow/mistakes.md")).unwrap();
        assert!(log.contains("[not_found]"));
        assert!(log.contains("**Location**: out.txt"));
    }
}
