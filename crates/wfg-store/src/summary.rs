use std::collections::BTreeMap;

use serde::Serialize;
use wfg_core::{EvidenceType, WorkflowState};
use wfg_ledger::{count_by_type, phase, unused_required_skills, SkillPhase};

/// Read-only projection of the state for session start and `wfg summary`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub workflow_id: String,
    pub strict_mode: bool,
    pub current_phase: u32,
    pub started_at: String,
    pub completed_phases: Vec<u32>,
    pub baseline: Vec<BaselinePin>,
    pub skills_used: Vec<String>,
    /// Requested by the operator and not yet started.
    pub pending_skills: Vec<String>,
    pub requires_same_workflow: bool,
    pub skill_phase: SkillPhase,
    pub active_skill_id: Option<String>,
    pub active_skill_step_id: Option<String>,
    pub evidence_count: usize,
    /// Only types with at least one record.
    pub evidence_by_type: BTreeMap<String, usize>,
    pub locked_assets: usize,
    pub intent_contract: Option<String>,
    pub objective: Option<String>,
    pub blockers: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BaselinePin {
    pub name: String,
    pub short_digest: String,
}

pub fn summarize(state: &WorkflowState) -> StateSummary {
    StateSummary {
        workflow_id: state.meta.workflow_id.to_string(),
        strict_mode: state.meta.strict_mode,
        current_phase: state.meta.current_phase,
        started_at: state.meta.started_at.to_rfc3339(),
        completed_phases: state.completed_phases.clone(),
        baseline: state
            .baseline
            .files
            .iter()
            .map(|(name, e)| BaselinePin {
                name: name.clone(),
                short_digest: e.digest.chars().take(8).collect(),
            })
            .collect(),
        skills_used: state.evidence.skills_used.keys().map(|k| k.to_string()).collect(),
        pending_skills: unused_required_skills(state).iter().map(|s| s.to_string()).collect(),
        requires_same_workflow: state.meta.requires_same_workflow,
        skill_phase: phase(state),
        active_skill_id: state.active_skill_id.as_ref().map(|s| s.to_string()),
        active_skill_step_id: state.active_skill_step_id.as_ref().map(|s| s.to_string()),
        evidence_count: state.evidence.skill_evidence.len(),
        evidence_by_type: EvidenceType::ALL
            .iter()
            .map(|ty| (ty.as_str().to_string(), count_by_type(state, *ty)))
            .filter(|(_, n)| *n > 0)
            .collect(),
        locked_assets: state.locks.reference_assets.len(),
        intent_contract: state.intent_contract_ref.as_ref().map(|r| r.path.clone()),
        objective: state.intent_contract_ref.as_ref().and_then(|r| r.objective.clone()),
        blockers: state.blockers.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfg_core::{now, BaselineEntry, SkillId};

    #[test]
    fn digest_is_shortened() {
        let mut s = WorkflowState::new("wf", true);
        s.baseline.files.insert(
            "main.py".into(),
            BaselineEntry {
                path: "/r/main.py".into(),
                digest: "0123456789abcdef".into(),
                registered_at: now(),
            },
        );
        let sum = summarize(&s);
        assert_eq!(sum.baseline[0].short_digest, "01234567");
        assert_eq!(sum.workflow_id, "wf");
        assert!(sum.strict_mode);
        assert_eq!(sum.skill_phase, SkillPhase::Idle);
    }

    #[test]
    fn pending_skills_and_evidence_tallies() {
        let mut s = WorkflowState::new("wf", true);
        wfg_ledger::record_required_skills(&mut s, &[SkillId::from_str("subtitle"), SkillId::from_str("thumb")]);
        wfg_ledger::start_skill(&mut s, &SkillId::from_str("thumb"), serde_json::Value::Null).unwrap();
        wfg_ledger::capture_command(&mut s, "ls");
        wfg_ledger::capture_command(&mut s, "pwd");
        s.request_same_workflow();

        let sum = summarize(&s);
        assert_eq!(sum.pending_skills, vec!["subtitle".to_string()]);
        assert_eq!(sum.skill_phase, SkillPhase::SkillActive);
        assert!(sum.requires_same_workflow);
        assert_eq!(sum.evidence_by_type.get("command_executed"), Some(&2));
        assert!(!sum.evidence_by_type.contains_key("read_file"));
        let v = serde_json::to_value(&sum).unwrap();
        assert_eq!(v["skillPhase"], "skill_active");
    }
}
