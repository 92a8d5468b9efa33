use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use wfg_core::{now, EvidenceType, SkillId, SkillUsage, StepId, StepUsage, WorkflowState};

use crate::evidence::has_required_evidence;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("no active skill")]
    NoActiveSkill,
    #[error("skill {active} is still active")]
    SkillAlreadyActive { active: SkillId },
    #[error("step {active} is still active")]
    StepAlreadyActive { active: StepId },
    #[error("step mismatch: expected {expected:?}, got {actual}")]
    StepMismatch { expected: Option<StepId>, actual: StepId },
    #[error("missing evidence for step {step}: {missing:?}")]
    MissingEvidence {
        step: StepId,
        missing: Vec<EvidenceType>,
        present: Vec<EvidenceType>,
    },
    #[error("skill mismatch: expected {expected:?}, got {actual}")]
    SkillMismatch { expected: Option<SkillId>, actual: SkillId },
}

impl TransitionError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NoActiveSkill => "no_active_skill",
            Self::SkillAlreadyActive { .. } => "skill_already_active",
            Self::StepAlreadyActive { .. } => "step_already_active",
            Self::StepMismatch { .. } => "step_mismatch",
            Self::MissingEvidence { .. } => "missing_evidence",
            Self::SkillMismatch { .. } => "skill_mismatch",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillPhase {
    Idle,
    SkillActive,
    StepActive,
}

impl SkillPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillPhase::Idle => "idle",
            SkillPhase::SkillActive => "skill_active",
            SkillPhase::StepActive => "step_active",
        }
    }
}

pub fn phase(state: &WorkflowState) -> SkillPhase {
    match (&state.active_skill_id, &state.active_skill_step_id) {
        (None, _) => SkillPhase::Idle,
        (Some(_), None) => SkillPhase::SkillActive,
        (Some(_), Some(_)) => SkillPhase::StepActive,
    }
}

/// Idle -> SkillActive. Re-running a finished skill starts a fresh usage record.
pub fn start_skill(state: &mut WorkflowState, skill_id: &SkillId, details: Value) -> Result<(), TransitionError> {
    if let Some(active) = &state.active_skill_id {
        return Err(TransitionError::SkillAlreadyActive { active: active.clone() });
    }
    state.active_skill_id = Some(skill_id.clone());
    state.active_skill_step_id = None;
    state.evidence.skills_used.insert(
        skill_id.clone(),
        SkillUsage {
            started_at: now(),
            completed_at: None,
            steps: vec![],
            details,
        },
    );
    if let Some(req) = state.evidence.required_skills.get_mut(skill_id) {
        req.used = true;
    }
    Ok(())
}

/// SkillActive -> StepActive. Steps do not nest.
pub fn start_step(state: &mut WorkflowState, step_id: &StepId) -> Result<(), TransitionError> {
    let Some(skill) = state.active_skill_id.clone() else {
        return Err(TransitionError::NoActiveSkill);
    };
    if let Some(active) = &state.active_skill_step_id {
        return Err(TransitionError::StepAlreadyActive { active: active.clone() });
    }
    state.active_skill_step_id = Some(step_id.clone());
    state
        .evidence
        .skill_evidence_index_by_step_id
        .entry(step_id.clone())
        .or_default();
    let usage = state.evidence.skills_used.entry(skill).or_insert_with(|| SkillUsage {
        started_at: now(),
        completed_at: None,
        steps: vec![],
        details: Value::Null,
    });
    usage.steps.push(StepUsage {
        step_id: step_id.clone(),
        started_at: now(),
        completed_at: None,
    });
    Ok(())
}

/// StepActive -> SkillActive, provided the step's bucket holds every
/// required evidence type. On failure nothing changes.
pub fn complete_step(
    state: &mut WorkflowState,
    step_id: &StepId,
    required: &[EvidenceType],
) -> Result<(), TransitionError> {
    let Some(skill) = state.active_skill_id.clone() else {
        return Err(TransitionError::NoActiveSkill);
    };
    if state.active_skill_step_id.as_ref() != Some(step_id) {
        return Err(TransitionError::StepMismatch {
            expected: state.active_skill_step_id.clone(),
            actual: step_id.clone(),
        });
    }
    let check = has_required_evidence(state, step_id, required);
    if !check.valid {
        return Err(TransitionError::MissingEvidence {
            step: step_id.clone(),
            missing: check.missing,
            present: check.present,
        });
    }
    if let Some(step) = state
        .evidence
        .skills_used
        .get_mut(&skill)
        .and_then(|u| u.steps.iter_mut().rev().find(|s| &s.step_id == step_id))
    {
        step.completed_at = Some(now());
    }
    state.active_skill_step_id = None;
    Ok(())
}

/// SkillActive/StepActive -> Idle. An open step is dropped with the skill.
pub fn complete_skill(state: &mut WorkflowState, skill_id: &SkillId) -> Result<(), TransitionError> {
    if state.active_skill_id.as_ref() != Some(skill_id) {
        return Err(TransitionError::SkillMismatch {
            expected: state.active_skill_id.clone(),
            actual: skill_id.clone(),
        });
    }
    if let Some(usage) = state.evidence.skills_used.get_mut(skill_id) {
        usage.completed_at = Some(now());
    }
    state.active_skill_id = None;
    state.active_skill_step_id = None;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{capture_read, capture_search, record_required_skills};

    fn sk(s: &str) -> SkillId {
        SkillId::from_str(s)
    }

    fn st(s: &str) -> StepId {
        StepId::from_str(s)
    }

    #[test]
    fn full_cycle() {
        let mut s = WorkflowState::new("wf", true);
        assert_eq!(phase(&s), SkillPhase::Idle);
        start_skill(&mut s, &sk("render"), Value::Null).unwrap();
        assert_eq!(phase(&s), SkillPhase::SkillActive);
        start_step(&mut s, &st("explore")).unwrap();
        assert_eq!(phase(&s), SkillPhase::StepActive);
        capture_read(&mut s, "/r/a.py", None);
        complete_step(&mut s, &st("explore"), &[EvidenceType::ReadFile]).unwrap();
        assert_eq!(phase(&s), SkillPhase::SkillActive);
        complete_skill(&mut s, &sk("render")).unwrap();
        assert_eq!(phase(&s), SkillPhase::Idle);

        let usage = &s.evidence.skills_used[&sk("render")];
        assert!(usage.completed_at.is_some());
        assert_eq!(usage.steps.len(), 1);
        assert!(usage.steps[0].completed_at.is_some());
        assert_eq!(s.evidence.skill_evidence_index_by_step_id[&st("explore")].len(), 1);
    }

    #[test]
    fn step_requires_skill() {
        let mut s = WorkflowState::new("wf", true);
        let err = start_step(&mut s, &st("x")).unwrap_err();
        assert_eq!(err, TransitionError::NoActiveSkill);
        assert!(s.active_skill_step_id.is_none());
    }

    #[test]
    fn idle_state_rejects_completions() {
        let mut s = WorkflowState::new("wf", true);
        let before = s.clone();
        assert_eq!(complete_step(&mut s, &st("1"), &[]).unwrap_err(), TransitionError::NoActiveSkill);
        assert_eq!(
            complete_skill(&mut s, &sk("a")).unwrap_err(),
            TransitionError::SkillMismatch {
                expected: None,
                actual: sk("a"),
            }
        );
        assert_eq!(s, before);
    }

    #[test]
    fn no_nested_skills_or_steps() {
        let mut s = WorkflowState::new("wf", true);
        start_skill(&mut s, &sk("a"), Value::Null).unwrap();
        let err = start_skill(&mut s, &sk("b"), Value::Null).unwrap_err();
        assert_eq!(err.reason_code(), "skill_already_active");
        start_step(&mut s, &st("1")).unwrap();
        let err = start_step(&mut s, &st("2")).unwrap_err();
        assert_eq!(err.reason_code(), "step_already_active");
        assert_eq!(s.active_skill_step_id, Some(st("1")));
    }

    #[test]
    fn completing_without_evidence_fails_and_keeps_step() {
        let mut s = WorkflowState::new("wf", true);
        capture_read(&mut s, "/r/outside.py", None);
        start_skill(&mut s, &sk("a"), Value::Null).unwrap();
        start_step(&mut s, &st("1")).unwrap();
        capture_search(&mut s, "Grep", "x", &[]);

        let err = complete_step(&mut s, &st("1"), &[EvidenceType::ReadFile, EvidenceType::SearchRepo]).unwrap_err();
        match err {
            TransitionError::MissingEvidence { missing, present, .. } => {
                assert_eq!(missing, vec![EvidenceType::ReadFile]);
                assert_eq!(present, vec![EvidenceType::SearchRepo]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.active_skill_step_id, Some(st("1")));
    }

    #[test]
    fn mismatched_ids_are_rejected() {
        let mut s = WorkflowState::new("wf", true);
        start_skill(&mut s, &sk("a"), Value::Null).unwrap();
        start_step(&mut s, &st("1")).unwrap();
        assert_eq!(complete_step(&mut s, &st("2"), &[]).unwrap_err().reason_code(), "step_mismatch");
        assert_eq!(complete_skill(&mut s, &sk("b")).unwrap_err().reason_code(), "skill_mismatch");
        complete_skill(&mut s, &sk("a")).unwrap();
        assert!(s.active_skill_step_id.is_none());
    }

    #[test]
    fn starting_a_required_skill_marks_it_used() {
        let mut s = WorkflowState::new("wf", true);
        record_required_skills(&mut s, &[sk("a")]);
        start_skill(&mut s, &sk("a"), Value::Null).unwrap();
        assert!(s.evidence.required_skills[&sk("a")].used);
    }
}
