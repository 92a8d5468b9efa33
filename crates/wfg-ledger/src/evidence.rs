use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};
use wfg_core::{
    now, AssetChoice, AssetReuseDecision, DeviationApproval, EvidenceId, EvidenceRecord, EvidenceType, ReadLogEntry,
    RequiredSkill, SkillId, StepId, WorkflowState, READ_LOG_LIMIT,
};

/// Append a record to the ledger, stamped with the skill/step active right
/// now. When a step is active the id also goes into that step's bucket.
pub fn capture(state: &mut WorkflowState, ty: EvidenceType, data: Value) -> EvidenceRecord {
    let record = EvidenceRecord {
        id: EvidenceId::new(),
        ty,
        data,
        captured_at: now(),
        active_skill_id: state.active_skill_id.clone(),
        active_skill_step_id: state.active_skill_step_id.clone(),
    };
    if let Some(step) = &state.active_skill_step_id {
        state
            .evidence
            .skill_evidence_index_by_step_id
            .entry(step.clone())
            .or_default()
            .push(record.id.clone());
    }
    state.evidence.skill_evidence.push(record.clone());
    record
}

pub fn capture_read(state: &mut WorkflowState, path: &str, session_id: Option<&str>) -> EvidenceRecord {
    add_read_log(state, path, session_id);
    capture(state, EvidenceType::ReadFile, json!({ "path": path, "basename": basename(path) }))
}

pub fn capture_search(state: &mut WorkflowState, tool: &str, pattern: &str, results: &[String]) -> EvidenceRecord {
    capture(
        state,
        EvidenceType::SearchRepo,
        json!({ "tool": tool, "pattern": pattern, "results": results }),
    )
}

pub fn capture_command(state: &mut WorkflowState, command: &str) -> EvidenceRecord {
    capture(state, EvidenceType::CommandExecuted, json!({ "command": command }))
}

pub fn capture_artifact(state: &mut WorkflowState, path: &str, created: bool) -> EvidenceRecord {
    let ty = if created { EvidenceType::ArtifactCreated } else { EvidenceType::ArtifactUpdated };
    capture(state, ty, json!({ "path": path, "basename": basename(path) }))
}

/// Record why an asset is reused or created. Also lands in the ledger as a
/// `decision_made` record so exploration checks can see it.
pub fn record_asset_reuse_decision(
    state: &mut WorkflowState,
    subject: &str,
    choice: AssetChoice,
    justification: &str,
) -> EvidenceRecord {
    let decision = AssetReuseDecision {
        subject: subject.to_string(),
        choice,
        justification: justification.to_string(),
        decided_at: now(),
    };
    state.decisions.asset_reuse.push(decision.clone());
    capture(
        state,
        EvidenceType::DecisionMade,
        serde_json::to_value(&decision).unwrap_or(Value::Null),
    )
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EvidenceCheck {
    pub valid: bool,
    pub missing: Vec<EvidenceType>,
    pub present: Vec<EvidenceType>,
}

/// Checks `required` against the step's own bucket only. Evidence captured
/// with no step active, or under another step, never counts here.
pub fn has_required_evidence(state: &WorkflowState, step_id: &StepId, required: &[EvidenceType]) -> EvidenceCheck {
    let present: BTreeSet<EvidenceType> = evidence_for_step(state, step_id).iter().map(|r| r.ty).collect();
    let mut missing = Vec::new();
    for ty in required {
        if !present.contains(ty) && !missing.contains(ty) {
            missing.push(*ty);
        }
    }
    EvidenceCheck {
        valid: missing.is_empty(),
        missing,
        present: present.into_iter().collect(),
    }
}

pub fn evidence_for_step<'a>(state: &'a WorkflowState, step_id: &StepId) -> Vec<&'a EvidenceRecord> {
    let Some(ids) = state.evidence.skill_evidence_index_by_step_id.get(step_id) else {
        return vec![];
    };
    let wanted: BTreeSet<&EvidenceId> = ids.iter().collect();
    state
        .evidence
        .skill_evidence
        .iter()
        .filter(|r| wanted.contains(&r.id))
        .collect()
}

pub fn count_by_type(state: &WorkflowState, ty: EvidenceType) -> usize {
    state.evidence.skill_evidence.iter().filter(|r| r.ty == ty).count()
}

/// Search/read/decision tallies across the whole ledger, used before a new
/// script may be created.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExplorationEvidence {
    pub searches: usize,
    pub reads: usize,
    pub decisions: usize,
}

impl ExplorationEvidence {
    /// At least one search or read plus one decision, or two reads.
    pub fn is_sufficient(&self) -> bool {
        (self.searches + self.reads >= 1 && self.decisions >= 1) || self.reads >= 2
    }

    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.searches == 0 {
            out.push("search");
        }
        if self.reads == 0 {
            out.push("read");
        }
        if self.decisions == 0 {
            out.push("decision");
        }
        out
    }
}

pub fn exploration_evidence(state: &WorkflowState) -> ExplorationEvidence {
    ExplorationEvidence {
        searches: count_by_type(state, EvidenceType::SearchRepo),
        reads: count_by_type(state, EvidenceType::ReadFile),
        decisions: count_by_type(state, EvidenceType::DecisionMade),
    }
}

pub fn add_read_log(state: &mut WorkflowState, path: &str, session_id: Option<&str>) {
    state.evidence.read_log.push(ReadLogEntry {
        path: path.to_string(),
        basename: basename(path),
        read_at: now(),
        session_id: session_id.unwrap_or("unknown").to_string(),
    });
    let len = state.evidence.read_log.len();
    if len > READ_LOG_LIMIT {
        state.evidence.read_log.drain(..len - READ_LOG_LIMIT);
    }
}

/// Matches on the full path or on the basename.
pub fn has_been_read(state: &WorkflowState, path: &str) -> bool {
    let name = basename(path);
    state
        .evidence
        .read_log
        .iter()
        .any(|e| e.path == path || e.basename == name)
}

pub fn record_deviation_approval(state: &mut WorkflowState, deviation: &str, approved_by: Option<&str>) {
    state.evidence.approved_deviations.push(DeviationApproval {
        deviation: deviation.to_string(),
        approved_at: now(),
        approved_by: approved_by.unwrap_or("user").to_string(),
    });
}

pub fn is_deviation_approved(state: &WorkflowState, deviation: &str) -> bool {
    state.evidence.approved_deviations.iter().any(|d| d.deviation == deviation)
}

/// Skills the operator asked for, as reported by a prompt classifier.
/// Re-requesting a skill refreshes its timestamp and clears `used`.
pub fn record_required_skills(state: &mut WorkflowState, skills: &[SkillId]) {
    for skill in skills {
        state.evidence.required_skills.insert(
            skill.clone(),
            RequiredSkill {
                requested_at: now(),
                used: false,
            },
        );
    }
}

pub fn unused_required_skills(state: &WorkflowState) -> Vec<SkillId> {
    state
        .evidence
        .required_skills
        .iter()
        .filter(|(_, r)| !r.used)
        .map(|(id, _)| id.clone())
        .collect()
}

pub fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
