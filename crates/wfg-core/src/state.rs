use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ids::*, model::*, time::*};

pub const STATE_VERSION: &str = "2.0.0";
pub const LEGACY_STATE_VERSION: &str = "1.0.0";

/// Read log entries kept; older entries are evicted first.
pub const READ_LOG_LIMIT: usize = 1000;

/// The persisted aggregate, one per working directory.
///
/// Every collection defaults to empty so that documents written before a
/// field existed still load.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub version: String,
    pub meta: Meta,
    #[serde(default)]
    pub intent_contract_ref: Option<IntentContractRef>,
    #[serde(default)]
    pub active_skill_id: Option<SkillId>,
    #[serde(default)]
    pub active_skill_step_id: Option<StepId>,
    #[serde(default)]
    pub baseline: Baseline,
    #[serde(default)]
    pub registered_inputs: RegisteredInputs,
    #[serde(default)]
    pub locks: Locks,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub decisions: Decisions,
    #[serde(default)]
    pub validations: Validations,
    #[serde(default)]
    pub completed_phases: Vec<u32>,
    #[serde(default)]
    pub blockers: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub workflow_id: WorkflowId,
    #[serde(alias = "strict")]
    pub strict_mode: bool,
    pub current_phase: u32,
    pub started_at: Timestamp,
    pub last_updated: Timestamp,
    /// Set when the operator asked to repeat an existing workflow rather than
    /// build a new one.
    #[serde(default)]
    pub requires_same_workflow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_workflow_requested_at: Option<Timestamp>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntentContractRef {
    pub path: String,
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    pub registered_at: Timestamp,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Baseline {
    #[serde(default)]
    pub files: BTreeMap<String, BaselineEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaselineEntry {
    pub path: String,
    #[serde(alias = "sha256")]
    pub digest: String,
    pub registered_at: Timestamp,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredInputs {
    #[serde(default)]
    pub reference_assets: Vec<ReferenceAssetRegistration>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceAssetRegistration {
    pub asset_id: AssetId,
    #[serde(alias = "sha256")]
    pub digest: String,
    #[serde(default)]
    pub metadata: Value,
    pub registered_at: Timestamp,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Locks {
    #[serde(default)]
    pub reference_assets: Vec<ReferenceAssetLock>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceAssetLock {
    pub asset_id: AssetId,
    #[serde(alias = "sha256")]
    pub digest: String,
    pub locked_at: Timestamp,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    #[serde(default)]
    pub skills_used: BTreeMap<SkillId, SkillUsage>,
    #[serde(default)]
    pub required_skills: BTreeMap<SkillId, RequiredSkill>,
    #[serde(default)]
    pub read_log: Vec<ReadLogEntry>,
    #[serde(default)]
    pub approved_deviations: Vec<DeviationApproval>,
    #[serde(default)]
    pub skill_evidence: Vec<EvidenceRecord>,
    #[serde(default)]
    pub skill_evidence_index_by_step_id: BTreeMap<StepId, Vec<EvidenceId>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkillUsage {
    pub started_at: Timestamp,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
    #[serde(default)]
    pub steps: Vec<StepUsage>,
    #[serde(default)]
    pub details: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepUsage {
    pub step_id: StepId,
    pub started_at: Timestamp,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequiredSkill {
    pub requested_at: Timestamp,
    #[serde(default)]
    pub used: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadLogEntry {
    pub path: String,
    pub basename: String,
    pub read_at: Timestamp,
    #[serde(default = "unknown_session")]
    pub session_id: String,
}

fn unknown_session() -> String {
    "unknown".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviationApproval {
    pub deviation: String,
    pub approved_at: Timestamp,
    #[serde(default)]
    pub approved_by: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    pub id: EvidenceId,
    #[serde(rename = "type")]
    pub ty: EvidenceType,
    #[serde(default)]
    pub data: Value,
    pub captured_at: Timestamp,
    #[serde(default)]
    pub active_skill_id: Option<SkillId>,
    #[serde(default)]
    pub active_skill_step_id: Option<StepId>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Decisions {
    #[serde(default)]
    pub asset_reuse: Vec<AssetReuseDecision>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetReuseDecision {
    pub subject: String,
    pub choice: AssetChoice,
    pub justification: String,
    pub decided_at: Timestamp,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Validations {
    #[serde(default)]
    pub last_results: Vec<ValidationRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    pub check: String,
    pub passed: bool,
    #[serde(default)]
    pub detail: String,
    pub checked_at: Timestamp,
}

impl WorkflowState {
    /// Fresh state: phase 1, nothing registered, no active skill.
    pub fn new(workflow_id: impl Into<String>, strict_mode: bool) -> Self {
        let now = now();
        Self {
            version: STATE_VERSION.to_string(),
            meta: Meta {
                workflow_id: WorkflowId::from_str(workflow_id),
                strict_mode,
                current_phase: 1,
                started_at: now,
                last_updated: now,
                requires_same_workflow: false,
                same_workflow_requested_at: None,
            },
            intent_contract_ref: None,
            active_skill_id: None,
            active_skill_step_id: None,
            baseline: Baseline::default(),
            registered_inputs: RegisteredInputs::default(),
            locks: Locks::default(),
            evidence: Evidence::default(),
            decisions: Decisions::default(),
            validations: Validations::default(),
            completed_phases: vec![],
            blockers: vec![],
        }
    }

    pub fn is_strict(&self) -> bool {
        self.meta.strict_mode
    }

    pub fn touch(&mut self) {
        self.meta.last_updated = now();
    }

    /// Mark the current phase complete and move to the next one.
    pub fn advance_phase(&mut self) -> u32 {
        let done = self.meta.current_phase;
        if self.completed_phases.last().map_or(true, |last| *last < done) {
            self.completed_phases.push(done);
        }
        self.meta.current_phase = done + 1;
        self.meta.current_phase
    }

    /// Adds a blocker unless an identical one is already listed.
    pub fn add_blocker(&mut self, blocker: impl Into<String>) {
        let blocker = blocker.into();
        if !self.blockers.contains(&blocker) {
            self.blockers.push(blocker);
        }
    }

    pub fn clear_blockers(&mut self) {
        self.blockers.clear();
    }

    pub fn request_same_workflow(&mut self) {
        self.meta.requires_same_workflow = true;
        self.meta.same_workflow_requested_at = Some(now());
    }

    /// Every indexed evidence id must resolve to exactly one ledger record.
    /// Runs on every load, so it stays a single pass over the ledger.
    pub fn evidence_index_is_consistent(&self) -> bool {
        let mut counts: BTreeMap<&EvidenceId, usize> = BTreeMap::new();
        for record in &self.evidence.skill_evidence {
            *counts.entry(&record.id).or_default() += 1;
        }
        self.evidence
            .skill_evidence_index_by_step_id
            .values()
            .flatten()
            .all(|id| counts.get(id) == Some(&1))
    }

    /// Restore invariants a hand-edited or truncated file may have broken:
    /// an active step requires an active skill, and index buckets may only
    /// reference ledger records. Returns true if anything changed.
    pub fn repair_invariants(&mut self) -> bool {
        let mut changed = false;
        if self.active_skill_step_id.is_some() && self.active_skill_id.is_none() {
            self.active_skill_step_id = None;
            changed = true;
        }
        if !self.evidence_index_is_consistent() {
            let known: std::collections::BTreeSet<EvidenceId> =
                self.evidence.skill_evidence.iter().map(|r| r.id.clone()).collect();
            for bucket in self.evidence.skill_evidence_index_by_step_id.values_mut() {
                let mut seen = std::collections::BTreeSet::new();
                bucket.retain(|id| known.contains(id) && seen.insert(id.clone()));
            }
            changed = true;
        }
        if self.meta.current_phase == 0 {
            self.meta.current_phase = 1;
            changed = true;
        }
        changed
    }
}
