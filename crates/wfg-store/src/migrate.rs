use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use wfg_core::{
    Baseline, DeviationApproval, Evidence, Meta, ReadLogEntry, SkillId, SkillUsage, Timestamp, WorkflowId,
    WorkflowState, LEGACY_STATE_VERSION, STATE_VERSION,
};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("state document has no version tag")]
    MissingVersion,
    #[error("unsupported state version {0}")]
    UnknownVersion(String),
    #[error("malformed {version} state: {source}")]
    Malformed {
        version: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The 1.0.0 layout: camelCase `meta`, snake_case evidence collections.
#[derive(Debug, Deserialize)]
struct LegacyStateV1 {
    meta: LegacyMeta,
    #[serde(default)]
    baseline: Baseline,
    #[serde(default)]
    evidence: LegacyEvidence,
    #[serde(default)]
    completed_phases: Vec<u32>,
    #[serde(default)]
    blockers: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyMeta {
    workflow_id: String,
    #[serde(default = "default_strict")]
    strict: bool,
    #[serde(default = "first_phase")]
    current_phase: u32,
    started_at: Timestamp,
    last_updated: Timestamp,
}

fn default_strict() -> bool {
    true
}

fn first_phase() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
struct LegacyEvidence {
    #[serde(default)]
    skills_used: BTreeMap<String, LegacySkillUse>,
    #[serde(default)]
    read_log: Vec<ReadLogEntry>,
    #[serde(default)]
    approved_deviations: Vec<DeviationApproval>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySkillUse {
    used_at: Timestamp,
    #[serde(default)]
    details: Value,
}

impl LegacyStateV1 {
    fn upgrade(self) -> WorkflowState {
        let mut state = WorkflowState::new(self.meta.workflow_id.clone(), self.meta.strict);
        state.meta = Meta {
            workflow_id: WorkflowId::from_str(self.meta.workflow_id),
            strict_mode: self.meta.strict,
            current_phase: self.meta.current_phase,
            started_at: self.meta.started_at,
            last_updated: self.meta.last_updated,
            requires_same_workflow: false,
            same_workflow_requested_at: None,
        };
        state.baseline = self.baseline;
        // A 1.0.0 skill use was a single point in time.
        let skills_used = self
            .evidence
            .skills_used
            .into_iter()
            .map(|(id, used)| {
                (
                    SkillId::from_str(id),
                    SkillUsage {
                        started_at: used.used_at,
                        completed_at: Some(used.used_at),
                        steps: vec![],
                        details: used.details,
                    },
                )
            })
            .collect();
        state.evidence = Evidence {
            skills_used,
            read_log: self.evidence.read_log,
            approved_deviations: self.evidence.approved_deviations,
            ..Evidence::default()
        };
        state.completed_phases = self.completed_phases;
        state.blockers = self.blockers;
        state
    }
}

/// Parses a state document of any supported version into the current
/// shape. The flag is true when the document was upgraded.
pub fn upgrade_document(doc: Value) -> Result<(WorkflowState, bool), MigrationError> {
    let version = doc
        .get("version")
        .and_then(Value::as_str)
        .ok_or(MigrationError::MissingVersion)?
        .to_string();
    match version.as_str() {
        STATE_VERSION => {
            let state = serde_json::from_value(doc).map_err(|source| MigrationError::Malformed { version, source })?;
            Ok((state, false))
        }
        LEGACY_STATE_VERSION => {
            let legacy: LegacyStateV1 =
                serde_json::from_value(doc).map_err(|source| MigrationError::Malformed { version, source })?;
            Ok((legacy.upgrade(), true))
        }
        _ => Err(MigrationError::UnknownVersion(version)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v1_doc() -> Value {
        json!({
            "version": "1.0.0",
            "meta": {
                "workflowId": "video-42",
                "strict": false,
                "currentPhase": 3,
                "startedAt": "2026-01-07T10:00:00.000Z",
                "lastUpdated": "2026-01-07T11:00:00.000Z"
            },
            "baseline": {
                "files": {
                    "create_video.py": {
                        "path": "/repo/create_video.py",
                        "sha256": "aa11",
                        "registeredAt": "2026-01-07T10:01:00.000Z"
                    }
                }
            },
            "evidence": {
                "skills_used": {"video-edit": {"usedAt": "2026-01-07T10:02:00.000Z", "details": {}}},
                "read_log": [{
                    "path": "/repo/create_video.py",
                    "basename": "create_video.py",
                    "readAt": "2026-01-07T10:03:00.000Z",
                    "sessionId": "s1"
                }],
                "approved_deviations": [{
                    "deviation": "bash:rm -rf",
                    "approvedAt": "2026-01-07T10:04:00.000Z",
                    "approvedBy": "user"
                }]
            },
            "completed_phases": [1, 2],
            "blockers": ["waiting on assets"]
        })
    }

    #[test]
    fn upgrades_v1() {
        let (s, migrated) = upgrade_document(v1_doc()).unwrap();
        assert!(migrated);
        assert_eq!(s.version, STATE_VERSION);
        assert!(!s.is_strict());
        assert_eq!(s.meta.current_phase, 3);
        assert_eq!(s.baseline.files["create_video.py"].digest, "aa11");
        assert_eq!(s.evidence.read_log[0].session_id, "s1");
        assert_eq!(s.evidence.approved_deviations.len(), 1);
        let usage = &s.evidence.skills_used[&SkillId::from_str("video-edit")];
        assert_eq!(usage.completed_at, Some(usage.started_at));
        assert_eq!(s.completed_phases, vec![1, 2]);
        assert_eq!(s.blockers, vec!["waiting on assets".to_string()]);
        assert!(s.evidence.skill_evidence.is_empty());
    }

    #[test]
    fn current_version_passes_through() {
        let s = WorkflowState::new("wf", true);
        let (back, migrated) = upgrade_document(serde_json::to_value(&s).unwrap()).unwrap();
        assert!(!migrated);
        assert_eq!(back, s);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = upgrade_document(json!({"version": "9.9.9"})).unwrap_err();
        assert!(matches!(err, MigrationError::UnknownVersion(v) if v == "9.9.9"));
        assert!(matches!(upgrade_document(json!({})), Err(MigrationError::MissingVersion)));
    }
}
