use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use wfg_contract::ReferenceAnalysis;
use wfg_core::{digest_file, now, AssetId, HashError, ReferenceAssetLock, ReferenceAssetRegistration, WorkflowState};

/// Upserts `asset_id` into the registration log and the lock table. Unlike
/// baselines, re-registering an asset replaces its digest.
pub fn register_reference_asset(state: &mut WorkflowState, asset_id: &AssetId, digest: &str, metadata: Value) {
    let at = now();
    let reg = ReferenceAssetRegistration {
        asset_id: asset_id.clone(),
        digest: digest.to_string(),
        metadata,
        registered_at: at,
    };
    let regs = &mut state.registered_inputs.reference_assets;
    match regs.iter_mut().find(|r| &r.asset_id == asset_id) {
        Some(slot) => *slot = reg,
        None => regs.push(reg),
    }

    let lock = ReferenceAssetLock {
        asset_id: asset_id.clone(),
        digest: digest.to_string(),
        locked_at: at,
    };
    let locks = &mut state.locks.reference_assets;
    match locks.iter_mut().find(|l| &l.asset_id == asset_id) {
        Some(slot) => *slot = lock,
        None => locks.push(lock),
    }
}

pub fn register_reference_file(
    state: &mut WorkflowState,
    asset_id: &AssetId,
    path: &Path,
    metadata: Value,
) -> Result<String, HashError> {
    let digest = digest_file(path)?;
    register_reference_asset(state, asset_id, &digest, metadata);
    Ok(digest)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMismatch {
    pub asset_id: AssetId,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProvenanceCheck {
    pub valid: bool,
    pub reason: &'static str,
    pub mismatches: Vec<AssetMismatch>,
}

/// Every lock must appear in the analysis with the locked digest. All
/// mismatches are reported, not just the first.
pub fn verify_provenance(state: &WorkflowState, analysis: &ReferenceAnalysis) -> ProvenanceCheck {
    let locks = &state.locks.reference_assets;
    if locks.is_empty() {
        return ProvenanceCheck {
            valid: true,
            reason: "no_locks",
            mismatches: vec![],
        };
    }
    let mut mismatches = Vec::new();
    for lock in locks {
        match analysis.asset(lock.asset_id.as_str()) {
            None => mismatches.push(AssetMismatch {
                asset_id: lock.asset_id.clone(),
                reason: "not_analyzed",
                expected: Some(lock.digest.clone()),
                actual: None,
            }),
            Some(asset) if asset.sha256 != lock.digest => mismatches.push(AssetMismatch {
                asset_id: lock.asset_id.clone(),
                reason: "hash_mismatch",
                expected: Some(lock.digest.clone()),
                actual: Some(asset.sha256.clone()),
            }),
            Some(_) => {}
        }
    }
    if mismatches.is_empty() {
        ProvenanceCheck {
            valid: true,
            reason: "verified",
            mismatches,
        }
    } else {
        ProvenanceCheck {
            valid: false,
            reason: "provenance_mismatch",
            mismatches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wfg_contract::AnalyzedAsset;

    fn asset(id: &str, sha: &str) -> AnalyzedAsset {
        AnalyzedAsset {
            asset_id: id.to_string(),
            kind: "image".to_string(),
            sha256: sha.to_string(),
            metadata: Value::Null,
            derived_features: Value::Null,
            timestamp: Value::Null,
        }
    }

    #[test]
    fn reregistration_overwrites_in_place() {
        let mut s = WorkflowState::new("wf", true);
        register_reference_asset(&mut s, &AssetId::from_str("a"), "h1", json!({}));
        register_reference_asset(&mut s, &AssetId::from_str("b"), "h2", json!({}));
        register_reference_asset(&mut s, &AssetId::from_str("a"), "h3", json!({"v": 2}));
        assert_eq!(s.locks.reference_assets.len(), 2);
        assert_eq!(s.locks.reference_assets[0].digest, "h3");
        assert_eq!(s.registered_inputs.reference_assets[0].metadata["v"], 2);
    }

    #[test]
    fn no_locks_is_valid() {
        let s = WorkflowState::new("wf", true);
        let check = verify_provenance(&s, &ReferenceAnalysis { assets: vec![] });
        assert!(check.valid);
        assert_eq!(check.reason, "no_locks");
    }

    #[test]
    fn every_mismatch_is_listed() {
        let mut s = WorkflowState::new("wf", true);
        register_reference_asset(&mut s, &AssetId::from_str("a"), "h1", Value::Null);
        register_reference_asset(&mut s, &AssetId::from_str("b"), "h2", Value::Null);
        register_reference_asset(&mut s, &AssetId::from_str("c"), "h3", Value::Null);
        let analysis = ReferenceAnalysis {
            assets: vec![asset("a", "h1"), asset("b", "other")],
        };
        let check = verify_provenance(&s, &analysis);
        assert!(!check.valid);
        assert_eq!(check.reason, "provenance_mismatch");
        assert_eq!(check.mismatches.len(), 2);
        assert_eq!(check.mismatches[0].reason, "hash_mismatch");
        assert_eq!(check.mismatches[0].actual.as_deref(), Some("other"));
        assert_eq!(check.mismatches[1].reason, "not_analyzed");
    }

    #[test]
    fn matching_analysis_verifies() {
        let mut s = WorkflowState::new("wf", true);
        register_reference_asset(&mut s, &AssetId::from_str("a"), "h1", Value::Null);
        let check = verify_provenance(&s, &ReferenceAnalysis { assets: vec![asset("a", "h1")] });
        assert!(check.valid);
        assert_eq!(check.reason, "verified");
    }

    #[test]
    fn file_registration_uses_content_digest() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ref.png");
        std::fs::write(&p, b"pixels").unwrap();
        let mut s = WorkflowState::new("wf", true);
        let d = register_reference_file(&mut s, &AssetId::from_str("ref"), &p, Value::Null).unwrap();
        assert_eq!(d, wfg_core::digest_bytes(b"pixels"));
        assert_eq!(s.locks.reference_assets[0].digest, d);
    }
}
