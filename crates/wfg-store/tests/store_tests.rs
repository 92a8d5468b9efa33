use serde_json::json;
use tempfile::tempdir;
use wfg_core::STATE_VERSION;
use wfg_store::{FsStateStore, StateStore, STATE_FILE_NAME};

#[test]
fn test_legacy_file_loads_and_is_rewritten_as_current() {
    let dir = tempdir().unwrap();
    let legacy = json!({
        "version": "1.0.0",
        "meta": {
            "workflowId": "wf-legacy",
            "strict": true,
            "currentPhase": 1,
            "startedAt": "2026-01-07T10:00:00.000Z",
            "lastUpdated": "2026-01-07T10:00:00.000Z"
        },
        "baseline": {"files": {}},
        "evidence": {"skills_used": {}, "read_log": [], "approved_deviations": []},
        "completed_phases": [],
        "blockers": []
    });
    std::fs::write(dir.path().join(STATE_FILE_NAME), legacy.to_string()).unwrap();

    let store = FsStateStore::for_dir(dir.path());
    let mut state = store.load().unwrap().unwrap();
    assert_eq!(state.version, STATE_VERSION);
    assert!(state.is_strict());
    store.save(&mut state).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(STATE_FILE_NAME)).unwrap()).unwrap();
    assert_eq!(raw["version"], STATE_VERSION);
    assert_eq!(raw["meta"]["strictMode"], true);
    assert!(raw["evidence"].get("skillEvidenceIndexByStepId").is_some());
}

#[test]
fn test_unknown_version_is_an_error_and_lenient_load_yields_none() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(STATE_FILE_NAME), r#"{"version": "3.0.0"}"#).unwrap();
    let store = FsStateStore::for_dir(dir.path());
    let err = store.load().unwrap_err();
    assert!(format!("{err:#}").contains("3.0.0"));
    assert!(store.load_lenient().is_none());
}
