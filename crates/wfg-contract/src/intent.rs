use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use wfg_core::{digest_bytes, now, IntentContractRef, WorkflowState};

pub const INTENT_CONTRACT_CANDIDATES: [&str; 3] = [
    "artifacts/intent_contract.yaml",
    "artifacts/intent_contract.yml",
    "artifacts/intent_contract.json",
];

pub const REQUIRED_INTENT_FIELDS: [&str; 6] = [
    "objective",
    "non_goals",
    "inputs",
    "constraints",
    "definition_of_done",
    "allowed_deviations_policy",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("intent contract not found (looked for {})", INTENT_CONTRACT_CANDIDATES.join(", "))]
    NotFound,
    #[error("intent contract {path} could not be parsed: {message}")]
    Parse { path: String, message: String },
    #[error("intent contract {path} is missing fields: {}", fields.join(", "))]
    MissingFields { path: String, fields: Vec<String> },
}

impl IntentError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            IntentError::NotFound => "not_found",
            IntentError::Parse { .. } => "parse_error",
            IntentError::MissingFields { .. } => "missing_fields",
        }
    }

    pub fn missing_fields(&self) -> &[String] {
        match self {
            IntentError::MissingFields { fields, .. } => fields,
            _ => &[],
        }
    }
}

/// A contract that passed validation. `digest` is over the raw file bytes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntentContract {
    pub path: String,
    pub digest: String,
    #[serde(skip)]
    pub document: Mapping,
}

impl IntentContract {
    pub fn objective(&self) -> Option<&str> {
        self.document.get("objective").and_then(Value::as_str)
    }
}

pub fn find_intent_contract(root: &Path) -> Option<PathBuf> {
    INTENT_CONTRACT_CANDIDATES
        .iter()
        .map(|rel| root.join(rel))
        .find(|p| p.is_file())
}

/// Absent, null and empty strings are missing; `false` and `0` are values.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Reads nothing from the state and writes nothing.
pub fn validate_intent_contract(root: &Path) -> Result<IntentContract, IntentError> {
    let path = find_intent_contract(root).ok_or(IntentError::NotFound)?;
    let display = path.to_string_lossy().into_owned();
    let bytes = std::fs::read(&path).map_err(|e| IntentError::Parse {
        path: display.clone(),
        message: e.to_string(),
    })?;
    // JSON is a YAML subset, so one parser covers all three extensions.
    let doc: Value = serde_yaml::from_slice(&bytes).map_err(|e| IntentError::Parse {
        path: display.clone(),
        message: e.to_string(),
    })?;
    let Value::Mapping(document) = doc else {
        return Err(IntentError::Parse {
            path: display,
            message: "top level must be a mapping".to_string(),
        });
    };
    let fields: Vec<String> = REQUIRED_INTENT_FIELDS
        .iter()
        .filter(|f| is_missing(document.get(**f)))
        .map(|f| f.to_string())
        .collect();
    if !fields.is_empty() {
        return Err(IntentError::MissingFields { path: display, fields });
    }
    Ok(IntentContract {
        path: display,
        digest: digest_bytes(&bytes),
        document,
    })
}

pub fn pin_intent_contract(state: &mut WorkflowState, contract: &IntentContract) {
    state.intent_contract_ref = Some(IntentContractRef {
        path: contract.path.clone(),
        digest: contract.digest.clone(),
        objective: contract.objective().map(str::to_string),
        registered_at: now(),
    });
}

/// True when a contract was pinned and the file on disk no longer hashes to
/// the pinned digest.
pub fn intent_contract_changed(state: &WorkflowState, current: &IntentContract) -> bool {
    state
        .intent_contract_ref
        .as_ref()
        .is_some_and(|pinned| pinned.digest != current.digest)
}
