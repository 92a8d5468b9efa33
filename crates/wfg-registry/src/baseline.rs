use std::path::Path;

use serde::Serialize;
use wfg_core::{digest_file, now, BaselineEntry, WorkflowState};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Integrity {
    NotRegistered,
    FileNotFound,
    Match,
    HashMismatch { expected: String, actual: String },
}

impl Integrity {
    /// Only a changed digest is a violation.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Integrity::HashMismatch { .. })
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Integrity::NotRegistered => "not_registered",
            Integrity::FileNotFound => "file_not_found",
            Integrity::Match => "match",
            Integrity::HashMismatch { .. } => "hash_mismatch",
        }
    }
}

fn key_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Registration {
    Registered,
    AlreadyRegistered,
    Unhashable,
}

impl Registration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Registration::Registered => "registered",
            Registration::AlreadyRegistered => "already_registered",
            Registration::Unhashable => "unhashable",
        }
    }
}

/// Pin `path` by basename. The first registration wins; later calls for the
/// same basename leave the pin untouched.
pub fn register_baseline(state: &mut WorkflowState, path: &Path) -> Registration {
    if is_registered(state, path) {
        return Registration::AlreadyRegistered;
    }
    let Ok(digest) = digest_file(path) else {
        return Registration::Unhashable;
    };
    state.baseline.files.insert(
        key_for(path),
        BaselineEntry {
            path: path.to_string_lossy().into_owned(),
            digest,
            registered_at: now(),
        },
    );
    Registration::Registered
}

pub fn is_registered(state: &WorkflowState, path: &Path) -> bool {
    state.baseline.files.contains_key(&key_for(path))
}

pub fn check_integrity(state: &WorkflowState, path: &Path) -> Integrity {
    let Some(entry) = state.baseline.files.get(&key_for(path)) else {
        return Integrity::NotRegistered;
    };
    if !path.exists() {
        return Integrity::FileNotFound;
    }
    match digest_file(path) {
        Ok(actual) if actual == entry.digest => Integrity::Match,
        Ok(actual) => Integrity::HashMismatch {
            expected: entry.digest.clone(),
            actual,
        },
        Err(_) => Integrity::FileNotFound,
    }
}

/// Drops the pin for `basename`, so the next registration re-pins it.
pub fn reset_baseline(state: &mut WorkflowState, basename: &str) -> Option<BaselineEntry> {
    state.baseline.files.remove(basename)
}
