use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};
use wfg_core::WorkflowState;

use crate::migrate::upgrade_document;
use crate::traits::StateStore;

pub const STATE_FILE_NAME: &str = ".workflow_state.json";

/// One pretty-printed JSON file per working directory. Last writer wins.
#[derive(Clone, Debug)]
pub struct FsStateStore {
    path: PathBuf,
}

impl FsStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn for_dir(root: &Path) -> Self {
        Self::new(root.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

impl StateStore for FsStateStore {
    fn load(&self) -> Result<Option<WorkflowState>> {
        if !self.exists() {
            debug!(path = %self.path.display(), "no workflow state file");
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read workflow state {}", self.path.display()))?;
        let doc: serde_json::Value =
            serde_json::from_str(&raw).with_context(|| format!("parse workflow state {}", self.path.display()))?;
        let (mut state, migrated) = upgrade_document(doc)?;
        if migrated {
            info!(path = %self.path.display(), "migrated workflow state to {}", state.version);
        }
        if state.repair_invariants() {
            info!(path = %self.path.display(), "repaired inconsistent workflow state");
        }
        Ok(Some(state))
    }

    fn save(&self, state: &mut WorkflowState) -> Result<()> {
        state.touch();
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).with_context(|| format!("write workflow state {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| format!("replace workflow state {}", self.path.display()))?;
        debug!(path = %self.path.display(), "saved workflow state");
        Ok(())
    }
}
