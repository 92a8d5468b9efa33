use std::sync::Mutex;

use anyhow::anyhow;
use wfg_core::WorkflowState;

use crate::traits::StateStore;

/// In-memory store for tests. Not durable.
#[derive(Default)]
pub struct InMemoryStateStore {
    inner: Mutex<Option<WorkflowState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: WorkflowState) -> Self {
        Self {
            inner: Mutex::new(Some(state)),
        }
    }
}

impl StateStore for InMemoryStateStore {
    fn load(&self) -> anyhow::Result<Option<WorkflowState>> {
        let inner = self.inner.lock().map_err(|_| anyhow!("state lock poisoned"))?;
        Ok(inner.clone())
    }

    fn save(&self, state: &mut WorkflowState) -> anyhow::Result<()> {
        state.touch();
        let mut inner = self.inner.lock().map_err(|_| anyhow!("state lock poisoned"))?;
        *inner = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        let store = InMemoryStateStore::new();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_state() {
        let store = InMemoryStateStore::with_state(WorkflowState::new("a", true));
        let mut s = WorkflowState::new("b", false);
        store.save(&mut s).unwrap();
        let back = store.load().unwrap().unwrap();
        assert_eq!(back.meta.workflow_id.as_str(), "b");
    }
}
