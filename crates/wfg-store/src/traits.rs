use tracing::warn;
use wfg_core::WorkflowState;

pub trait StateStore: Send + Sync {
    /// `Ok(None)` when no workflow has been initialised.
    fn load(&self) -> anyhow::Result<Option<WorkflowState>>;

    /// Stamps `meta.lastUpdated` and persists the whole aggregate.
    fn save(&self, state: &mut WorkflowState) -> anyhow::Result<()>;

    /// Hook entry points must not fail on a damaged state file; they carry on
    /// as if no workflow were active.
    fn load_lenient(&self) -> Option<WorkflowState> {
        match self.load() {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "workflow state unreadable, continuing without it");
                None
            }
        }
    }
}
