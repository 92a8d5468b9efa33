//! Persistence for [`wfg_core::WorkflowState`]: the file-backed store, an
//! in-memory store for tests, schema migration and the summary projection.

pub mod fs;
pub mod memory;
pub mod migrate;
pub mod summary;
pub mod traits;

pub use fs::*;
pub use memory::*;
pub use migrate::*;
pub use summary::*;
pub use traits::*;
