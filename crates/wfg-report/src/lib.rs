//! Human-facing output: gate notices, the state summary and the
//! append-only violation log.

pub mod notice;
pub mod summary;
pub mod violation_log;

pub use notice::*;
pub use summary::*;
pub use violation_log::*;
