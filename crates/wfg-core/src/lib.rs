//! Workflow state model, identifiers, gate decisions and content hashing
//! shared by every other `wfg-*` crate.

pub mod decision;
pub mod hashing;
pub mod ids;
pub mod model;
pub mod state;
pub mod time;

pub use decision::*;
pub use hashing::*;
pub use ids::*;
pub use model::*;
pub use state::*;
pub use time::*;
