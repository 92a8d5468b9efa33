//! Linter for workflow, policy and skill-mapping definition files.

pub mod lint;
pub mod rule;
pub mod types;

pub use lint::*;
pub use rule::*;
pub use types::*;
