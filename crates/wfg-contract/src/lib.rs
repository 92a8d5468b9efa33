//! Loaders and validators for the two workflow artifacts: the intent
//! contract and the reference analysis.

pub mod analysis;
pub mod intent;

pub use analysis::*;
pub use intent::*;
