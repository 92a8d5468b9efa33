//! Append-only evidence ledger and the skill/step transition gate.

pub mod evidence;
pub mod transition;

pub use evidence::*;
pub use transition::*;
