//! Baseline pinning and reference-asset provenance locks.

pub mod baseline;
pub mod provenance;

pub use baseline::*;
pub use provenance::*;
