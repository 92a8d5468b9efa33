pub mod classify;
pub mod config;
pub mod evaluate;
pub mod event;
pub mod hook;
pub mod observe;
pub mod start;

pub use classify::*;
pub use config::*;
pub use evaluate::*;
pub use event::*;
pub use hook::*;
pub use observe::*;
pub use start::*;
