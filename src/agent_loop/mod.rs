//! Agent loop: turns, events, and the step-bounded runner.

pub mod events;
pub mod runner;
pub mod types;

pub use events::*;
pub use runner::*;
pub use types::*;
