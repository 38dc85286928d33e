//! Agentic turn orchestration (turn loop, events, outcomes).

pub mod events;
pub mod runner;
pub mod types;

pub use events::*;
pub use runner::*;
pub use types::*;
