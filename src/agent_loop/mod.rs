//! Turn loop: generate, route, act, and the resumable conversation driver.

pub mod conversation;
pub mod runner;
pub mod types;

pub use conversation::{Checkpoint, Conversation};
pub use runner::TurnOrchestrator;
pub use types::{route, ActOutcome, DispatchOutcome, Route, TurnOutcome};
