//! Turnstile: streaming model turns with a human-approval gate.
//!
//! Decodes an Anthropic-style event stream into assistant messages and
//! drives a resumable generate → act loop whose tool step suspends before
//! destructive calls until a reviewer approves, edits, or rejects them.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use turnstile::prelude::*;
//!
//! # async fn example() -> turnstile::Result<()> {
//! let config = TurnstileConfig::from_env();
//! let provider = Arc::new(AnthropicProvider::new(&config.provider)?);
//! let registry = Arc::new(LocalToolRegistry::new());
//! let orchestrator = Arc::new(TurnOrchestrator::new(provider, registry, &config));
//!
//! let mut conversation = Conversation::new(orchestrator);
//! if let TurnOutcome::Finished { message } = conversation.send("Hello!").await? {
//!     println!("{}", message.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod approval;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod stream;
pub mod tools;
pub mod types;

pub use error::{Result, TurnstileError};
