//! Convenience re-exports for common use.

pub use crate::agent_loop::{Checkpoint, Conversation, TurnOrchestrator, TurnOutcome};
pub use crate::approval::{ApprovalPolicy, ApprovalRequest, ApprovalResponse, Decision};
pub use crate::config::TurnstileConfig;
pub use crate::error::{Result, TurnstileError};
pub use crate::provider::{AnthropicProvider, ModelProvider};
pub use crate::tools::{FunctionTool, LocalToolRegistry, Tool, ToolArguments, ToolRegistry};
pub use crate::types::{AssistantMessage, GenerationSettings, Message, StreamChunk, ToolCall};
