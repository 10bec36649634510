//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::arguments::ToolArguments;
use crate::error::Result;
use crate::provider::ToolDefinition;

/// Core tool trait; implement to expose an in-process tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for the argument object.
    fn input_schema(&self) -> &Value;

    /// Whether every call to this tool must pass the approval gate.
    fn requires_approval(&self) -> bool {
        false
    }

    async fn execute(&self, args: &ToolArguments) -> Result<Value>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema().clone(),
        }
    }
}

type ToolHandler =
    dyn Fn(ToolArguments) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync;

/// Closure-based tool for quick tool creation.
///
/// ```
/// use serde_json::json;
/// use turnstile::tools::{FunctionTool, Tool};
///
/// let tool = FunctionTool::new(
///     "echo",
///     "Echo the input back",
///     json!({"type": "object", "properties": {"text": {"type": "string"}}}),
///     |args| async move { Ok(json!(args.get_str("text")?)) },
/// );
/// assert_eq!(tool.name(), "echo");
/// assert!(!tool.requires_approval());
/// ```
pub struct FunctionTool {
    name: String,
    description: String,
    input_schema: Value,
    approval: bool,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            approval: false,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Route every call of this tool through the approval gate.
    pub fn with_approval(mut self) -> Self {
        self.approval = true;
        self
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    fn requires_approval(&self) -> bool {
        self.approval
    }

    async fn execute(&self, args: &ToolArguments) -> Result<Value> {
        (self.handler)(args.clone()).await
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("approval", &self.approval)
            .finish()
    }
}
