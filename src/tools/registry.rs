//! Tool registries: the seam between the turn loop and tool transports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use super::arguments::ToolArguments;
use super::tool::Tool;
use super::validation::validate_arguments;
use crate::error::{Result, TurnstileError};
use crate::provider::ToolDefinition;
use crate::types::ToolCall;

/// Source of callable tools.
///
/// Implementations own their connection state; callers hold the registry
/// explicitly instead of reaching for a process-wide client.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>>;

    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> Result<Value>;

    async fn close(&self) -> Result<()>;

    /// Registry-supplied sensitivity predicate, OR-ed with the approval policy.
    fn requires_approval(&self, _call: &ToolCall) -> bool {
        false
    }
}

/// In-process registry of [`Tool`] implementations.
#[derive(Default)]
pub struct LocalToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
    closed: AtomicBool,
}

impl LocalToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; a later tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        match self.index.get(tool.name()) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(tool.name().to_string(), self.tools.len());
                self.tools.push(tool);
            }
        }
        self
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TurnstileError::Registry("registry is closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ToolRegistry for LocalToolRegistry {
    async fn connect(&self) -> Result<()> {
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        self.ensure_open()?;
        Ok(self.tools.iter().map(|tool| tool.definition()).collect())
    }

    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        self.ensure_open()?;
        let tool = self
            .get(name)
            .ok_or_else(|| TurnstileError::ToolNotFound(name.to_string()))?;
        validate_arguments(args, tool.input_schema())
            .map_err(|message| TurnstileError::tool(name, format!("invalid arguments: {message}")))?;
        tool.execute(&ToolArguments::new(args.clone())).await
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn requires_approval(&self, call: &ToolCall) -> bool {
        self.get(&call.name).is_some_and(|tool| tool.requires_approval())
    }
}

/// Wraps a registry and connects it exactly once, on first use.
pub struct LazyRegistry<R> {
    inner: R,
    connected: OnceCell<()>,
}

impl<R: ToolRegistry> LazyRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            connected: OnceCell::new(),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn is_connected(&self) -> bool {
        self.connected.initialized()
    }

    async fn ensure_connected(&self) -> Result<()> {
        self.connected
            .get_or_try_init(|| async {
                debug!("connecting tool registry");
                self.inner.connect().await
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<R: ToolRegistry> ToolRegistry for LazyRegistry<R> {
    async fn connect(&self) -> Result<()> {
        self.ensure_connected().await
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        self.ensure_connected().await?;
        self.inner.list_tools().await
    }

    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        self.ensure_connected().await?;
        self.inner.call_tool(name, args).await
    }

    async fn close(&self) -> Result<()> {
        if self.is_connected() {
            self.inner.close().await?;
        }
        Ok(())
    }

    fn requires_approval(&self, call: &ToolCall) -> bool {
        self.inner.requires_approval(call)
    }
}
