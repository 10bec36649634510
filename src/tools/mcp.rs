//! [`ToolRegistry`] over an MCP client session.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::future::BoxFuture;
use rmcp::model::{CallToolRequestParams, CallToolResult, Content, ResourceContents};
use rmcp::service::{DynService, Peer, RoleClient, RunningService, ServiceError};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::registry::ToolRegistry;
use crate::error::{Result, TurnstileError};
use crate::provider::ToolDefinition;
use crate::types::ToolCall;

pub type McpRunningService = RunningService<RoleClient, Box<dyn DynService<RoleClient>>>;

type Connector = Box<dyn Fn() -> BoxFuture<'static, Result<McpRunningService>> + Send + Sync>;

/// Registry backed by an rmcp client session.
///
/// The session is opened by `connect` through the supplied connector (the
/// rmcp `serve(...)` handshake lives there) and released by `close`.
pub struct McpToolRegistry {
    connector: Option<Connector>,
    session: Mutex<Option<McpRunningService>>,
    approval_tools: HashSet<String>,
}

impl McpToolRegistry {
    pub fn new<F>(connector: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<McpRunningService>> + Send + Sync + 'static,
    {
        Self {
            connector: Some(Box::new(connector)),
            session: Mutex::new(None),
            approval_tools: HashSet::new(),
        }
    }

    /// Wrap a session whose handshake already completed. It cannot be reopened after `close`.
    pub fn from_running_service(session: McpRunningService) -> Self {
        Self {
            connector: None,
            session: Mutex::new(Some(session)),
            approval_tools: HashSet::new(),
        }
    }

    /// Always gate calls to the named server tools.
    pub fn with_approval_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.approval_tools.extend(names.into_iter().map(Into::into));
        self
    }

    /// Handle for issuing requests; the session lock is released on return
    /// so concurrent calls do not queue behind one another.
    async fn peer(&self) -> Result<Peer<RoleClient>> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(not_connected)?;
        Ok(session.peer().clone())
    }
}

#[async_trait]
impl ToolRegistry for McpToolRegistry {
    async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }
        let connector = self.connector.as_ref().ok_or_else(|| {
            TurnstileError::Registry("MCP session was closed and has no connector".into())
        })?;
        *session = Some(connector().await?);
        debug!("MCP session connected");
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        let tools = self
            .peer()
            .await?
            .list_all_tools()
            .await
            .map_err(|e| map_service_error("list_tools", e))?;
        Ok(tools.into_iter().map(map_tool_definition).collect())
    }

    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        let result = self
            .peer()
            .await?
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments: Some(args.clone()),
                task: None,
            })
            .await
            .map_err(|e| map_service_error("call_tool", e))?;
        map_call_result(name, result)
    }

    async fn close(&self) -> Result<()> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        let reason = session
            .cancel()
            .await
            .map_err(|e| TurnstileError::Registry(format!("MCP session shutdown failed: {e}")))?;
        debug!(?reason, "MCP session closed");
        Ok(())
    }

    fn requires_approval(&self, call: &ToolCall) -> bool {
        self.approval_tools.contains(&call.name)
    }
}

fn not_connected() -> TurnstileError {
    TurnstileError::Registry("MCP session is not connected".into())
}

fn map_tool_definition(tool: rmcp::model::Tool) -> ToolDefinition {
    ToolDefinition {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
        input_schema: Value::Object((*tool.input_schema).clone()),
    }
}

fn error_text(content: &[Content]) -> Option<String> {
    let lines: Vec<String> = content
        .iter()
        .filter_map(|item| {
            if let Some(text) = item.as_text() {
                return Some(text.text.clone());
            }
            match item.as_resource().map(|r| &r.resource) {
                Some(ResourceContents::TextResourceContents { text, .. }) => Some(text.clone()),
                _ => None,
            }
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Error results become `ToolExecution`; successes keep the wire shape for rendering.
fn map_call_result(name: &str, result: CallToolResult) -> Result<Value> {
    if result.is_error.unwrap_or(false) {
        let message = error_text(&result.content)
            .or_else(|| result.structured_content.as_ref().map(|v| v.to_string()))
            .unwrap_or_else(|| "MCP tool returned an error result".into());
        return Err(TurnstileError::tool(name, message));
    }
    Ok(serde_json::to_value(&result)?)
}

fn map_service_error(context: &str, error: ServiceError) -> TurnstileError {
    match error {
        ServiceError::McpError(error) => TurnstileError::Registry(format!(
            "{context}: MCP error {}: {}",
            error.code.0, error.message
        )),
        ServiceError::TransportClosed => {
            TurnstileError::Registry(format!("{context}: MCP transport closed"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            TurnstileError::Registry(format!("{context}: MCP request cancelled{suffix}"))
        }
        other => TurnstileError::Registry(format!("{context}: MCP service error: {other}")),
    }
}
