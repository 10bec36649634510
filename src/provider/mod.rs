//! Model provider trait and implementations.

pub mod anthropic;
pub mod http;
pub mod sanitize;

pub use anthropic::AnthropicProvider;
pub use sanitize::sanitize_history;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::stream::collect_message;
use crate::types::{new_message_id, AssistantMessage, ChunkSink, GenerationSettings, Message};

/// Raw response body of a streaming provider call.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// A request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub messages: Vec<Message>,
    pub settings: GenerationSettings,
    pub tools: Vec<ToolDefinition>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Core trait implemented by model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "anthropic").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Start a streaming call.
    ///
    /// A non-success response is an error before any byte is yielded.
    async fn stream(&self, request: &ProviderRequest) -> Result<ByteStream>;
}

/// Run one provider call to completion, forwarding chunks to `sink`.
pub async fn stream_message(
    provider: &dyn ModelProvider,
    request: &ProviderRequest,
    sink: Option<ChunkSink>,
) -> Result<AssistantMessage> {
    let message_id = new_message_id();
    debug!(
        provider = provider.provider_name(),
        model = provider.model_id(),
        message_id = %message_id,
        messages = request.messages.len(),
        tools = request.tools.len(),
        "starting provider stream"
    );
    let bytes = provider.stream(request).await?;
    collect_message(bytes, message_id, sink).await
}
