//! Anthropic Messages API provider.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{Result, TurnstileError};
use crate::types::Message;

use super::http::{anthropic_headers, status_to_error};
use super::{ByteStream, ModelProvider, ProviderRequest};

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    api_version: String,
    model: String,
}

impl AnthropicProvider {
    /// Build a provider from configuration. Fails without an API key.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TurnstileError::Configuration("ANTHROPIC_API_KEY is not set".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            model: config.model.clone(),
        })
    }

    fn build_request_body(&self, request: &ProviderRequest) -> Value {
        let settings = &request.settings;
        let thinking = settings.thinking_budget.is_some();
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages: Vec<Value> = Vec::new();
        let mut tool_results: Vec<Value> = Vec::new();

        for msg in &request.messages {
            if !matches!(msg, Message::ToolResult(_)) && !tool_results.is_empty() {
                messages.push(json!({
                    "role": "user",
                    "content": std::mem::take(&mut tool_results),
                }));
            }
            match msg {
                Message::System { content } => system_parts.push(content),
                Message::Human { content } => {
                    messages.push(json!({"role": "user", "content": content}));
                }
                Message::Assistant(assistant) => {
                    let mut content: Vec<Value> = Vec::new();
                    // Signed reasoning must precede tool use when thinking is on.
                    if thinking {
                        content.extend(assistant.thinking_blocks.iter().map(|block| json!(block)));
                    }
                    if !assistant.content.is_empty() {
                        content.push(json!({"type": "text", "text": assistant.content}));
                    }
                    for call in &assistant.tool_calls {
                        content.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.args,
                        }));
                    }
                    if !content.is_empty() {
                        messages.push(json!({"role": "assistant", "content": content}));
                    }
                }
                Message::ToolResult(result) => {
                    tool_results.push(json!({
                        "type": "tool_result",
                        "tool_use_id": result.tool_call_id,
                        "content": result.content,
                        "is_error": result.is_error,
                    }));
                }
            }
        }
        if !tool_results.is_empty() {
            messages.push(json!({"role": "user", "content": tool_results}));
        }

        let mut body = serde_json::Map::new();
        body.insert("model".into(), self.model.clone().into());
        body.insert("messages".into(), messages.into());
        body.insert("max_tokens".into(), settings.effective_max_tokens().into());
        body.insert("stream".into(), true.into());

        if !system_parts.is_empty() {
            body.insert("system".into(), system_parts.join("\n").into());
        }
        if let Some(temp) = settings.temperature {
            // Temperature is not accepted alongside extended thinking.
            if !thinking {
                body.insert("temperature".into(), temp.into());
            }
        }
        if let Some(top_p) = settings.top_p {
            body.insert("top_p".into(), top_p.into());
        }
        if let Some(top_k) = settings.top_k {
            body.insert("top_k".into(), top_k.into());
        }
        if let Some(ref stops) = settings.stop_sequences {
            body.insert("stop_sequences".into(), json!(stops));
        }
        if let Some(budget) = settings.thinking_budget {
            body.insert(
                "thinking".into(),
                json!({"type": "enabled", "budget_tokens": budget}),
            );
        }
        if !request.tools.is_empty() {
            let tool_defs: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
            body.insert("tools".into(), tool_defs.into());
        }

        Value::Object(body)
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: &ProviderRequest) -> Result<ByteStream> {
        let body = self.build_request_body(request);
        let url = format!("{}/messages", self.base_url);

        debug!(model = %self.model, url = %url, "anthropic stream");

        let resp = self
            .client
            .post(&url)
            .headers(anthropic_headers(&self.api_key, &self.api_version))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body_text));
        }

        let bytes = resp.bytes_stream().map(|chunk| {
            chunk
                .map(|b| b.to_vec())
                .map_err(|e| TurnstileError::Stream(format!("response body interrupted: {e}")))
        });
        Ok(Box::pin(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolDefinition;
    use crate::stream::{DeltaAccumulator, Frame};
    use crate::types::{AssistantMessage, GenerationSettings, ThinkingBlock, ToolCall, ToolResultMessage};
    use pretty_assertions::assert_eq;

    fn provider() -> AnthropicProvider {
        let config = ProviderConfig {
            api_key: Some("test-key".into()),
            ..Default::default()
        };
        AnthropicProvider::new(&config).unwrap()
    }

    fn request(messages: Vec<Message>, settings: GenerationSettings) -> ProviderRequest {
        ProviderRequest {
            messages,
            settings,
            tools: Vec::new(),
        }
    }

    #[test]
    fn missing_api_key_is_configuration_error() {
        let err = AnthropicProvider::new(&ProviderConfig::default()).err().unwrap();
        assert!(matches!(err, TurnstileError::Configuration(_)));
    }

    #[test]
    fn request_body_includes_thinking_config() {
        let settings = GenerationSettings::builder()
            .thinking_budget(10_000)
            .temperature(0.7)
            .build();
        let body = provider().build_request_body(&request(vec![Message::human("hello")], settings));
        assert_eq!(body["thinking"]["type"], "enabled");
        assert_eq!(body["thinking"]["budget_tokens"], 10_000);
        assert_eq!(body["max_tokens"], 14_096);
        assert!(body.get("temperature").is_none());
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn request_body_lifts_system_and_merges_tool_results() {
        let mut assistant = AssistantMessage::text("checking");
        let first = ToolCall::new("t1", "lookup", serde_json::Map::new());
        let second = ToolCall::new("t2", "lookup", serde_json::Map::new());
        assistant.tool_calls = vec![first.clone(), second.clone()];
        let messages = vec![
            Message::system("be brief"),
            Message::human("hi"),
            Message::Assistant(assistant),
            Message::ToolResult(ToolResultMessage::success(&first, "one")),
            Message::ToolResult(ToolResultMessage::error(&second, "boom")),
        ];
        let body = provider().build_request_body(&request(messages, GenerationSettings::default()));

        assert_eq!(body["system"], "be brief");
        let wire = body["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[1]["content"][1]["type"], "tool_use");
        assert_eq!(wire[1]["content"][1]["input"], json!({}));
        assert_eq!(wire[2]["role"], "user");
        let results = wire[2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1]["tool_use_id"], "t2");
        assert_eq!(results[1]["is_error"], true);
    }

    fn thinking_tool_turn() -> AssistantMessage {
        let mut acc = DeltaAccumulator::new("msg_1", None);
        for payload in [
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "plan"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "signature_delta", "signature": "SIG"}}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "t1", "name": "list_windows", "input": {}}}),
        ] {
            let event = payload["type"].as_str().unwrap_or("message").to_string();
            acc.apply(&Frame { event, payload }).unwrap();
        }
        acc.finish()
    }

    #[test]
    fn signed_thinking_is_replayed_before_tool_use() {
        let assistant = thinking_tool_turn();
        let call = assistant.tool_calls[0].clone();
        let messages = vec![
            Message::human("what is open?"),
            Message::Assistant(assistant),
            Message::ToolResult(ToolResultMessage::success(&call, "w-1")),
        ];
        let settings = GenerationSettings::builder().thinking_budget(2048).build();
        let body = provider().build_request_body(&request(messages, settings));

        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(
            content[0],
            json!({"type": "thinking", "thinking": "plan", "signature": "SIG"})
        );
        assert_eq!(content[1]["type"], "tool_use");
        assert_eq!(content[1]["id"], "t1");
    }

    #[test]
    fn reasoning_blocks_are_omitted_without_thinking() {
        let mut assistant = AssistantMessage::text("done");
        assistant.thinking_blocks = vec![ThinkingBlock::RedactedThinking { data: "opaque".into() }];
        let messages = vec![Message::human("hi"), Message::Assistant(assistant)];
        let body = provider().build_request_body(&request(messages, GenerationSettings::default()));
        assert_eq!(body["messages"][1]["content"], json!([{"type": "text", "text": "done"}]));
    }

    #[test]
    fn request_body_lists_tools() {
        let mut req = request(vec![Message::human("hi")], GenerationSettings::default());
        req.tools = vec![ToolDefinition {
            name: "close_browser_window".into(),
            description: "Close a window".into(),
            input_schema: json!({"type": "object", "properties": {}}),
        }];
        let body = provider().build_request_body(&req);
        assert_eq!(body["tools"][0]["name"], "close_browser_window");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(body["max_tokens"], 4096);
    }
}
