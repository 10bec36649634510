//! Shared test helpers: scripted provider, recording registry, SSE builders.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use turnstile::config::TurnstileConfig;
use turnstile::error::{Result, TurnstileError};
use turnstile::provider::{ByteStream, ModelProvider, ProviderRequest, ToolDefinition};
use turnstile::tools::{FunctionTool, LocalToolRegistry, ToolRegistry};
use turnstile::agent_loop::TurnOrchestrator;
use turnstile::types::ToolCall;

/// A provider that replays canned SSE bodies, one per call.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn stream(&self, request: &ProviderRequest) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(request.clone());
        let wire = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TurnstileError::api(500, "no scripted turn left"))?;
        // Odd-sized chunks so frames and UTF-8 sequences straddle boundaries.
        let chunks: Vec<Result<Vec<u8>>> = wire
            .into_bytes()
            .chunks(7)
            .map(|c| Ok(c.to_vec()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

fn frame(payload: Value) -> String {
    let event = payload["type"].as_str().unwrap_or("message").to_string();
    format!("event: {event}\ndata: {payload}\n\n")
}

/// SSE body for a plain text reply.
pub fn text_turn(text: &str) -> String {
    let mid = text.char_indices().nth(text.chars().count() / 2).map_or(0, |(i, _)| i);
    let (head, tail) = text.split_at(mid);
    [
        frame(json!({"type": "message_start", "message": {"id": "msg_provider", "usage": {"input_tokens": 12, "output_tokens": 1}}})),
        frame(json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}})),
        frame(json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": head}})),
        frame(json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": tail}})),
        frame(json!({"type": "content_block_stop", "index": 0})),
        frame(json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 9}})),
        frame(json!({"type": "message_stop"})),
    ]
    .concat()
}

/// SSE body for a reply that calls tools; arguments arrive in two fragments.
pub fn tool_turn(calls: &[(&str, &str, Value)]) -> String {
    let mut out = frame(json!({"type": "message_start", "message": {"usage": {"input_tokens": 20, "output_tokens": 1}}}));
    for (index, (id, name, args)) in calls.iter().enumerate() {
        let raw = args.to_string();
        let (head, tail) = raw.split_at(raw.len() / 2);
        out.push_str(&frame(json!({
            "type": "content_block_start",
            "index": index,
            "content_block": {"type": "tool_use", "id": id, "name": name, "input": {}}
        })));
        for fragment in [head, tail] {
            out.push_str(&frame(json!({
                "type": "content_block_delta",
                "index": index,
                "delta": {"type": "input_json_delta", "partial_json": fragment}
            })));
        }
        out.push_str(&frame(json!({"type": "content_block_stop", "index": index})));
    }
    out.push_str(&frame(json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}})));
    out.push_str(&frame(json!({"type": "message_stop"})));
    out
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Local tools wrapped with a dispatch log and a concurrency gauge.
pub struct RecordingRegistry {
    inner: LocalToolRegistry,
    dispatched: Mutex<Vec<(String, Map<String, Value>)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl RecordingRegistry {
    pub fn new() -> Arc<Self> {
        let inner = LocalToolRegistry::new()
            .with_tool(FunctionTool::new(
                "list_windows",
                "List open browser windows",
                json!({"type": "object", "properties": {}}),
                |_| async { Ok(json!({"content": [{"type": "text", "text": "w-1, w-2"}]})) },
            ))
            .with_tool(FunctionTool::new(
                "delete_browser_window",
                "Delete a browser window",
                json!({
                    "type": "object",
                    "properties": {"window_id": {"type": "string"}},
                    "required": ["window_id"]
                }),
                |args| async move { Ok(json!(format!("deleted {}", args.get_str("window_id")?))) },
            ))
            .with_tool(FunctionTool::new(
                "slow_lookup",
                "Look up a key after a delay",
                json!({"type": "object", "properties": {"key": {"type": "string"}, "delay_ms": {"type": "integer"}}}),
                |args| async move {
                    let delay = args.get_i64("delay_ms").unwrap_or(0).max(0) as u64;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(json!(format!("value:{}", args.get_str("key")?)))
                },
            ))
            .with_tool(FunctionTool::new(
                "explode",
                "Always fails",
                json!({"type": "object"}),
                |_| async { Err(TurnstileError::tool("explode", "kaboom")) },
            ));
        Arc::new(Self {
            inner,
            dispatched: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    pub fn dispatched(&self) -> Vec<(String, Map<String, Value>)> {
        self.dispatched.lock().unwrap().clone()
    }

    pub fn dispatch_count(&self, name: &str) -> usize {
        self.dispatched().iter().filter(|(n, _)| n == name).count()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolRegistry for RecordingRegistry {
    async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        self.inner.list_tools().await
    }

    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        self.dispatched
            .lock()
            .unwrap()
            .push((name.to_string(), args.clone()));
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let result = self.inner.call_tool(name, args).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn requires_approval(&self, call: &ToolCall) -> bool {
        self.inner.requires_approval(call)
    }
}

pub fn orchestrator(
    provider: Arc<ScriptedProvider>,
    registry: Arc<RecordingRegistry>,
    config: &TurnstileConfig,
) -> Arc<TurnOrchestrator> {
    Arc::new(TurnOrchestrator::new(provider, registry, config))
}
