//! Delta accumulation over decoded provider frames.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Result, TurnstileError};
use crate::types::{ChunkSink, StopReason, StreamChunk, Usage};

use super::frame::Frame;

/// A tool call still being streamed.
///
/// `id` and `name` are set on first sight only; `args_buffer` only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialToolCall {
    pub id: Option<String>,
    pub name: Option<String>,
    pub args_buffer: String,
}

/// A reasoning block still being streamed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialThinking {
    pub redacted: bool,
    pub thinking: String,
    pub signature: String,
    pub data: String,
}

/// Mutable state for one provider call.
pub struct DeltaAccumulator {
    pub(super) message_id: String,
    sink: Option<ChunkSink>,
    pub(super) text: String,
    pub(super) reasoning: String,
    pub(super) thinking: BTreeMap<usize, PartialThinking>,
    pub(super) tool_calls: BTreeMap<usize, PartialToolCall>,
    pub(super) usage: Option<Usage>,
    pub(super) stop_reason: Option<StopReason>,
}

impl DeltaAccumulator {
    pub fn new(message_id: impl Into<String>, sink: Option<ChunkSink>) -> Self {
        Self {
            message_id: message_id.into(),
            sink,
            text: String::new(),
            reasoning: String::new(),
            thinking: BTreeMap::new(),
            tool_calls: BTreeMap::new(),
            usage: None,
            stop_reason: None,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn thinking_block(&self, index: usize) -> Option<&PartialThinking> {
        self.thinking.get(&index)
    }

    pub fn tool_call(&self, index: usize) -> Option<&PartialToolCall> {
        self.tool_calls.get(&index)
    }

    /// Fold one frame into the accumulators.
    ///
    /// An `error` event fails the whole provider call.
    pub fn apply(&mut self, frame: &Frame) -> Result<()> {
        let payload = &frame.payload;
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(frame.event.as_str());

        if frame.event == "error" || kind == "error" {
            return Err(TurnstileError::Stream(stream_error_message(payload)));
        }

        match kind {
            "message_start" => {
                if let Some(usage) = payload.get("message").and_then(|m| m.get("usage")) {
                    self.usage.get_or_insert_with(Usage::default).update_from(usage);
                }
            }
            "content_block_start" => self.on_block_start(payload),
            "content_block_delta" => self.on_block_delta(payload),
            "message_delta" => {
                if let Some(reason) = payload
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(Value::as_str)
                {
                    self.stop_reason = StopReason::from_str(reason).ok();
                }
                if let Some(usage) = payload.get("usage") {
                    self.usage.get_or_insert_with(Usage::default).update_from(usage);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_block_start(&mut self, payload: &Value) {
        let Some(block) = payload.get("content_block") else {
            return;
        };
        let index = block_index(payload);
        match block.get("type").and_then(Value::as_str).unwrap_or("") {
            "text" => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    self.push_text(text);
                }
            }
            kind @ ("thinking" | "redacted_thinking") => {
                let entry = self.thinking.entry(index).or_default();
                entry.redacted = kind == "redacted_thinking";
                if let Some(signature) = block.get("signature").and_then(Value::as_str) {
                    entry.signature.push_str(signature);
                }
                if let Some(data) = block.get("data").and_then(Value::as_str) {
                    entry.data.push_str(data);
                }
                if let Some(text) = reasoning_text(block) {
                    entry.thinking.push_str(text);
                    self.push_reasoning(text);
                }
            }
            "tool_use" => {
                let entry = self.tool_calls.entry(index).or_default();
                if entry.id.is_none() {
                    entry.id = block.get("id").and_then(Value::as_str).map(str::to_string);
                }
                if entry.name.is_none() {
                    entry.name = block.get("name").and_then(Value::as_str).map(str::to_string);
                }
                if let Some(input) = block.get("input").and_then(Value::as_object) {
                    if !input.is_empty() && entry.args_buffer.is_empty() {
                        entry.args_buffer = Value::Object(input.clone()).to_string();
                    }
                }
            }
            _ => {}
        }
    }

    fn on_block_delta(&mut self, payload: &Value) {
        let Some(delta) = payload.get("delta") else {
            return;
        };
        let index = block_index(payload);
        match delta.get("type").and_then(Value::as_str).unwrap_or("") {
            "text_delta" => {
                if let Some(text) = delta.get("text").and_then(Value::as_str) {
                    self.push_text(text);
                }
            }
            "thinking_delta" | "redacted_thinking_delta" => {
                if let Some(text) = reasoning_text(delta) {
                    self.thinking.entry(index).or_default().thinking.push_str(text);
                    self.push_reasoning(text);
                }
            }
            "signature_delta" => {
                if let Some(signature) = delta.get("signature").and_then(Value::as_str) {
                    self.thinking.entry(index).or_default().signature.push_str(signature);
                }
            }
            "input_json_delta" => {
                if let Some(fragment) = delta.get("partial_json").and_then(Value::as_str) {
                    self.tool_calls
                        .entry(index)
                        .or_default()
                        .args_buffer
                        .push_str(fragment);
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.text.push_str(fragment);
        self.emit(StreamChunk::ContentChunk {
            message_id: self.message_id.clone(),
            content: fragment.to_string(),
        });
    }

    fn push_reasoning(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.reasoning.push_str(fragment);
        self.emit(StreamChunk::ReasoningChunk {
            message_id: self.message_id.clone(),
            content: fragment.to_string(),
        });
    }

    fn emit(&self, chunk: StreamChunk) {
        if let Some(sink) = &self.sink {
            sink(chunk);
        }
    }
}

fn block_index(payload: &Value) -> usize {
    payload
        .get("index")
        .and_then(Value::as_u64)
        .map(|i| i as usize)
        .unwrap_or(0)
}

/// Providers name the reasoning field either `thinking` or `text`.
fn reasoning_text(value: &Value) -> Option<&str> {
    value
        .get("thinking")
        .or_else(|| value.get("text"))
        .and_then(Value::as_str)
}

fn stream_error_message(payload: &Value) -> String {
    payload
        .get("error")
        .and_then(|e| e.get("message"))
        .or_else(|| payload.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("provider stream error: {payload}"))
}
