//! Final message assembly once the provider stream has ended.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::{AssistantMessage, ThinkingBlock, ToolCall};

use super::accumulator::{DeltaAccumulator, PartialThinking, PartialToolCall};

impl DeltaAccumulator {
    /// Finalize the accumulators into one immutable assistant message.
    ///
    /// Tool calls come out in ascending stream-index order. A call whose
    /// arguments do not parse to a JSON object gets an empty object.
    /// Reasoning blocks the provider did not sign are kept as display text
    /// only.
    pub fn finish(self) -> AssistantMessage {
        let thinking_blocks = self
            .thinking
            .into_iter()
            .filter_map(|(index, partial)| finalize_thinking(index, partial))
            .collect();
        let tool_calls = self
            .tool_calls
            .into_iter()
            .map(|(index, partial)| finalize_tool_call(index, partial))
            .collect();

        AssistantMessage {
            id: self.message_id,
            content: self.text,
            reasoning: (!self.reasoning.is_empty()).then_some(self.reasoning),
            thinking_blocks,
            tool_calls,
            usage: self.usage,
            stop_reason: self.stop_reason,
        }
    }
}

fn finalize_thinking(index: usize, partial: PartialThinking) -> Option<ThinkingBlock> {
    if partial.redacted {
        return (!partial.data.is_empty())
            .then_some(ThinkingBlock::RedactedThinking { data: partial.data });
    }
    if partial.signature.is_empty() {
        debug!(index, "unsigned reasoning block is not replayable");
        return None;
    }
    Some(ThinkingBlock::Thinking {
        thinking: partial.thinking,
        signature: partial.signature,
    })
}

fn finalize_tool_call(index: usize, partial: PartialToolCall) -> ToolCall {
    let id = partial
        .id
        .unwrap_or_else(|| format!("toolu_{}", uuid::Uuid::new_v4().simple()));
    let name = partial.name.unwrap_or_default();
    let args = parse_args(index, &name, &partial.args_buffer);
    ToolCall { id, name, args }
}

fn parse_args(index: usize, name: &str, buffer: &str) -> Map<String, Value> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(args)) => args,
        Ok(other) => {
            warn!(index, tool = name, kind = json_kind(&other), "tool arguments are not an object");
            Map::new()
        }
        Err(err) => {
            warn!(index, tool = name, error = %err, "malformed tool arguments, using empty object");
            Map::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
