//! Transcript sanitization before a provider call.

use std::collections::{HashMap, HashSet};

use crate::types::{Message, ToolResultMessage};

const MISSING_RESULT: &str = "Not executed: an earlier action in this batch was not completed.";

/// Rewrite history so every tool call is answered exactly once.
///
/// Results that match no preceding call are dropped. Calls left without a
/// result (a batch abandoned after a rejection) get a synthetic error result.
/// Assistant messages with neither text nor tool calls are dropped.
pub fn sanitize_history(messages: &[Message]) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    let mut seen_results: HashSet<&str> = HashSet::new();

    let mut i = 0usize;
    while i < messages.len() {
        let assistant = match &messages[i] {
            Message::Assistant(msg) => msg,
            Message::ToolResult(_) => {
                i += 1;
                continue;
            }
            other => {
                out.push(other.clone());
                i += 1;
                continue;
            }
        };

        if !assistant.has_tool_calls() {
            if !assistant.content.is_empty() {
                out.push(messages[i].clone());
            }
            i += 1;
            continue;
        }

        let call_ids: HashSet<&str> = assistant.tool_calls.iter().map(|c| c.id.as_str()).collect();
        let mut span_results: HashMap<&str, &ToolResultMessage> = HashMap::new();
        let mut j = i + 1;
        while let Some(Message::ToolResult(result)) = messages.get(j) {
            let id = result.tool_call_id.as_str();
            if call_ids.contains(id) && seen_results.insert(id) {
                span_results.insert(id, result);
            }
            j += 1;
        }

        out.push(messages[i].clone());
        for call in &assistant.tool_calls {
            let result = match span_results.get(call.id.as_str()) {
                Some(existing) => (*existing).clone(),
                None => ToolResultMessage::error(call, MISSING_RESULT),
            };
            out.push(Message::ToolResult(result));
        }
        i = j;
    }

    out
}
