//! Incremental notifications emitted while a provider stream is consumed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A fragment of output, tagged with the id of the message it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    ContentChunk { message_id: String, content: String },
    ReasoningChunk { message_id: String, content: String },
}

impl StreamChunk {
    pub fn message_id(&self) -> &str {
        match self {
            Self::ContentChunk { message_id, .. } | Self::ReasoningChunk { message_id, .. } => {
                message_id
            }
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::ContentChunk { content, .. } | Self::ReasoningChunk { content, .. } => content,
        }
    }
}

/// Callback receiving chunks as they are produced.
pub type ChunkSink = Arc<dyn Fn(StreamChunk) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chunk_wire_shape() {
        let chunk = StreamChunk::ReasoningChunk {
            message_id: "msg_1".into(),
            content: "hmm".into(),
        };
        assert_eq!(
            serde_json::to_value(&chunk).unwrap(),
            json!({"type": "reasoning_chunk", "message_id": "msg_1", "content": "hmm"})
        );
    }
}
