//! Provider stream decoding: frames → deltas → assistant message.

pub mod accumulator;
pub mod assembler;
pub mod frame;

pub use accumulator::{DeltaAccumulator, PartialThinking, PartialToolCall};
pub use frame::{decode_frames, Frame, FrameDecoder, RawFrame};

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::error::Result;
use crate::types::{AssistantMessage, ChunkSink};

/// Consume a raw provider byte stream and assemble the final message.
///
/// Chunks are pushed to `sink` as they arrive. Any `error` event or
/// transport failure aborts with no partial message.
pub async fn collect_message<S>(
    bytes: S,
    message_id: impl Into<String>,
    sink: Option<ChunkSink>,
) -> Result<AssistantMessage>
where
    S: Stream<Item = Result<Vec<u8>>>,
{
    let frames = decode_frames(bytes);
    futures::pin_mut!(frames);
    let mut accumulator = DeltaAccumulator::new(message_id, sink);
    let mut frame_count = 0usize;

    while let Some(frame) = frames.next().await {
        accumulator.apply(&frame?)?;
        frame_count += 1;
    }

    let message = accumulator.finish();
    debug!(
        message_id = %message.id,
        frames = frame_count,
        text_len = message.content.len(),
        tool_calls = message.tool_calls.len(),
        "assembled assistant message"
    );
    Ok(message)
}
