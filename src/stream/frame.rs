//! Event frame decoder for `text/event-stream` provider responses.
//!
//! Frames are delimited by a blank line. Within a frame, `event:` names the
//! event and `data:` lines are joined with `\n`. Input may be split at any
//! byte position, including inside a UTF-8 sequence or a `\r\n` pair.

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::trace;

use crate::error::Result;

const DEFAULT_EVENT: &str = "message";
const DONE_SENTINEL: &str = "[DONE]";

/// A complete frame as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub event: String,
    pub data: String,
}

impl RawFrame {
    /// Parse the payload, dropping the `[DONE]` sentinel and non-JSON data.
    pub fn into_frame(self) -> Option<Frame> {
        if self.data.trim() == DONE_SENTINEL {
            return None;
        }
        match serde_json::from_str(&self.data) {
            Ok(payload) => Some(Frame {
                event: self.event,
                payload,
            }),
            Err(err) => {
                trace!(event = %self.event, error = %err, "dropping frame with non-JSON payload");
                None
            }
        }
    }
}

/// A frame whose payload parsed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: String,
    pub payload: Value,
}

/// Stateful scanner turning arbitrary byte fragments into frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    utf8_tail: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    has_fields: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every frame completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<RawFrame> {
        let text = self.decode_utf8(bytes);
        self.feed_str(&text)
    }

    /// Feed already-decoded text.
    pub fn feed_str(&mut self, text: &str) -> Vec<RawFrame> {
        // The buffered tail holds no newline, so only the new text is scanned.
        let mut scan = self.buffer.len();
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.push_str(text);
        let mut frames = Vec::new();
        let mut start = 0usize;

        while let Some(rel) = buffer[scan..].find('\n') {
            let end = scan + rel;
            let line = &buffer[start..end];
            let line = line.strip_suffix('\r').unwrap_or(line);
            start = end + 1;
            scan = start;

            if line.is_empty() {
                frames.extend(self.take_frame());
            } else {
                self.process_line(line);
            }
        }

        buffer.drain(..start);
        self.buffer = buffer;
        frames
    }

    /// Whether a partial frame is buffered.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.utf8_tail.is_empty() || self.has_fields
    }

    fn decode_utf8(&mut self, bytes: &[u8]) -> String {
        let mut pending = std::mem::take(&mut self.utf8_tail);
        pending.extend_from_slice(bytes);
        match std::str::from_utf8(&pending) {
            Ok(text) => text.to_owned(),
            // Incomplete sequence at the end: hold it back for the next chunk.
            Err(err) if err.error_len().is_none() => {
                self.utf8_tail = pending.split_off(err.valid_up_to());
                String::from_utf8_lossy(&pending).into_owned()
            }
            Err(_) => String::from_utf8_lossy(&pending).into_owned(),
        }
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => {
                self.event = Some(value.to_string());
                self.has_fields = true;
            }
            "data" => {
                self.data.push(value.to_string());
                self.has_fields = true;
            }
            _ => {}
        }
    }

    fn take_frame(&mut self) -> Option<RawFrame> {
        if !std::mem::take(&mut self.has_fields) {
            return None;
        }
        let event = self
            .event
            .take()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT.to_string());
        let data = std::mem::take(&mut self.data).join("\n");
        Some(RawFrame { event, data })
    }
}

/// Decode a byte stream into JSON frames, in arrival order.
///
/// A trailing partial frame at end of stream is discarded. A transport
/// error is yielded once and ends the stream.
pub fn decode_frames<S>(bytes: S) -> impl Stream<Item = Result<Frame>>
where
    S: Stream<Item = Result<Vec<u8>>>,
{
    async_stream::stream! {
        let mut decoder = FrameDecoder::new();
        futures::pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for raw in decoder.feed(&chunk) {
                        if let Some(frame) = raw.into_frame() {
                            yield Ok(frame);
                        }
                    }
                }
                Err(err) => {
                    yield Err(err);
                    break;
                }
            }
        }
        if decoder.has_pending() {
            trace!("discarding unterminated trailing frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TurnstileError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const WIRE: &str = concat!(
        ": keep-alive\r\n",
        "\r\n",
        "event: message_start\r\n",
        "data: {\"type\":\"message_start\"}\r\n",
        "\r\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\n",
        "data: \"delta\":{\"type\":\"text_delta\",\"text\":\"h\u{e9}llo \u{1F30D}\"}}\n",
        "\n",
        "data: not json\n",
        "\n",
        "data:{\"type\":\"ping\"}\n",
        "\n",
        "data: [DONE]\n",
        "\n",
        "event: trailing\n",
        "data: {\"type\":\"never_terminated\"}\n",
    );

    fn decode_all(chunks: &[&[u8]]) -> Vec<Frame> {
        let mut decoder = FrameDecoder::new();
        chunks
            .iter()
            .flat_map(|chunk| decoder.feed(chunk))
            .filter_map(RawFrame::into_frame)
            .collect()
    }

    #[test]
    fn decodes_events_and_joins_data_lines() {
        let frames = decode_all(&[WIRE.as_bytes()]);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].event, "message_start");
        assert_eq!(frames[1].event, "content_block_delta");
        assert_eq!(frames[1].payload["delta"]["text"], json!("h\u{e9}llo \u{1F30D}"));
        assert_eq!(frames[2].event, "message");
        assert_eq!(frames[2].payload, json!({"type": "ping"}));
    }

    #[test]
    fn output_is_independent_of_split_position() {
        let bytes = WIRE.as_bytes();
        let expected = decode_all(&[bytes]);
        for split in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(split);
            assert_eq!(decode_all(&[head, tail]), expected, "split at byte {split}");
        }
        let single_bytes: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_all(&single_bytes), expected);
    }

    #[test]
    fn trailing_partial_frame_is_never_emitted() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"data: {\"a\":1}\n");
        assert!(frames.is_empty());
        assert!(decoder.has_pending());
        let frames = decoder.feed(b"\n");
        assert_eq!(
            frames,
            vec![RawFrame {
                event: "message".into(),
                data: "{\"a\":1}".into()
            }]
        );
        assert!(!decoder.has_pending());
    }

    #[test]
    fn long_line_in_small_chunks_decodes_once() {
        let text = "x".repeat(64 * 1024);
        let wire = format!("data: {{\"text\":\"{text}\"}}\r\n\r\ndata: {{\"n\":2}}\n\n");
        let mut decoder = FrameDecoder::new();
        let frames: Vec<RawFrame> = wire
            .as_bytes()
            .chunks(3)
            .flat_map(|chunk| decoder.feed(chunk))
            .collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data.len(), text.len() + 11);
        assert_eq!(frames[1].data, "{\"n\":2}");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn blank_lines_without_fields_produce_nothing() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"\n\n\r\n").is_empty());
    }

    #[tokio::test]
    async fn stream_adapter_stops_at_transport_error() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"data: {\"n\":1}\n\n".to_vec()),
            Err(TurnstileError::Stream("connection reset".into())),
            Ok(b"data: {\"n\":2}\n\n".to_vec()),
        ];
        let frames: Vec<Result<Frame>> = decode_frames(futures::stream::iter(chunks))
            .collect()
            .await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref().unwrap().payload, json!({"n": 1}));
        assert!(matches!(frames[1], Err(TurnstileError::Stream(_))));
    }
}
