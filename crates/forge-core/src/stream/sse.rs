//! SSE (Server-Sent Events) stream decoding
//!
//! Turns raw chunks of a chat completion stream into [`ChatEvent`]s. Chunk
//! boundaries never line up with frame boundaries, so partial lines are
//! carried over between calls. The wire format is not assumed to be strict:
//! anything that is not a `data:` line with a JSON payload is dropped.

use std::time::Instant;

use tracing::{debug, info, trace};

use super::events::ChatEvent;
use crate::error::PipelineError;

/// Conventional end-of-stream sentinel some backends send instead of `{"done":true}`
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder for `data: <json>` frames
pub struct SseDecoder {
    /// Bytes of the trailing line that has not been terminated yet
    partial_line: Vec<u8>,
    /// Set once a done frame has been decoded
    finished: bool,
    /// When the stream started
    stream_start: Instant,
    /// Decoded event counter for logging
    event_count: usize,
    /// Discarded line counter for logging
    discarded: usize,
    /// Bytes received counter
    bytes_received: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            partial_line: Vec::new(),
            finished: false,
            stream_start: Instant::now(),
            event_count: 0,
            discarded: 0,
            bytes_received: 0,
        }
    }

    /// Feed a chunk of bytes and return every complete event it finished
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ChatEvent> {
        self.bytes_received += chunk.len();
        trace!(
            "SSE chunk received: {} bytes (total: {} bytes)",
            chunk.len(),
            self.bytes_received
        );

        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.partial_line.extend_from_slice(chunk);
        let Some(last_newline) = self.partial_line.iter().rposition(|b| *b == b'\n') else {
            return events;
        };

        // Everything up to the last newline is complete; the rest stays buffered
        let remainder = self.partial_line.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial_line, remainder);

        for raw in complete.split(|b| *b == b'\n') {
            if self.finished {
                break;
            }
            if let Some(event) = self.decode_line(raw) {
                events.push(event);
            }
        }

        events
    }

    /// Decode whatever unterminated line is left once the transport closes
    pub fn finish(&mut self) -> Option<ChatEvent> {
        let rest = std::mem::take(&mut self.partial_line);
        let event = if self.finished || rest.is_empty() {
            None
        } else {
            self.decode_line(&rest)
        };
        info!(
            "SSE decoder finishing: {:?} elapsed, {} events, {} discarded, {} bytes total",
            self.stream_start.elapsed(),
            self.event_count,
            self.discarded,
            self.bytes_received
        );
        event
    }

    /// Whether a done frame has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<ChatEvent> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

        // Skip empty lines (frame separators) and SSE comments
        if raw.is_empty() || raw.starts_with(b":") {
            return None;
        }

        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                self.discard(&PipelineError::Decode(e.to_string()));
                return None;
            }
        };

        let Some(data) = line.strip_prefix("data:") else {
            // event:, id:, retry: and stray text are not part of this protocol
            self.discarded += 1;
            trace!("Ignoring non-data SSE line: {}", line);
            return None;
        };
        let data = data.strip_prefix(' ').unwrap_or(data).trim_end();

        if data == DONE_SENTINEL {
            self.finished = true;
            self.event_count += 1;
            info!(
                "SSE done marker received after {:?}, {} events, {} bytes",
                self.stream_start.elapsed(),
                self.event_count,
                self.bytes_received
            );
            return Some(ChatEvent::done());
        }

        match serde_json::from_str::<ChatEvent>(data) {
            Ok(event) if event.is_empty() => {
                self.discarded += 1;
                trace!("Skipping SSE frame without content");
                None
            }
            Ok(event) => {
                self.event_count += 1;
                if event.done {
                    self.finished = true;
                    info!(
                        "SSE done frame received after {:?}, {} events, {} bytes",
                        self.stream_start.elapsed(),
                        self.event_count,
                        self.bytes_received
                    );
                } else {
                    debug!(
                        "SSE event #{}: {} chars",
                        self.event_count,
                        event.content.as_deref().map_or(0, str::len)
                    );
                }
                Some(event)
            }
            Err(e) => {
                self.discard(&PipelineError::from(e));
                None
            }
        }
    }

    fn discard(&mut self, err: &PipelineError) {
        self.discarded += 1;
        debug!("Discarding SSE line #{}: {}", self.discarded, err);
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"content\":\"hi\"}\n\n");
        assert_eq!(events, vec![ChatEvent::content("hi")]);
    }

    #[test]
    fn test_malformed_line_between_frames_is_dropped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"content\":\"hi\"}\n\ndata: {not json\n\n");
        assert_eq!(events, vec![ChatEvent::content("hi")]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"cont").is_empty());
        assert!(decoder.feed(b"ent\":\"Hel").is_empty());
        let events = decoder.feed(b"lo\"}\n\ndata: {\"content\":\"!\"}\n");
        assert_eq!(
            events,
            vec![ChatEvent::content("Hello"), ChatEvent::content("!")]
        );
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let frame = "data: {\"content\":\"caf\u{e9}\"}\n\n".as_bytes();
        let split = frame.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&frame[..split]).is_empty());
        assert_eq!(decoder.feed(&frame[split..]), vec![ChatEvent::content("caf\u{e9}")]);
    }

    #[test]
    fn test_lines_without_prefix_and_comments_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b": keep-alive\nevent: message\nid: 7\n{\"content\":\"raw\"}\ndata:{\"content\":\"ok\"}\r\n\r\n",
        );
        assert_eq!(events, vec![ChatEvent::content("ok")]);
    }

    #[test]
    fn test_done_frame_ends_stream() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b"data: {\"content\":\"a\"}\n\ndata: {\"done\":true}\n\ndata: {\"content\":\"late\"}\n\n",
        );
        assert_eq!(events, vec![ChatEvent::content("a"), ChatEvent::done()]);
        assert!(decoder.is_finished());
        assert!(decoder.feed(b"data: {\"content\":\"later\"}\n\n").is_empty());
    }

    #[test]
    fn test_done_sentinel() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.feed(b"data: [DONE]\n\n"), vec![ChatEvent::done()]);
    }

    #[test]
    fn test_content_with_done_is_kept() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"content\":\"end\",\"done\":true}\n\n");
        assert_eq!(
            events,
            vec![ChatEvent {
                content: Some("end".into()),
                done: true
            }]
        );
    }

    #[test]
    fn test_finish_decodes_unterminated_tail() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"content\":\"tail\"}").is_empty());
        assert_eq!(decoder.finish(), Some(ChatEvent::content("tail")));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_empty_payloads_are_skipped() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {}\n\ndata: \n\ndata: {\"content\":\"\"}\n\n").is_empty());
    }
}
