//! Incremental decoding of the upstream SSE byte stream.
//!
//! Kept free of any network types so the relay's line classification can be
//! tested against fabricated input.

use crate::api::StreamChunk;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Outcome of classifying one line of the upstream response.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// A non-empty text delta to forward to the caller.
    Fragment(String),
    /// The end-of-stream sentinel; terminate normally.
    Done,
    /// Nothing to forward (blank line, non-data line, empty delta,
    /// or an unparseable payload).
    Skip,
}

/// Classify a single line of the upstream stream.
///
/// Parse failures on individual payloads are logged and skipped; they never
/// abort the stream.
pub fn decode_line(line: &str) -> LineEvent {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return LineEvent::Skip;
    };

    if payload.trim() == DONE_SENTINEL {
        return LineEvent::Done;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => match chunk.delta_content() {
            Some(text) if !text.is_empty() => LineEvent::Fragment(text.to_string()),
            _ => LineEvent::Skip,
        },
        Err(e) => {
            tracing::debug!(error = %e, payload = %payload, "Skipping unparseable stream event");
            LineEvent::Skip
        }
    }
}

/// Accumulates raw bytes and hands back complete lines, holding any partial
/// trailing line until the next chunk arrives.
///
/// Buffers bytes rather than text: a multi-byte UTF-8 character may be
/// split across network chunks, so decoding happens only on complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Drain whatever is buffered after the source ends without a final
    /// newline.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            let tail = std::mem::take(&mut self.pending);
            Some(String::from_utf8_lossy(&tail).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fragment() {
        let event = decode_line(r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#);
        assert_eq!(event, LineEvent::Fragment("Hello".to_string()));
    }

    #[test]
    fn test_decode_done_sentinel() {
        assert_eq!(decode_line("data: [DONE]"), LineEvent::Done);
    }

    #[test]
    fn test_decode_done_sentinel_with_whitespace() {
        assert_eq!(decode_line("data: [DONE] "), LineEvent::Done);
    }

    #[test]
    fn test_decode_skips_empty_delta() {
        let event = decode_line(r#"data: {"choices":[{"delta":{"content":""}}]}"#);
        assert_eq!(event, LineEvent::Skip);
    }

    #[test]
    fn test_decode_skips_missing_content() {
        let event = decode_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#);
        assert_eq!(event, LineEvent::Skip);
    }

    #[test]
    fn test_decode_skips_malformed_payload() {
        assert_eq!(decode_line("data: {not json"), LineEvent::Skip);
    }

    #[test]
    fn test_decode_ignores_non_data_lines() {
        assert_eq!(decode_line(""), LineEvent::Skip);
        assert_eq!(decode_line(": keep-alive"), LineEvent::Skip);
        assert_eq!(decode_line("event: ping"), LineEvent::Skip);
    }

    #[test]
    fn test_line_buffer_complete_lines() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"one\ntwo\n");
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
        assert!(buf.take_remainder().is_none());
    }

    #[test]
    fn test_line_buffer_partial_line_across_chunks() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"data: {\"choices\":").is_empty());
        let lines = buf.push(b"[{\"delta\":{\"content\":\"Hi\"}}]}\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(
            decode_line(&lines[0]),
            LineEvent::Fragment("Hi".to_string())
        );
    }

    #[test]
    fn test_line_buffer_multibyte_char_split_across_chunks() {
        // "café" with the 'é' (0xC3 0xA9) straddling two chunks must not
        // be decoded into replacement characters.
        let mut buf = LineBuffer::new();
        assert!(buf
            .push(b"data: {\"choices\":[{\"delta\":{\"content\":\"caf\xc3")
            .is_empty());
        let lines = buf.push(b"\xa9\"}}]}\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(
            decode_line(&lines[0]),
            LineEvent::Fragment("café".to_string())
        );
    }

    #[test]
    fn test_line_buffer_strips_crlf() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"data: [DONE]\r\n");
        assert_eq!(lines, vec!["data: [DONE]".to_string()]);
    }

    #[test]
    fn test_line_buffer_remainder() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"no newline").is_empty());
        assert_eq!(buf.take_remainder(), Some("no newline".to_string()));
        assert!(buf.take_remainder().is_none());
    }
}
