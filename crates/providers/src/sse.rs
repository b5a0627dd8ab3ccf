/// Incremental SSE (Server-Sent Events) parser for streaming provider
/// responses.
///
/// Events are separated by a blank line; each carries optional `event:` and
/// one or more `data:` lines. Both `\n\n` and `\r\n\r\n` boundaries occur in
/// the wild, so line endings are normalized on ingest.

/// A single parsed SSE event.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// The `[DONE]` sentinel OpenAI-style streams terminate with.
    pub fn is_done_sentinel(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Buffers incomplete frames across chunk boundaries.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the HTTP response; returns any complete events.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let text = String::from_utf8_lossy(chunk).replace("\r\n", "\n");
        self.buffer.push_str(&text);

        let mut events = Vec::new();
        while let Some(boundary) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..boundary + 2).collect();

            let mut event_type: Option<String> = None;
            let mut data_lines: Vec<&str> = Vec::new();
            for line in frame.lines() {
                if line.starts_with(':') {
                    // Comment / keep-alive line.
                    continue;
                }
                if let Some(value) = line.strip_prefix("event:") {
                    event_type = Some(value.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data_lines.push(value.strip_prefix(' ').unwrap_or(value));
                }
                // id: and retry: fields are irrelevant here.
            }

            if !data_lines.is_empty() {
                events.push(SseEvent {
                    event: event_type,
                    data: data_lines.join("\n"),
                });
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_multiple_events() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: alpha\n\ndata: beta\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "alpha");
        assert_eq!(events[1].data, "beta");
    }

    #[test]
    fn test_event_field_and_crlf() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: delta\r\ndata: {\"x\":1}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("delta"));
        assert_eq!(events[0].data, "{\"x\":1}");
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: par").is_empty());
        let events = parser.feed(b"tial\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn test_comments_and_done_sentinel() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keep-alive\n\ndata: [DONE]\n\n");
        assert_eq!(events.len(), 1);
        assert!(events[0].is_done_sentinel());
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: line1\ndata: line2\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "line1\nline2");
    }
}
