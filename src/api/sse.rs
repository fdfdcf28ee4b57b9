//! Incremental `text/event-stream` parser.

use super::types::StreamEvent;

#[derive(Debug, Default)]
pub struct SseParser {
    line_buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of bytes; returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.line_buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline_index) = self.line_buffer.iter().position(|byte| *byte == b'\n') {
            let mut line = self.line_buffer.drain(..=newline_index).collect::<Vec<_>>();
            line.pop();
            if matches!(line.last(), Some(b'\r')) {
                line.pop();
            }
            if let Some(event) = self.feed_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing event not terminated by a blank line.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if !self.line_buffer.is_empty() {
            let line = String::from_utf8_lossy(&std::mem::take(&mut self.line_buffer)).to_string();
            if let Some(event) = self.feed_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn feed_line(&mut self, line: &str) -> Option<StreamEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(StreamEvent::from_frame(event.as_deref(), &data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_named_events_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: progress\ndata: {\"progress\"").is_empty());
        let events = parser.push(b": 40}\n\nevent: complete\ndata: {}\n\n");
        assert_eq!(
            events,
            vec![
                StreamEvent::Progress(json!({"progress": 40})),
                StreamEvent::Complete(json!({})),
            ]
        );
    }

    #[test]
    fn type_field_names_unnamed_events() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: {\"type\":\"error\",\"message\":\"boom\"}\r\n\r\n");
        assert_eq!(events, vec![StreamEvent::Error("boom".into())]);
    }

    #[test]
    fn comments_and_keepalives_are_ignored() {
        let mut parser = SseParser::new();
        assert!(parser.push(b": keep-alive\n\n").is_empty());
        assert!(parser.finish().is_none());
    }
}
