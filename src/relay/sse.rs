//! Server-Sent-Events record parser for the upstream completion stream.
//!
//! Works on raw bytes and only decodes complete lines, so multi-byte
//! characters split across network chunks reassemble correctly. The internal
//! buffer holds at most the current partial line plus the fields of the
//! record in progress.

use std::fmt;

pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Event { data: String },
    ReconnectInterval(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseDecodeError {
    message: String,
}

impl fmt::Display for SseDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SseDecodeError {}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
    record_has_data: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one chunk of upstream bytes and returns every event whose
    /// record completed inside it. Trailing partial input stays buffered.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, SseDecodeError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(line) = self.take_line()? {
            if line.is_empty() {
                if let Some(event) = self.flush_record() {
                    events.push(event);
                }
                continue;
            }
            self.parse_field(&line, &mut events);
        }

        Ok(events)
    }

    /// Flushes state once upstream input is exhausted. A final record without
    /// a terminating blank line still yields its event.
    pub fn finish(&mut self) -> Result<Option<SseEvent>, SseDecodeError> {
        let mut trailing = Vec::new();
        if !self.buffer.is_empty() {
            let line = decode_line(std::mem::take(&mut self.buffer))?;
            let trimmed = line.strip_suffix('\r').unwrap_or(&line);
            if !trimmed.is_empty() {
                self.parse_field(trimmed, &mut trailing);
            }
        }

        Ok(self.flush_record().or_else(|| trailing.into_iter().next()))
    }

    fn take_line(&mut self) -> Result<Option<String>, SseDecodeError> {
        let Some(newline_index) = self.buffer.iter().position(|byte| *byte == b'\n') else {
            return Ok(None);
        };

        let mut line: Vec<u8> = self.buffer.drain(..=newline_index).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        decode_line(line).map(Some)
    }

    fn parse_field(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if let Some(value) = field_value(line, "data") {
            self.data_lines.push(value.to_string());
            self.record_has_data = true;
            return;
        }

        if let Some(value) = field_value(line, "retry") {
            if let Ok(millis) = value.parse::<u64>() {
                events.push(SseEvent::ReconnectInterval(millis));
            }
            return;
        }

        // comments (leading ':') and fields the relay does not use, such as
        // "event" and "id", fall through here
    }

    fn flush_record(&mut self) -> Option<SseEvent> {
        if !self.record_has_data {
            return None;
        }

        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        self.record_has_data = false;
        Some(SseEvent::Event { data })
    }
}

fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn decode_line(bytes: Vec<u8>) -> Result<String, SseDecodeError> {
    String::from_utf8(bytes).map_err(|error| SseDecodeError {
        message: format!("upstream sent a non-UTF-8 SSE line: {error}"),
    })
}
