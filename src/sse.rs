//! Line framing for the `event:`/`data:` stream format.
//!
//! Stream format:
//! ```text
//! event: token
//! data: {"token": "Hel"}
//! data: {"token": "lo"}
//! event: end
//! data:
//! ```
//!
//! Every `data:` line is dispatched on its own under the most recent
//! `event:` line. No blank-line terminator is needed between events.

use tracing::debug;

use crate::model::{EventType, StreamEvent};

/// Holds decoded text until it forms complete, newline-terminated lines.
///
/// A buffer belongs to one session and is never reused for another.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and return every line it completed.
    ///
    /// The trailing unterminated fragment stays buffered for the next call.
    ///
    /// # Example
    /// ```
    /// use clubstream::sse::LineBuffer;
    ///
    /// let mut lines = LineBuffer::new();
    /// assert_eq!(lines.feed("event: to").count(), 0);
    /// assert_eq!(lines.feed("ken\ndata").collect::<Vec<_>>(), vec!["event: token"]);
    /// assert_eq!(lines.pending(), "data");
    /// ```
    pub fn feed(&mut self, text: &str) -> std::vec::IntoIter<String> {
        self.buffer.push_str(text);

        let Some(pos) = self.buffer.rfind('\n') else {
            return Vec::new().into_iter();
        };

        let rest = self.buffer.split_off(pos + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete[..pos]
            .split('\n')
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Text received after the last newline.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Take the unterminated remainder, if any, once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// Classification of a single trimmed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseLine<'a> {
    Empty,
    /// `event:` line with the trimmed type name.
    Event(&'a str),
    /// `data:` line with the trimmed payload (possibly empty).
    Data(&'a str),
    Other,
}

/// Classify an SSE line.
///
/// # Example
/// ```
/// use clubstream::sse::{parse_sse_line, SseLine};
///
/// assert_eq!(parse_sse_line("data: {\"token\": \"a\"}"), SseLine::Data("{\"token\": \"a\"}"));
/// assert_eq!(parse_sse_line("  event:token "), SseLine::Event("token"));
/// assert_eq!(parse_sse_line(": keep-alive"), SseLine::Other);
/// ```
pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let line = line.trim();

    if line.is_empty() {
        SseLine::Empty
    } else if let Some(name) = line.strip_prefix("event:") {
        SseLine::Event(name.trim())
    } else if let Some(data) = line.strip_prefix("data:") {
        SseLine::Data(data.trim())
    } else {
        SseLine::Other
    }
}

/// Turns complete lines into [`StreamEvent`]s.
///
/// Tracks the active event type across lines and chunks, and records when
/// the `end` signal has been seen.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    current: EventType,
    terminated: bool,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one complete line, returning an event for non-empty `data:` lines.
    pub fn push_line(&mut self, line: &str) -> Option<StreamEvent> {
        match parse_sse_line(line) {
            SseLine::Event(name) => {
                self.current = EventType::from(name);
                if self.current == EventType::Unknown {
                    debug!("Ignoring unknown event type: {}", name);
                }
                if self.current == EventType::End {
                    self.terminated = true;
                }
                None
            }
            SseLine::Data(payload) if !payload.is_empty() => {
                Some(StreamEvent::new(self.current, payload))
            }
            SseLine::Data(_) | SseLine::Empty | SseLine::Other => None,
        }
    }

    /// Event type applied to the next `data:` line.
    pub fn current_event_type(&self) -> EventType {
        self.current
    }

    /// Whether `event: end` has been seen.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}
