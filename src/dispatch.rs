//! Payload decoding and routing of [`StreamEvent`]s to a [`StreamHandler`].
//!
//! Payload handling is fail-soft: a malformed `source` payload is dropped
//! with a warning, and a `token` payload always yields some string.

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::client::ClientError;
use crate::model::{EventType, StreamEvent, StreamUpdate};

/// Receives the decoded output of a streaming session.
///
/// Exactly one of `on_end`, `on_error` or `on_cancelled` is called per
/// session, and nothing is called after it.
pub trait StreamHandler: Send {
    /// Structured `source` payload, passed through without validation.
    fn on_source(&mut self, _sources: Value) {}

    /// One answer fragment.
    fn on_token(&mut self, _token: &str) {}

    fn on_end(&mut self) {}

    fn on_error(&mut self, _error: &ClientError) {}

    fn on_cancelled(&mut self) {}
}

impl StreamHandler for UnboundedSender<StreamUpdate> {
    fn on_source(&mut self, sources: Value) {
        let _ = self.send(StreamUpdate::Source(sources));
    }

    fn on_token(&mut self, token: &str) {
        let _ = self.send(StreamUpdate::Token(token.to_string()));
    }

    fn on_end(&mut self) {
        let _ = self.send(StreamUpdate::End);
    }

    fn on_error(&mut self, error: &ClientError) {
        let _ = self.send(StreamUpdate::Error {
            server_signaled: error.is_server_signaled(),
            message: error.to_string(),
        });
    }

    fn on_cancelled(&mut self) {
        let _ = self.send(StreamUpdate::Cancelled);
    }
}

/// Closure-based handler for callers that only care about some callbacks.
///
/// # Example
/// ```
/// use clubstream::dispatch::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .with_token(|token| print!("{}", token))
///     .with_end(|| println!());
/// ```
#[derive(Default)]
pub struct Callbacks {
    source: Option<Box<dyn FnMut(Value) + Send>>,
    token: Option<Box<dyn FnMut(&str) + Send>>,
    end: Option<Box<dyn FnMut() + Send>>,
    error: Option<Box<dyn FnMut(&ClientError) + Send>>,
    cancelled: Option<Box<dyn FnMut() + Send>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, f: impl FnMut(Value) + Send + 'static) -> Self {
        self.source = Some(Box::new(f));
        self
    }

    pub fn with_token(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.token = Some(Box::new(f));
        self
    }

    pub fn with_end(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.end = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl FnMut(&ClientError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn with_cancelled(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.cancelled = Some(Box::new(f));
        self
    }
}

impl StreamHandler for Callbacks {
    fn on_source(&mut self, sources: Value) {
        if let Some(f) = self.source.as_mut() {
            f(sources);
        }
    }

    fn on_token(&mut self, token: &str) {
        if let Some(f) = self.token.as_mut() {
            f(token);
        }
    }

    fn on_end(&mut self) {
        if let Some(f) = self.end.as_mut() {
            f();
        }
    }

    fn on_error(&mut self, error: &ClientError) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }

    fn on_cancelled(&mut self) {
        if let Some(f) = self.cancelled.as_mut() {
            f();
        }
    }
}

/// Result of dispatching one event.
#[derive(Debug)]
pub enum Dispatch {
    /// Nothing was delivered (unknown type, `end` payload, or dropped source).
    Ignored,
    Source,
    /// A token was delivered; carries the fragment for accumulation.
    Token(String),
    /// A server `error` event was delivered through `on_error`.
    Terminated(ClientError),
}

/// Decode `event`'s payload and invoke the matching handler callback.
pub fn dispatch<H>(event: &StreamEvent, handler: &mut H) -> Dispatch
where
    H: StreamHandler + ?Sized,
{
    match event.event_type {
        EventType::Source => match serde_json::from_str::<Value>(&event.raw_payload) {
            Ok(sources) => {
                handler.on_source(sources);
                Dispatch::Source
            }
            Err(e) => {
                warn!("Dropping malformed source payload: {}", e);
                Dispatch::Ignored
            }
        },
        EventType::Token => {
            let token = extract_token(&event.raw_payload);
            handler.on_token(&token);
            Dispatch::Token(token)
        }
        EventType::Error => {
            let error = ClientError::ServerSignaled(extract_error_detail(&event.raw_payload));
            handler.on_error(&error);
            Dispatch::Terminated(error)
        }
        EventType::End | EventType::Unknown => {
            debug!("Dropping data line for {} event", event.event_type.as_str());
            Dispatch::Ignored
        }
    }
}

/// Normalize a `token` payload to a string.
///
/// Tries the `token` field, then `content`, then the parsed value itself, and
/// finally the raw text when the payload is not JSON.
///
/// # Example
/// ```
/// use clubstream::dispatch::extract_token;
///
/// assert_eq!(extract_token(r#"{"token":"Hi"}"#), "Hi");
/// assert_eq!(extract_token(r#"{"content":"Hi"}"#), "Hi");
/// assert_eq!(extract_token("42"), "42");
/// assert_eq!(extract_token("plain text"), "plain text");
/// ```
pub fn extract_token(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            let picked = value
                .get("token")
                .filter(|v| !v.is_null())
                .or_else(|| value.get("content").filter(|v| !v.is_null()))
                .unwrap_or(&value);
            value_to_string(picked)
        }
        Err(e) => {
            debug!("Token payload is not JSON, using raw text: {}", e);
            raw.to_string()
        }
    }
}

/// Pull the `error` field out of an `error` payload, or fall back to the raw text.
pub fn extract_error_detail(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|value| value.get("error").map(value_to_string))
        .unwrap_or_else(|| raw.to_string())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
