//! Data model for the event stream and the request bodies that open it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ClientError;

/// Event type announced by an `event:` line.
///
/// Anything that is not one of the four known tags maps to `Unknown`, which
/// the dispatcher drops without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventType {
    Source,
    Token,
    End,
    Error,
    #[default]
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Source => "source",
            EventType::Token => "token",
            EventType::End => "end",
            EventType::Error => "error",
            EventType::Unknown => "unknown",
        }
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        match name {
            "source" => EventType::Source,
            "token" => EventType::Token,
            "end" => EventType::End,
            "error" => EventType::Error,
            _ => EventType::Unknown,
        }
    }
}

/// One `data:` line paired with the event type active when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub event_type: EventType,
    pub raw_payload: String,
}

impl StreamEvent {
    pub fn new(event_type: EventType, raw_payload: impl Into<String>) -> Self {
        Self {
            event_type,
            raw_payload: raw_payload.into(),
        }
    }
}

/// A retrieved document chunk referenced by an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: String,
    pub content: String,
    pub metadata: SourceMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceMetadata {
    pub source: String,
    pub page: i64,
}

impl SourceRecord {
    /// Best-effort conversion of a `source` payload into typed records.
    ///
    /// Accepts an array of records or a single record object. Entries that do
    /// not match the record shape are skipped.
    pub fn from_value(value: &Value) -> Vec<SourceRecord> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            Value::Object(_) => serde_json::from_value(value.clone()).into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

/// Tagged-union view of the handler callbacks, used by channel consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Source(Value),
    Token(String),
    End,
    Error {
        server_signaled: bool,
        message: String,
    },
    Cancelled,
}

/// How a session ended. Exactly one is produced per session.
#[derive(Debug)]
pub enum SessionOutcome {
    /// `end` event or graceful close of the body.
    Completed {
        /// Number of token fragments dispatched.
        tokens: usize,
        /// Concatenation of all token fragments.
        answer: String,
    },
    Errored(ClientError),
    Cancelled,
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SessionOutcome::Cancelled)
    }
}

/// Role of a chat message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of a smart-search request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmartSearchRequest {
    pub query: String,
}

/// Body of a side-chat request: a query plus prior conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SideChatRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Body of a general chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}
