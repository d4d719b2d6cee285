//! Contracts between the stream controller and the HTTP layer.
//!
//! The controller only needs a way to issue a streaming POST and a reader
//! that yields body chunks. [`crate::http::ReqwestTransport`] is the
//! production implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::client::TransportError;

/// A streaming POST to be issued by a [`Transport`].
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Value,
    /// Refuse to start without a bearer token
    pub requires_auth: bool,
}

impl StreamRequest {
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            body,
            requires_auth: true,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_auth_required(mut self, required: bool) -> Self {
        self.requires_auth = required;
        self
    }
}

/// Reads the body of a streaming response one chunk at a time.
#[async_trait]
pub trait ChunkReader: Send {
    /// Next chunk, or `None` once the body has ended.
    async fn read(&mut self) -> Option<Result<Bytes, TransportError>>;

    /// Release the underlying connection. Calling it again is a no-op.
    fn cancel(&mut self);
}

/// A successful (2xx) response whose body has not been read yet.
pub struct StreamingResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub reader: Box<dyn ChunkReader>,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl StreamingResponse {
    /// Whether the response declares `expected` as its media type, ignoring
    /// parameters such as `charset`.
    pub fn has_content_type(&self, expected: &str) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|media| media.trim().eq_ignore_ascii_case(expected))
    }
}

/// Issues streaming requests.
///
/// Non-2xx responses must come back as [`TransportError::Status`], never as a
/// readable body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_streaming(&self, request: &StreamRequest) -> Result<StreamingResponse, TransportError>;
}
