//! Error types shared by the streaming pipeline.

use thiserror::Error;

use crate::decoder::DecodeError;

/// Errors that can terminate a streaming session or reject its start.
///
/// Malformed `source`/`token` payloads are deliberately absent: the dispatcher
/// absorbs them with a fallback and only logs a diagnostic.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Server error: {0}")]
    ServerSignaled(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Stream cancelled")]
    StreamCancelled,

    #[error("No bearer token available")]
    MissingCredentials,

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the error came from the far end rather than from the connection.
    pub fn is_server_signaled(&self) -> bool {
        matches!(self, ClientError::ServerSignaled(_))
    }
}

/// Failures while establishing or reading the response body.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response has no readable body")]
    MissingBody,

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(TransportError::Http(err))
    }
}
