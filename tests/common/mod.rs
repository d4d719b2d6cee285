//! Shared helpers: an in-memory transport that replays a scripted body.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use clubstream::client::TransportError;
use clubstream::model::{SessionOutcome, StreamUpdate};
use clubstream::session::run_stream;
use clubstream::transport::{ChunkReader, StreamRequest, StreamingResponse, Transport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One delivery from the scripted body.
#[derive(Debug, Clone)]
pub enum Piece {
    Chunk(Vec<u8>),
    Fail(String),
}

pub struct ScriptedReader {
    pieces: VecDeque<Piece>,
    hang_when_drained: bool,
    cancels: Arc<AtomicUsize>,
}

#[async_trait]
impl ChunkReader for ScriptedReader {
    async fn read(&mut self) -> Option<Result<Bytes, TransportError>> {
        match self.pieces.pop_front() {
            Some(Piece::Chunk(bytes)) => Some(Ok(Bytes::from(bytes))),
            Some(Piece::Fail(message)) => Some(Err(TransportError::Io(message))),
            None if self.hang_when_drained => futures::future::pending().await,
            None => None,
        }
    }

    fn cancel(&mut self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport whose every response replays the same script.
pub struct ScriptedTransport {
    pieces: Vec<Piece>,
    content_type: Option<String>,
    connect_error: Option<u16>,
    hang_when_drained: bool,
    pub cancels: Arc<AtomicUsize>,
    pub requests: Arc<std::sync::Mutex<Vec<StreamRequest>>>,
}

impl ScriptedTransport {
    pub fn new(pieces: Vec<Piece>) -> Self {
        Self {
            pieces,
            content_type: Some("text/event-stream".to_string()),
            connect_error: None,
            hang_when_drained: false,
            cancels: Arc::new(AtomicUsize::new(0)),
            requests: Arc::default(),
        }
    }

    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self::new(chunks.into_iter().map(|c| Piece::Chunk(c.into())).collect())
    }

    pub fn failing_with_status(status: u16) -> Self {
        let mut transport = Self::new(Vec::new());
        transport.connect_error = Some(status);
        transport
    }

    pub fn hanging(mut self) -> Self {
        self.hang_when_drained = true;
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_streaming(&self, request: &StreamRequest) -> Result<StreamingResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(status) = self.connect_error {
            return Err(TransportError::Status {
                status,
                body: "scripted failure".to_string(),
            });
        }

        Ok(StreamingResponse {
            status: 200,
            content_type: self.content_type.clone(),
            reader: Box::new(ScriptedReader {
                pieces: self.pieces.iter().cloned().collect(),
                hang_when_drained: self.hang_when_drained,
                cancels: self.cancels.clone(),
            }),
        })
    }
}

pub fn request() -> StreamRequest {
    StreamRequest::new("http://localhost/smart-search", serde_json::json!({"query": "q"}))
        .with_auth_required(false)
}

/// Run one session over `transport` and collect every callback in order.
pub async fn run_collect(transport: &ScriptedTransport) -> (SessionOutcome, Vec<StreamUpdate>) {
    let (mut tx, mut rx) = mpsc::unbounded_channel();
    let outcome = run_stream(transport, request(), &mut tx, &CancellationToken::new()).await;
    drop(tx);

    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }
    (outcome, updates)
}

/// Feed `body` split at every offset in `cuts`.
pub fn split_at(body: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        pieces.push(body[start..cut].to_vec());
        start = cut;
    }
    pieces.push(body[start..].to_vec());
    pieces
}
