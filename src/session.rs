//! Stream controller: owns one session's read loop and lifecycle.
//!
//! A session moves `Idle -> Connecting -> Streaming` and ends in exactly one
//! of `Completed`, `Errored` or `Cancelled`. On every terminal path the chunk
//! reader is released exactly once and exactly one terminal callback fires.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::client::{ClientError, TransportError};
use crate::credentials::CredentialProvider;
use crate::decoder::Utf8Decoder;
use crate::dispatch::{dispatch, Dispatch, StreamHandler};
use crate::model::SessionOutcome;
use crate::sse::{FrameAssembler, LineBuffer};
use crate::transport::{ChunkReader, StreamRequest, Transport};

const AUTHORIZATION: &str = "Authorization";

/// Owns a [`ChunkReader`] and cancels it exactly once, at the latest on drop.
pub struct ReaderGuard {
    reader: Box<dyn ChunkReader>,
    released: bool,
}

impl ReaderGuard {
    pub fn new(reader: Box<dyn ChunkReader>) -> Self {
        Self {
            reader,
            released: false,
        }
    }

    pub async fn read(&mut self) -> Option<Result<Bytes, TransportError>> {
        if self.released {
            return None;
        }
        self.reader.read().await
    }

    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.reader.cancel();
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Attach the bearer token to `request`.
///
/// Fails with [`ClientError::MissingCredentials`] when the request requires
/// authentication and no token is available.
pub fn authorize<C>(mut request: StreamRequest, credentials: &C) -> Result<StreamRequest, ClientError>
where
    C: CredentialProvider + ?Sized,
{
    match credentials.bearer_token() {
        Some(token) => {
            request.headers.insert(
                AUTHORIZATION.to_string(),
                format!("Bearer {}", token.expose_secret()),
            );
            Ok(request)
        }
        None if request.requires_auth => Err(ClientError::MissingCredentials),
        None => Ok(request),
    }
}

/// Handle to a session running on its own task.
///
/// Dropping the handle cancels the session. Use [`StreamHandle::detach`] to
/// let it run to the end on its own.
#[derive(Debug)]
pub struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<SessionOutcome>,
    cancel_on_drop: DropGuard,
}

impl StreamHandle {
    /// Request cancellation. The session observes it before its next read.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to reach its terminal state.
    ///
    /// Dropping the returned future before it resolves cancels the session.
    pub async fn join(self) -> Result<SessionOutcome, JoinError> {
        let StreamHandle {
            task, cancel_on_drop, ..
        } = self;
        let outcome = task.await;
        let _ = cancel_on_drop.disarm();
        outcome
    }

    /// Release the session from this handle; it keeps running until it ends.
    pub fn detach(self) -> JoinHandle<SessionOutcome> {
        let StreamHandle {
            task, cancel_on_drop, ..
        } = self;
        let _ = cancel_on_drop.disarm();
        task
    }
}

/// Start a session on a new task with a fresh cancellation token.
///
/// The bearer token is resolved before anything is spawned; a missing token
/// rejects the start and no callback fires.
pub fn start_stream<H>(
    transport: Arc<dyn Transport>,
    credentials: &dyn CredentialProvider,
    request: StreamRequest,
    handler: H,
) -> Result<StreamHandle, ClientError>
where
    H: StreamHandler + 'static,
{
    start_stream_with_cancel(transport, credentials, request, handler, CancellationToken::new())
}

/// Like [`start_stream`], cancelled through a caller-supplied token.
pub fn start_stream_with_cancel<H>(
    transport: Arc<dyn Transport>,
    credentials: &dyn CredentialProvider,
    request: StreamRequest,
    mut handler: H,
    cancel: CancellationToken,
) -> Result<StreamHandle, ClientError>
where
    H: StreamHandler + 'static,
{
    let request = authorize(request, credentials)?;
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        run_stream(transport.as_ref(), request, &mut handler, &token).await
    });

    Ok(StreamHandle {
        cancel_on_drop: cancel.clone().drop_guard(),
        cancel,
        task,
    })
}

/// Run one session to completion on the current task.
///
/// `request` must already carry its credentials (see [`authorize`]).
pub async fn run_stream<T, H>(
    transport: &T,
    request: StreamRequest,
    handler: &mut H,
    cancel: &CancellationToken,
) -> SessionOutcome
where
    T: Transport + ?Sized,
    H: StreamHandler + ?Sized,
{
    debug!("Connecting to {}", request.url);

    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = transport.post_streaming(&request) => Some(result),
    };

    let response = match connected {
        None => {
            info!("Stream cancelled before connecting");
            handler.on_cancelled();
            return SessionOutcome::Cancelled;
        }
        Some(Err(e)) => {
            let error = ClientError::from(e);
            warn!("Stream failed to connect: {}", error);
            handler.on_error(&error);
            return SessionOutcome::Errored(error);
        }
        Some(Ok(response)) => response,
    };

    debug!(
        "Streaming from {} (status {}, content-type {:?})",
        request.url, response.status, response.content_type
    );

    let mut reader = ReaderGuard::new(response.reader);
    let mut session = Session::new(handler);

    let step = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            chunk = reader.read() => Some(chunk),
        };

        let step = match next {
            None => Step::Cancelled,
            Some(Some(Ok(chunk))) => session.on_chunk(&chunk),
            Some(Some(Err(e))) => Step::Failed(ClientError::from(e)),
            Some(None) => session.on_close(),
        };

        if !matches!(step, Step::Continue) {
            break step;
        }
    };

    reader.release();
    session.finish(step)
}

enum Step {
    Continue,
    Completed,
    Cancelled,
    /// Failure not yet reported to the handler.
    Failed(ClientError),
    /// Server `error` event, already delivered through `on_error`.
    ServerError(ClientError),
}

/// Per-session pipeline state. Never shared between sessions.
struct Session<'a, H: ?Sized> {
    decoder: Utf8Decoder,
    lines: LineBuffer,
    assembler: FrameAssembler,
    tokens: usize,
    answer: String,
    handler: &'a mut H,
}

impl<'a, H> Session<'a, H>
where
    H: StreamHandler + ?Sized,
{
    fn new(handler: &'a mut H) -> Self {
        Self {
            decoder: Utf8Decoder::new(),
            lines: LineBuffer::new(),
            assembler: FrameAssembler::new(),
            tokens: 0,
            answer: String::new(),
            handler,
        }
    }

    fn on_chunk(&mut self, chunk: &[u8]) -> Step {
        match self.decoder.decode(chunk, false) {
            Ok(text) => self.process_text(&text),
            Err(e) => Step::Failed(e.into()),
        }
    }

    /// The body ended: flush the decoder and the unterminated last line.
    fn on_close(&mut self) -> Step {
        let text = match self.decoder.decode(&[], true) {
            Ok(text) => text,
            Err(e) => return Step::Failed(e.into()),
        };

        if let step @ (Step::ServerError(_) | Step::Failed(_)) = self.process_text(&text) {
            return step;
        }

        if let Some(last) = self.lines.finish() {
            if let step @ (Step::ServerError(_) | Step::Failed(_)) = self.process_line(&last) {
                return step;
            }
        }

        if !self.assembler.is_terminated() {
            debug!("Body closed without an end event");
        }
        Step::Completed
    }

    /// Run every complete line through the assembler and dispatcher.
    ///
    /// After `event: end` the remaining lines of the chunk are still
    /// processed; a server error stops processing at once.
    fn process_text(&mut self, text: &str) -> Step {
        for line in self.lines.feed(text) {
            if let step @ Step::ServerError(_) = self.process_line(&line) {
                return step;
            }
        }

        if self.assembler.is_terminated() {
            Step::Completed
        } else {
            Step::Continue
        }
    }

    fn process_line(&mut self, line: &str) -> Step {
        let Some(event) = self.assembler.push_line(line) else {
            return Step::Continue;
        };

        match dispatch(&event, &mut *self.handler) {
            Dispatch::Token(token) => {
                self.tokens += 1;
                self.answer.push_str(&token);
                Step::Continue
            }
            Dispatch::Terminated(error) => Step::ServerError(error),
            Dispatch::Source | Dispatch::Ignored => Step::Continue,
        }
    }

    /// Fire the single terminal callback and produce the outcome.
    fn finish(self, step: Step) -> SessionOutcome {
        match step {
            Step::Completed | Step::Continue => {
                info!("Stream completed ({} tokens)", self.tokens);
                self.handler.on_end();
                SessionOutcome::Completed {
                    tokens: self.tokens,
                    answer: self.answer,
                }
            }
            Step::Cancelled => {
                info!("Stream cancelled after {} tokens", self.tokens);
                self.handler.on_cancelled();
                SessionOutcome::Cancelled
            }
            Step::Failed(error) => {
                warn!("Stream failed: {}", error);
                self.handler.on_error(&error);
                SessionOutcome::Errored(error)
            }
            Step::ServerError(error) => {
                warn!("Server signaled error: {}", error);
                SessionOutcome::Errored(error)
            }
        }
    }
}
