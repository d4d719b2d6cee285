//! Liveness probe for streaming endpoints.
//!
//! Opens a minimal streaming request and waits only for the first chunk,
//! then cancels the body. Every failure is reported as `false`.

use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use crate::client::TransportError;
use crate::credentials::CredentialProvider;
use crate::decoder::Utf8Decoder;
use crate::options::StreamOptions;
use crate::session::{authorize, ReaderGuard};
use crate::transport::{StreamRequest, Transport};

#[derive(Error, Debug)]
enum ProbeFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected content type {0:?}")]
    ContentType(Option<String>),

    #[error("no bytes before end of body")]
    Empty,
}

/// Check that `request` reaches a live, correctly typed event stream.
///
/// Healthy means: a 2xx response with the expected content type and at least
/// one non-empty chunk before `options.probe_timeout` elapses. Empty chunks
/// are skipped. The reader is cancelled as soon as the first non-empty chunk
/// arrives, and on every failure path.
pub async fn probe<T, C>(
    transport: &T,
    credentials: &C,
    request: StreamRequest,
    options: &StreamOptions,
) -> bool
where
    T: Transport + ?Sized,
    C: CredentialProvider + ?Sized,
{
    let request = match authorize(request, credentials) {
        Ok(request) => request,
        Err(e) => {
            debug!("Probe not started: {}", e);
            return false;
        }
    };

    match timeout(options.probe_timeout, first_chunk(transport, &request, options)).await {
        Ok(Ok(())) => true,
        Ok(Err(reason)) => {
            debug!("Probe of {} failed: {}", request.url, reason);
            false
        }
        Err(_) => {
            debug!(
                "Probe of {} timed out after {:?}",
                request.url, options.probe_timeout
            );
            false
        }
    }
}

async fn first_chunk<T>(
    transport: &T,
    request: &StreamRequest,
    options: &StreamOptions,
) -> Result<(), ProbeFailure>
where
    T: Transport + ?Sized,
{
    let response = transport.post_streaming(request).await?;

    let typed = response.has_content_type(&options.expected_content_type);
    let mut reader = ReaderGuard::new(response.reader);

    if !typed {
        return Err(ProbeFailure::ContentType(response.content_type));
    }

    // Zero-length chunks carry no evidence either way; wait for real bytes.
    let chunk = loop {
        match reader.read().await {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => break chunk,
            None => return Err(ProbeFailure::Empty),
            Some(Err(e)) => return Err(e.into()),
        }
    };

    reader.release();

    let preview = Utf8Decoder::new().decode(&chunk, false).unwrap_or_default();
    debug!("Probe received {} byte(s): {:?}", chunk.len(), preview.trim());

    Ok(())
}
