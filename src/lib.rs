//! # clubstream - streaming client for club-assistant AI answers
//!
//! Consumes the `event:`/`data:` text stream returned by the smart-search,
//! side-chat and chat endpoints, and delivers typed callbacks while the
//! answer is still being generated.
//!
//! ## Pipeline
//!
//! Each session runs its own copy of:
//!
//! 1. **`Utf8Decoder`**: body chunks to text, keeping split characters
//! 2. **`LineBuffer`**: text to complete lines
//! 3. **`FrameAssembler`**: lines to `StreamEvent`s under the active event type
//! 4. **`dispatch`**: payload decoding and routing to a `StreamHandler`
//!
//! The session controller (`session`) owns the read loop, cancellation and
//! release of the response body. `probe` reuses the same pieces to check that
//! an endpoint is live.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use clubstream::credentials::StaticCredentials;
//! use clubstream::dispatch::Callbacks;
//! use clubstream::options::{HttpTransport, TransportOptions};
//! use clubstream::providers::RagClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport_options = TransportOptions::new(
//!         HttpTransport::new("your-api-key")
//!             .with_base_url("http://localhost:8080/api/trans/rag/".to_string()),
//!     );
//!     let client = RagClient::new(transport_options, Arc::new(StaticCredentials::new("jwt")))?;
//!
//!     let callbacks = Callbacks::new()
//!         .with_token(|token| print!("{}", token))
//!         .with_end(|| println!());
//!
//!     let handle = client.smart_search("How do I create a club?", callbacks)?;
//!     let outcome = handle.join().await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod credentials;
pub mod decoder;
pub mod dispatch;
pub mod http;
pub mod model;
pub mod options;
pub mod probe;
pub mod providers;
pub mod session;
pub mod sse;
pub mod transport;

// Re-exports for convenience
pub use client::{ClientError, TransportError};
pub use dispatch::{Callbacks, StreamHandler};
pub use model::{EventType, SessionOutcome, StreamEvent, StreamUpdate};
pub use probe::probe;
pub use session::{run_stream, start_stream, StreamHandle};
pub use transport::{ChunkReader, StreamRequest, StreamingResponse, Transport};
