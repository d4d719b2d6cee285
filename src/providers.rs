//! Endpoint clients built on the streaming core.

pub mod rag;

pub use rag::{RagClient, SmartSearchResponse};
