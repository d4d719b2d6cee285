//! Streaming smart search against a running RAG service.
//!
//! Run with:
//! ```bash
//! export RAG_BASE_URL="http://localhost:8080/api/trans/rag/"
//! export RAG_API_KEY="your-api-key"
//! RUST_LOG=clubstream=debug cargo run --example smart_search -- "如何创建社团"
//! ```

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clubstream::credentials::StaticCredentials;
use clubstream::dispatch::Callbacks;
use clubstream::model::{SessionOutcome, SourceRecord};
use clubstream::options::{HttpTransport, TransportOptions};
use clubstream::providers::RagClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let base_url = std::env::var("RAG_BASE_URL").expect("RAG_BASE_URL environment variable must be set");
    let api_key = std::env::var("RAG_API_KEY").expect("RAG_API_KEY environment variable must be set");
    let credentials = match std::env::var("RAG_BEARER_TOKEN") {
        Ok(token) => StaticCredentials::new(token),
        Err(_) => StaticCredentials::none(),
    };
    let query = std::env::args().nth(1).unwrap_or_else(|| "如何创建社团".to_string());

    let transport_options =
        TransportOptions::new(HttpTransport::new(api_key).with_base_url(base_url)).with_timeout(Duration::from_secs(60));
    let client = RagClient::new(transport_options, Arc::new(credentials))?;

    if !client.health_check().await {
        eprintln!("Smart search endpoint is not responding");
        return Ok(());
    }

    let callbacks = Callbacks::new()
        .with_source(|sources| {
            for record in SourceRecord::from_value(&sources) {
                println!("[{} p.{}] {}", record.metadata.source, record.metadata.page, record.id);
            }
        })
        .with_token(|token| {
            print!("{}", token);
            let _ = std::io::stdout().flush();
        })
        .with_error(|e| eprintln!("\nError in stream: {}", e));

    let handle = client.smart_search(&query, callbacks)?;

    // Ctrl-C cancels the stream instead of killing the process mid-read.
    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match handle.join().await? {
        SessionOutcome::Completed { tokens, .. } => println!("\n\n=== Stream complete ({} tokens) ===", tokens),
        SessionOutcome::Cancelled => println!("\n\n=== Stream cancelled ==="),
        SessionOutcome::Errored(_) => {}
    }

    Ok(())
}
