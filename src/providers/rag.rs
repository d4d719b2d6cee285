//! Client for the retrieval-augmented search and chat endpoints.
//!
//! Smart search and side chat authenticate with the service API key and
//! attach a bearer token when one is available. Chat requires the token.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::ClientError;
use crate::credentials::CredentialProvider;
use crate::dispatch::StreamHandler;
use crate::http::ReqwestTransport;
use crate::model::{ChatMessage, ChatRequest, SessionOutcome, SideChatRequest, SmartSearchRequest, SourceRecord};
use crate::options::{ChatDefaults, HttpTransport, RagEndpoints, StreamOptions, TransportOptions};
use crate::probe::probe;
use crate::session::{authorize, run_stream, start_stream, StreamHandle};
use crate::transport::{StreamRequest, Transport};

/// Collected result of a smart-search stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmartSearchResponse {
    pub answer: String,
    pub sources: Vec<SourceRecord>,
}

/// Streaming client for the smart-search, side-chat and chat endpoints.
pub struct RagClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    endpoints: RagEndpoints,
    chat_defaults: ChatDefaults,
    stream_options: StreamOptions,
}

impl RagClient {
    /// Create a client over HTTP. `base_url` must be set in the transport options.
    pub fn new(
        transport_options: TransportOptions<HttpTransport>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ClientError> {
        let base_url = transport_options
            .provider
            .base_url
            .clone()
            .ok_or_else(|| ClientError::Config("Base URL is required".to_string()))?;

        let transport = ReqwestTransport::new(transport_options)?;
        Ok(Self::with_transport(Arc::new(transport), credentials, base_url))
    }

    /// Create a client over any [`Transport`].
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            credentials,
            base_url: base_url.into(),
            endpoints: RagEndpoints::default(),
            chat_defaults: ChatDefaults::default(),
            stream_options: StreamOptions::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: RagEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_chat_defaults(mut self, chat_defaults: ChatDefaults) -> Self {
        self.chat_defaults = chat_defaults;
        self
    }

    pub fn with_stream_options(mut self, stream_options: StreamOptions) -> Self {
        self.stream_options = stream_options;
        self
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn smart_search_request(&self, query: &str) -> Result<StreamRequest, ClientError> {
        let body = serde_json::to_value(SmartSearchRequest {
            query: query.to_string(),
        })?;
        Ok(StreamRequest::new(self.url(&self.endpoints.smart_search), body).with_auth_required(false))
    }

    fn side_chat_request(&self, query: &str, history: &[ChatMessage]) -> Result<StreamRequest, ClientError> {
        let skip = history.len().saturating_sub(self.endpoints.max_history);
        let body = serde_json::to_value(SideChatRequest {
            query: query.to_string(),
            history: history[skip..].to_vec(),
        })?;
        Ok(StreamRequest::new(self.url(&self.endpoints.side_chat), body).with_auth_required(false))
    }

    fn chat_request(&self, mut request: ChatRequest) -> Result<StreamRequest, ClientError> {
        let defaults = &self.chat_defaults;
        request.model.get_or_insert_with(|| defaults.model.clone());
        request.max_tokens.get_or_insert(defaults.max_tokens);
        request.temperature.get_or_insert(defaults.temperature);
        request.top_p.get_or_insert(defaults.top_p);
        request
            .system_prompt
            .get_or_insert_with(|| defaults.system_prompt.clone());
        request.stream = Some(true);

        let body = serde_json::to_value(request)?;
        Ok(StreamRequest::new(self.url(&self.endpoints.chat), body))
    }

    fn start<H>(&self, request: StreamRequest, handler: H) -> Result<StreamHandle, ClientError>
    where
        H: StreamHandler + 'static,
    {
        start_stream(self.transport.clone(), self.credentials.as_ref(), request, handler)
    }

    /// Stream an answer to a knowledge-base query.
    pub fn smart_search<H>(&self, query: &str, handler: H) -> Result<StreamHandle, ClientError>
    where
        H: StreamHandler + 'static,
    {
        self.start(self.smart_search_request(query)?, handler)
    }

    /// Stream a follow-up answer, sending at most `max_history` prior messages.
    pub fn side_chat<H>(&self, query: &str, history: &[ChatMessage], handler: H) -> Result<StreamHandle, ClientError>
    where
        H: StreamHandler + 'static,
    {
        self.start(self.side_chat_request(query, history)?, handler)
    }

    /// Stream a chat completion. Unset generation parameters get the configured defaults.
    pub fn chat<H>(&self, request: ChatRequest, handler: H) -> Result<StreamHandle, ClientError>
    where
        H: StreamHandler + 'static,
    {
        self.start(self.chat_request(request)?, handler)
    }

    /// Run a smart search on the current task and collect the answer and sources.
    pub async fn smart_search_collect(&self, query: &str) -> Result<SmartSearchResponse, ClientError> {
        let request = authorize(self.smart_search_request(query)?, self.credentials.as_ref())?;
        let mut collector = Collector::default();
        let outcome = run_stream(
            self.transport.as_ref(),
            request,
            &mut collector,
            &CancellationToken::new(),
        )
        .await;

        match outcome {
            SessionOutcome::Completed { answer, .. } => Ok(SmartSearchResponse {
                answer,
                sources: collector.sources,
            }),
            SessionOutcome::Errored(e) => Err(e),
            SessionOutcome::Cancelled => Err(ClientError::StreamCancelled),
        }
    }

    /// Probe the smart-search endpoint with the configured test query.
    pub async fn health_check(&self) -> bool {
        match self.smart_search_request(&self.endpoints.probe_query) {
            Ok(request) => {
                probe(
                    self.transport.as_ref(),
                    self.credentials.as_ref(),
                    request,
                    &self.stream_options,
                )
                .await
            }
            Err(_) => false,
        }
    }
}

#[derive(Default)]
struct Collector {
    sources: Vec<SourceRecord>,
}

impl StreamHandler for Collector {
    fn on_source(&mut self, sources: Value) {
        self.sources.extend(SourceRecord::from_value(&sources));
    }
}
