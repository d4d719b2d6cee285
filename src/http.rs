//! reqwest-backed implementation of [`Transport`].
//!
//! This module provides HTTP client construction, header handling and the
//! chunk reader over a response body.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use crate::client::{ClientError, TransportError};
use crate::options::{HttpTransport, TransportOptions, EVENT_STREAM_CONTENT_TYPE};
use crate::transport::{ChunkReader, StreamRequest, StreamingResponse, Transport};

const API_KEY_HEADER: &str = "X-API-Key";

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(
    transport_options: &TransportOptions<HttpTransport>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.provider.proxy {
        if let Ok(proxy) = reqwest::Proxy::all(proxy_url) {
            builder = builder.proxy(proxy);
        }
    }

    builder.build()
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Streaming POSTs over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    options: TransportOptions<HttpTransport>,
}

impl ReqwestTransport {
    pub fn new(options: TransportOptions<HttpTransport>) -> Result<Self, ClientError> {
        let client = build_http_client(&options)?;
        Ok(Self { client, options })
    }

    fn build_request(&self, request: &StreamRequest) -> RequestBuilder {
        let mut req = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE);

        if let Some(api_key) = &self.options.provider.api_key {
            req = req.header(API_KEY_HEADER, api_key.expose_secret());
        }

        req = add_extra_headers(req, &self.options.provider.extra_headers);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        req.json(&request.body)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_streaming(&self, request: &StreamRequest) -> Result<StreamingResponse, TransportError> {
        debug!("POST {}", request.url);
        let response = self.build_request(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(TransportError::MissingBody);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(StreamingResponse {
            status: status.as_u16(),
            content_type,
            reader: Box::new(ReqwestReader::new(response)),
        })
    }
}

/// Chunk reader over a reqwest response body.
///
/// Cancelling drops the body stream, which closes the connection.
pub struct ReqwestReader {
    body: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
}

impl ReqwestReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            body: Some(response.bytes_stream().boxed()),
        }
    }
}

#[async_trait]
impl ChunkReader for ReqwestReader {
    async fn read(&mut self) -> Option<Result<Bytes, TransportError>> {
        let body = self.body.as_mut()?;
        body.next().await.map(|chunk| chunk.map_err(TransportError::from))
    }

    fn cancel(&mut self) {
        if self.body.take().is_some() {
            debug!("Response body released");
        }
    }
}
