//! Configuration for transports, stream handling and endpoint paths.

use std::collections::HashMap;
use std::time::Duration;

/// Content type a streaming endpoint must answer with.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A secret string type for sensitive data like API keys and bearer tokens.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Generic transport options: the generic timeout plus transport-specific settings.
///
/// # Example
/// ```rust
/// use clubstream::options::{HttpTransport, TransportOptions};
/// use std::time::Duration;
///
/// let options = TransportOptions::new(
///     HttpTransport::new("super_plus_api_key").with_base_url("http://localhost:8080/api/trans/rag/".to_string()),
/// )
/// .with_timeout(Duration::from_secs(30));
/// assert_eq!(options.timeout, Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions<T> {
    /// Request timeout (applies to all transports)
    pub timeout: Option<Duration>,

    pub provider: T,
}

impl<T> TransportOptions<T> {
    pub fn new(provider: T) -> Self {
        Self {
            timeout: None,
            provider,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP-specific transport options.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    /// Service API key, sent as `X-API-Key`
    pub api_key: Option<SecretString>,

    /// Base URL that endpoint paths are joined onto
    pub base_url: Option<String>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl HttpTransport {
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: None,
            proxy: None,
            extra_headers: None,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

/// Settings that govern how a response body is validated and probed.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Content type a probe accepts as a live streaming endpoint
    pub expected_content_type: String,

    /// Deadline for the probe to see its first chunk
    pub probe_timeout: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            expected_content_type: EVENT_STREAM_CONTENT_TYPE.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl StreamOptions {
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_expected_content_type(mut self, content_type: String) -> Self {
        self.expected_content_type = content_type;
        self
    }
}

/// Paths of the retrieval-augmented endpoints, relative to the base URL.
#[derive(Debug, Clone)]
pub struct RagEndpoints {
    pub smart_search: String,
    pub side_chat: String,
    pub chat: String,

    /// Most recent messages kept when sending side-chat history
    pub max_history: usize,

    /// Query sent by the health check
    pub probe_query: String,
}

impl Default for RagEndpoints {
    fn default() -> Self {
        Self {
            smart_search: "smart-search".to_string(),
            side_chat: "sider-chat".to_string(),
            chat: "chat".to_string(),
            max_history: 10,
            probe_query: "测试查询".to_string(),
        }
    }
}

/// Values filled into chat requests that leave them unset.
#[derive(Debug, Clone)]
pub struct ChatDefaults {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub system_prompt: String,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            model: "Qwen/Qwen3-8B-AWQ".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            top_p: 0.9,
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}
