//! HTTP transport seam.
//!
//! The transport is a value of callable shape with a fixed request/response
//! signature, so callers (and tests) can swap the real HTTP client for a
//! deterministic double without touching the typed agent API.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Default overall request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// HTTP method subset used against the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Head,
}

impl Method {
    /// GET and HEAD requests never carry a body.
    fn is_bodyless(self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

/// A single request against the agent.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Query-string pairs appended to the URL. An empty value renders as a
    /// bare key (`?passing` rather than `?passing=`).
    pub params: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            params: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }
}

/// Response body, decoded to text when the content type names a charset we
/// understand, otherwise passed through as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Bytes(bytes) => bytes,
        }
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub payload: Payload,
}

/// Transport-level failure kinds.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed")]
    Connect,

    #[error("request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Other(String),
}

/// The function-shaped HTTP client the agent API drives.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: Request) -> Result<Response, TransportError>;
}

/// Production transport backed by a pooled reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the default timeouts.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeouts(DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a transport with explicit overall and connect timeouts.
    ///
    /// Redirects are disabled: the agent never redirects, and a redirect
    /// would silently re-issue a registration elsewhere.
    pub fn with_timeouts(
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: Request) -> Result<Response, TransportError> {
        let url = extend_query(&request.url, &request.params);
        debug!(method = ?request.method, url = %url, "Sending agent request");

        let mut builder = self.client.request(request.method.as_reqwest(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.method.is_bodyless() {
            if let Some(body) = request.body {
                builder = builder.body(body);
            }
        }

        let response = builder.send().await.map_err(classify_error)?;
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let content_type = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.to_ascii_lowercase())
            .unwrap_or_default();

        let bytes = response.bytes().await.map_err(classify_error)?;
        let payload = decode_payload(&content_type, bytes.to_vec());

        Ok(Response {
            status,
            headers,
            payload,
        })
    }
}

fn classify_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect
    } else {
        TransportError::Other(error.to_string())
    }
}

/// Append `params` to the URL's query string. Pre-existing keys are kept:
/// new pairs are always appended with `&`, never replacing.
fn extend_query(url: &str, params: &[(String, String)]) -> String {
    let mut out = url.to_string();
    let mut separator = if url.contains('?') { '&' } else { '?' };
    for (key, value) in params {
        out.push(separator);
        out.push_str(key);
        if !value.is_empty() {
            out.push('=');
            out.push_str(value);
        }
        separator = '&';
    }
    out
}

/// Decode a response body using the charset named by `content-type`.
fn decode_payload(content_type: &str, bytes: Vec<u8>) -> Payload {
    if content_type.contains("utf-8")
        || content_type.contains("utf8")
        || content_type.contains("application/json")
    {
        match String::from_utf8(bytes) {
            Ok(text) => Payload::Text(text),
            Err(err) => Payload::Bytes(err.into_bytes()),
        }
    } else if content_type.contains("iso-8859-1") {
        Payload::Text(bytes.into_iter().map(char::from).collect())
    } else {
        Payload::Bytes(bytes)
    }
}
