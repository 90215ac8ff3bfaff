//! HTTP transport seam used by the album provider.
//!
//! Non-2xx statuses come back as ordinary responses; only transport failures
//! (DNS, TLS, timeouts, dropped connections) surface as [`BridgeError`].

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::io::{DynAsyncRead, UploadBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    /// Buffered body. Streamed uploads pass theirs separately.
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// `Authorization: GoogleLogin auth=<token>`, the ClientLogin scheme the
    /// Picasa Web Albums feeds accept.
    pub fn google_login(self, token: impl AsRef<str>) -> Self {
        let value = format!("GoogleLogin auth={}", token.as_ref());
        self.header("Authorization", value)
    }

    pub fn content_type(self, mime: impl Into<String>) -> Self {
        self.header("Content-Type", mime)
    }

    pub fn body(self, body: impl Into<Bytes>) -> Self {
        HttpRequest {
            body: Some(body.into()),
            ..self
        }
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        HttpRequest {
            timeout: Some(timeout),
            ..self
        }
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn text(&self) -> Result<String> {
        std::str::from_utf8(&self.body)
            .map(str::to_owned)
            .map_err(|e| BridgeError::OperationFailed(format!("response body is not UTF-8: {e}")))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Statuses worth another attempt: throttling and server-side failures.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Response whose body is read incrementally.
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Box<DynAsyncRead>,
}

impl fmt::Debug for HttpStreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Exponential backoff, doubling from `base_delay` up to `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total sends, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Send once, never retry.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        }
    }

    /// Pause before retry `retry` (1 is the first retry).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a request with a buffered body.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Send under an explicit retry policy. Clients without retry support
    /// fall back to a single [`execute`](HttpClient::execute).
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let _ = policy;
        self.execute(request).await
    }

    /// Send a request whose body is read from `body`; `request.body` is
    /// ignored. Never retried, since the body cannot be replayed.
    async fn execute_streaming(&self, request: HttpRequest, body: UploadBody)
        -> Result<HttpResponse>;

    /// Send a request and return the response body unread.
    async fn download_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse>;
}
