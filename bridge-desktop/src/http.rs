//! [`HttpClient`] over a pooled `reqwest` client.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{
        is_retryable_status, HttpClient, HttpMethod, HttpRequest, HttpResponse,
        HttpStreamResponse, RetryPolicy,
    },
    io::UploadBody,
};
use futures_util::TryStreamExt;
use reqwest::{header::HeaderMap, Client, Method, RequestBuilder, Response};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("contact-photo-sync/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffered requests are retried per [`RetryPolicy`]; streamed ones are sent
/// once.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(4)
            .build()
            .map(Self::with_client)
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client: {e}")))
    }

    pub fn with_client(client: Client) -> Self {
        ReqwestHttpClient { client }
    }

    fn prepare(&self, request: &HttpRequest) -> RequestBuilder {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        };
        let builder = request
            .headers
            .iter()
            .fold(self.client.request(method, &request.url), |builder, (name, value)| {
                builder.header(name, value)
            });
        match request.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<Response> {
        let mut builder = self.prepare(request);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder.send().await.map_err(transport_error)
    }
}

fn transport_error(e: reqwest::Error) -> BridgeError {
    let detail = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    };
    BridgeError::OperationFailed(detail)
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect()
}

async fn buffered(response: Response) -> Result<HttpResponse> {
    let status = response.status().as_u16();
    let headers = header_map(response.headers());
    let body = response.bytes().await.map_err(transport_error)?;
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default()).await
    }

    /// A retryable status on the final attempt is returned as-is so callers
    /// see the server's answer rather than a synthetic error.
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            debug!(method = %request.method, url = %request.url, attempt, "HTTP send");
            let last = attempt == attempts;
            match self.send_once(&request).await {
                Ok(response) if last || !is_retryable_status(response.status().as_u16()) => {
                    return buffered(response).await;
                }
                Ok(response) => {
                    warn!(status = response.status().as_u16(), attempt, "Retryable HTTP status");
                }
                Err(err) if last => return Err(err),
                Err(err) => {
                    warn!(error = %err, attempt, "HTTP send failed");
                }
            }
            tokio::time::sleep(policy.delay_for(attempt)).await;
            attempt += 1;
        }
    }

    async fn execute_streaming(
        &self,
        request: HttpRequest,
        body: UploadBody,
    ) -> Result<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "HTTP streamed upload");
        let response = self
            .prepare(&request)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(body)))
            .send()
            .await
            .map_err(transport_error)?;
        buffered(response).await
    }

    async fn download_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse> {
        debug!(url = %request.url, "HTTP streamed download");
        let response = self.send_once(&request).await?;
        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let reader = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        Ok(HttpStreamResponse {
            status,
            headers,
            body: Box::new(reader),
        })
    }
}
