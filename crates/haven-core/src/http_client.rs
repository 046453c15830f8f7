//! Transport abstraction beneath the text-generation client.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// HTTP verbs the generation endpoints need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout_ms: 30_000,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Attach a JSON body and the matching content type.
    pub fn with_json(self, body: &serde_json::Value) -> Self {
        let mut request = self.with_header("content-type", "application/json");
        request.body = Some(body.to_string());
        request
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Response status and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level failure (no response was received).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    timeout: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn is_timeout(&self) -> bool {
        self.timeout
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// Async transport contract.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;
}

/// Offline transport that answers every request with the same response.
///
/// Records the number of calls and the last request so tests can assert on
/// what the generation client sent.
#[derive(Debug)]
pub struct CannedHttpClient {
    response: Result<HttpResponse, HttpError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<HttpRequest>>,
}

impl CannedHttpClient {
    pub fn new(response: HttpResponse) -> Self {
        Self {
            response: Ok(response),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing(error: HttpError) -> Self {
        Self {
            response: Err(error),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(None)
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.last_request.lock() {
            *slot = Some(request);
        }
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

/// Production transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("haven/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(&request.url),
                HttpMethod::Post => self.client.post(&request.url),
            };

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            builder = builder.timeout(Duration::from_millis(request.timeout_ms));
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body_sets_content_type() {
        let request =
            HttpRequest::post("https://example.test/generate").with_json(&serde_json::json!({"a": 1}));

        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(request.body.as_deref(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn canned_client_counts_calls_and_keeps_last_request() {
        let client = CannedHttpClient::new(HttpResponse::ok_json("{}"));
        let request = HttpRequest::get("https://example.test/a").with_header("X-Key", "k");

        let response = client.execute(request).await.expect("canned response");

        assert!(response.is_success());
        assert_eq!(client.calls(), 1);
        let last = client.last_request().expect("recorded");
        assert_eq!(last.headers.get("x-key").map(String::as_str), Some("k"));
    }
}
