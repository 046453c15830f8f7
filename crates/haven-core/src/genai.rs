//! Text-generation service client.
//!
//! The normalizer, the anchor providers and the companion features talk to
//! the hosted model only through [`TextGenerator`], so tests can swap in a
//! scripted generator and the CLI can run fully offline.
//!
//! [`GeminiClient`] is the production implementation. It speaks the
//! `models/{model}:generateContent` REST endpoint over any [`HttpClient`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::retry::RetryPolicy;
use crate::SourceCitation;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One call to the generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Falls back to the client's default model when `None`.
    pub model: Option<String>,
    pub prompt: String,
    pub system_instruction: Option<String>,
    /// Attach the search tool so the answer can cite retrieved pages.
    pub grounded: bool,
    /// Force JSON output matching this schema.
    pub response_schema: Option<Value>,
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
            system_instruction: None,
            grounded: false,
            response_schema: None,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn grounded(mut self) -> Self {
        self.grounded = true;
        self
    }

    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Free text plus any grounding citations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationResponse {
    pub text: String,
    pub sources: Vec<SourceCitation>,
}

impl GenerationResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenError {
    #[error("generation service api key is not configured")]
    MissingApiKey,
    #[error("generation transport failed: {0}")]
    Transport(String),
    #[error("generation request timed out")]
    Timeout,
    #[error("generation service returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode generation response: {0}")]
    Decode(String),
    #[error("generation response contained no text")]
    Empty,
}

impl GenError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "genai.missing_api_key",
            Self::Transport(_) => "genai.transport",
            Self::Timeout => "genai.timeout",
            Self::Status { .. } => "genai.status",
            Self::Decode(_) => "genai.decode",
            Self::Empty => "genai.empty",
        }
    }
}

pub type GenFuture<'a> =
    Pin<Box<dyn Future<Output = Result<GenerationResponse, GenError>> + Send + 'a>>;

/// Generation service contract.
pub trait TextGenerator: Send + Sync {
    fn id(&self) -> &'static str;

    fn generate<'a>(&'a self, request: GenerationRequest) -> GenFuture<'a>;
}

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    model: String,
    base_url: String,
    timeout_ms: u64,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()), api_key)
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            model: String::from(DEFAULT_MODEL),
            base_url: String::from(DEFAULT_BASE_URL),
            timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_http_request(&self, request: &GenerationRequest) -> HttpRequest {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        HttpRequest::post(url)
            .with_header("x-goog-api-key", self.api_key.as_str())
            .with_timeout_ms(self.timeout_ms)
            .with_json(&request_body(request))
    }

    async fn generate_with_retry(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenError> {
        if self.api_key.trim().is_empty() {
            return Err(GenError::MissingApiKey);
        }

        let http_request = self.build_http_request(&request);
        let mut attempt = 0;
        loop {
            let can_retry = attempt < self.retry.max_retries;
            match self.http_client.execute(http_request.clone()).await {
                Ok(response) if response.is_success() => {
                    return decode_response(&response.body);
                }
                Ok(response) => {
                    if can_retry && self.retry.should_retry_status(response.status) {
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!(
                            status = response.status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "generation call rejected, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(GenError::Status {
                        status: response.status,
                        message: error_message(&response.body),
                    });
                }
                Err(error) => {
                    if can_retry && error.is_timeout() && self.retry.retry_on_timeout {
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!(attempt, "generation call timed out, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    if error.is_timeout() {
                        return Err(GenError::Timeout);
                    }
                    return Err(GenError::Transport(error.message().to_owned()));
                }
            }
        }
    }
}

impl TextGenerator for GeminiClient {
    fn id(&self) -> &'static str {
        "gemini"
    }

    fn generate<'a>(&'a self, request: GenerationRequest) -> GenFuture<'a> {
        Box::pin(async move {
            debug!(
                grounded = request.grounded,
                structured = request.response_schema.is_some(),
                "issuing generation call"
            );
            self.generate_with_retry(request).await
        })
    }
}

fn request_body(request: &GenerationRequest) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
    });

    if let Some(instruction) = &request.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
    }
    if request.grounded {
        body["tools"] = json!([{ "google_search": {} }]);
    }

    let mut generation_config = serde_json::Map::new();
    if let Some(schema) = &request.response_schema {
        generation_config.insert(String::from("responseMimeType"), json!("application/json"));
        generation_config.insert(String::from("responseSchema"), schema.clone());
    }
    if let Some(temperature) = request.temperature {
        generation_config.insert(String::from("temperature"), json!(temperature));
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }

    body
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

fn decode_response(body: &str) -> Result<GenerationResponse, GenError> {
    let parsed: GeminiResponse =
        serde_json::from_str(body).map_err(|e| GenError::Decode(e.to_string()))?;
    let candidate = parsed.candidates.into_iter().next().ok_or(GenError::Empty)?;

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(GenError::Empty);
    }

    let sources = candidate
        .grounding_metadata
        .map(|metadata| {
            metadata
                .grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .filter_map(|web| {
                    let uri = web.uri.filter(|uri| !uri.is_empty())?;
                    let title = web.title.unwrap_or_else(|| uri.clone());
                    Some(SourceCitation { title, uri })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(GenerationResponse { text, sources })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_owned))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{CannedHttpClient, HttpError, HttpResponse};

    const GROUNDED_BODY: &str = r#"{
        "candidates": [{
            "content": { "parts": [{ "text": "Here is the data: " }, { "text": "[{\"date\":\"2024-01\",\"value\":50}]" }] },
            "groundingMetadata": { "groundingChunks": [
                { "web": { "uri": "https://example.test/gold", "title": "Gold history" } },
                { "web": { "title": "no uri" } },
                { "retrievedContext": {} }
            ] }
        }]
    }"#;

    #[tokio::test]
    async fn decodes_text_parts_and_citations() {
        let http = Arc::new(CannedHttpClient::new(HttpResponse::ok_json(GROUNDED_BODY)));
        let client = GeminiClient::with_http_client(http.clone(), "key");

        let response = client
            .generate(GenerationRequest::new("gold prices").grounded())
            .await
            .expect("decodes");

        assert_eq!(
            response.text,
            "Here is the data: [{\"date\":\"2024-01\",\"value\":50}]"
        );
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].title, "Gold history");
    }

    #[tokio::test]
    async fn grounded_structured_request_carries_tool_and_schema() {
        let http = Arc::new(CannedHttpClient::new(HttpResponse::ok_json(GROUNDED_BODY)));
        let client = GeminiClient::with_http_client(http.clone(), "secret").with_model("m-1");

        client
            .generate(
                GenerationRequest::new("p")
                    .grounded()
                    .with_system_instruction("be calm")
                    .with_response_schema(json!({"type": "ARRAY"}))
                    .with_temperature(0.9),
            )
            .await
            .expect("decodes");

        let sent = http.last_request().expect("request recorded");
        assert!(sent.url.ends_with("/models/m-1:generateContent"));
        assert_eq!(sent.headers.get("x-goog-api-key").map(String::as_str), Some("secret"));
        let body: Value = serde_json::from_str(sent.body.as_deref().expect("body")).expect("json");
        assert!(body["tools"][0].get("google_search").is_some());
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be calm");
    }

    #[tokio::test]
    async fn non_retryable_status_surfaces_service_message() {
        let http = Arc::new(CannedHttpClient::new(HttpResponse {
            status: 400,
            body: String::from(r#"{"error":{"message":"bad schema"}}"#),
        }));
        let client = GeminiClient::with_http_client(http.clone(), "key");

        let err = client
            .generate(GenerationRequest::new("p"))
            .await
            .expect_err("must fail");

        assert_eq!(
            err,
            GenError::Status {
                status: 400,
                message: String::from("bad schema")
            }
        );
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn retryable_status_is_reissued_up_to_policy_limit() {
        let http = Arc::new(CannedHttpClient::new(HttpResponse {
            status: 503,
            body: String::from("overloaded"),
        }));
        let client = GeminiClient::with_http_client(http.clone(), "key")
            .with_retry(RetryPolicy::fixed(std::time::Duration::from_millis(1), 2));

        let err = client
            .generate(GenerationRequest::new("p"))
            .await
            .expect_err("must fail");

        assert!(matches!(err, GenError::Status { status: 503, .. }));
        assert_eq!(http.calls(), 3);
    }

    #[tokio::test]
    async fn transport_timeout_maps_to_timeout_error() {
        let http = Arc::new(CannedHttpClient::failing(HttpError::timeout("slow")));
        let client =
            GeminiClient::with_http_client(http, "key").with_retry(RetryPolicy::none());

        let err = client
            .generate(GenerationRequest::new("p"))
            .await
            .expect_err("must fail");

        assert_eq!(err, GenError::Timeout);
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network_call() {
        let http = Arc::new(CannedHttpClient::new(HttpResponse::ok_json(GROUNDED_BODY)));
        let client = GeminiClient::with_http_client(http.clone(), "  ");

        let err = client
            .generate(GenerationRequest::new("p"))
            .await
            .expect_err("must fail");

        assert_eq!(err, GenError::MissingApiKey);
        assert_eq!(http.calls(), 0);
    }

    #[test]
    fn empty_candidates_are_reported() {
        assert_eq!(decode_response(r#"{"candidates":[]}"#), Err(GenError::Empty));
        assert!(matches!(decode_response("not json"), Err(GenError::Decode(_))));
    }
}
