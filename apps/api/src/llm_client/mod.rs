/// LLM Client — the single point of entry for all generative-model calls in LucianVotes.
///
/// ARCHITECTURAL RULE: No other module may call the model backend directly.
/// Flows go through the `ModelInvoker` trait so they can be driven by a
/// scripted backend in tests and by `LlmClient` in production.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

pub mod prompts;
pub mod schema;
#[cfg(test)]
pub mod testing;

use schema::{SchemaViolation, StructuredOutput};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const MAX_OUTPUT_TOKENS: u32 = 2048;
const TEMPERATURE: f32 = 0.4;
/// Upper bound on attempts per call, whatever the configuration says.
pub const MAX_ATTEMPTS_CEILING: u32 = 10;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream service error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Schema validation failed: {0}")]
    SchemaValidation(#[from] SchemaViolation),

    #[error("Could not parse model output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model returned empty content")]
    EmptyContent,

    #[error("Gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl LlmError {
    /// Network failures, rate limiting and 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_) => true,
            LlmError::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// One prompt ready to send, optionally constrained by a response schema.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub prompt: String,
    pub system: String,
    pub response_schema: Option<Value>,
}

/// Anything that can turn a prompt into model text.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<String, LlmError>;
}

/// Sends `prompt` with no schema and returns the raw model text.
pub async fn invoke_text(
    invoker: &dyn ModelInvoker,
    prompt: &str,
    system: &str,
) -> Result<String, LlmError> {
    let request = ModelRequest {
        prompt: prompt.to_string(),
        system: system.to_string(),
        response_schema: None,
    };
    let text = invoker.generate(&request).await?;
    if text.trim().is_empty() {
        return Err(LlmError::EmptyContent);
    }
    Ok(text)
}

/// Builds a request whose output is constrained by `T::schema()`.
pub fn structured_request<T: StructuredOutput>(prompt: &str, system: &str) -> ModelRequest {
    ModelRequest {
        prompt: prompt.to_string(),
        system: system.to_string(),
        response_schema: Some(T::schema().to_response_schema()),
    }
}

/// Validates model text against `T::schema()` and deserializes it.
///
/// The text must hold a JSON object carrying every required field with a
/// coercible type, otherwise this fails. Partial objects are never returned.
pub fn parse_structured<T: StructuredOutput>(text: &str) -> Result<T, LlmError> {
    let value = parse_json_payload(text)?;
    let normalized = T::schema().validate(&value)?;
    Ok(serde_json::from_value(normalized)?)
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LlmOptions {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    /// Total attempts including the first; clamped to `1..=MAX_ATTEMPTS_CEILING`.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub initial_backoff: Duration,
    /// Cap on any single backoff delay.
    pub max_backoff: Duration,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl LlmOptions {
    /// Delay before retry number `retry` (0-indexed): `initial_backoff * 2^retry`,
    /// capped at `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_backoff)
    }
}

impl From<&Config> for LlmOptions {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.llm_base_url.clone(),
            model: config.llm_model.clone(),
            timeout: config.llm_timeout,
            max_attempts: config.llm_max_retries,
            ..Self::default()
        }
    }
}

/// The production model client.
/// Wraps the `generateContent` API with timeout, bounded retry and usage logging.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    options: LlmOptions,
}

impl LlmClient {
    pub fn new(api_key: String, options: LlmOptions) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(options.timeout).build()?;
        Ok(Self {
            client,
            api_key,
            options: LlmOptions {
                max_attempts: options.max_attempts.clamp(1, MAX_ATTEMPTS_CEILING),
                ..options
            },
        })
    }

    pub fn model(&self) -> &str {
        &self.options.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.options.base_url.trim_end_matches('/'),
            self.options.model
        )
    }

    /// Makes a call to the backend, returning the full response object.
    /// Retries transient failures (network, 429, 5xx) with exponential backoff.
    pub async fn call(&self, request: &ModelRequest) -> Result<GenerateContentResponse, LlmError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            system_instruction: (!request.system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part {
                    text: &request.system,
                }],
            }),
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: request
                    .response_schema
                    .as_ref()
                    .map(|_| "application/json"),
                response_schema: request.response_schema.as_ref(),
            },
        };
        let url = self.endpoint();

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..self.options.max_attempts {
            if attempt > 0 {
                let delay = self.options.backoff_for(attempt - 1);
                warn!(
                    "Model call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&url, &body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    warn!("Transient model backend failure: {e}");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(LlmError::RetriesExhausted {
            attempts: self.options.max_attempts,
        }))
    }

    async fn send_once(
        &self,
        url: &str,
        body: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, LlmError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Model call succeeded: model={}, prompt_tokens={}, output_tokens={}",
                self.options.model, usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(parsed)
    }
}

#[async_trait]
impl ModelInvoker for LlmClient {
    async fn generate(&self, request: &ModelRequest) -> Result<String, LlmError> {
        let response = self.call(request).await?;
        if let Some(reason) = response
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            if reason != "STOP" {
                warn!("Model finished with reason {reason}");
            }
        }
        response.text().ok_or(LlmError::EmptyContent)
    }
}

/// Pulls a JSON value out of model text, tolerating code fences and chatter
/// around a single object.
fn parse_json_payload(text: &str) -> Result<Value, LlmError> {
    let stripped = strip_json_fences(text);
    match serde_json::from_str(stripped) {
        Ok(value) => Ok(value),
        Err(e) => match (stripped.find('{'), stripped.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                Ok(serde_json::from_str(&stripped[start..=end])?)
            }
            _ => Err(LlmError::Parse(e)),
        },
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::schema::{FieldSpec, FieldType, OutputSchema};
    use crate::llm_client::testing::ScriptedInvoker;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        winner: String,
        margin: f64,
    }

    impl StructuredOutput for Verdict {
        fn schema() -> OutputSchema {
            OutputSchema::new(vec![
                FieldSpec::required("winner", FieldType::String, "party"),
                FieldSpec::required("margin", FieldType::Number, "points"),
            ])
        }
    }

    fn gemini_body(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
        })
    }

    fn client_for(server: &MockServer, max_attempts: u32) -> LlmClient {
        LlmClient::new(
            "test-key".to_string(),
            LlmOptions {
                base_url: server.uri(),
                model: "test-model".to_string(),
                timeout: Duration::from_secs(5),
                max_attempts,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(10),
            },
        )
        .unwrap()
    }

    /// Points at a port nothing listens on, so every attempt is refused.
    fn unreachable_client(max_attempts: u32, initial_backoff: Duration) -> LlmClient {
        LlmClient::new(
            "test-key".to_string(),
            LlmOptions {
                base_url: "http://127.0.0.1:1".to_string(),
                model: "test-model".to_string(),
                timeout: Duration::from_secs(5),
                max_attempts,
                initial_backoff,
                max_backoff: Duration::from_secs(30),
            },
        )
        .unwrap()
    }

    fn request(prompt: &str) -> ModelRequest {
        ModelRequest {
            prompt: prompt.to_string(),
            system: "be brief".to_string(),
            response_schema: None,
        }
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_json_payload_ignores_surrounding_chatter() {
        let value = parse_json_payload("Sure! Here it is: {\"a\": 1} Hope that helps.").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_parse_json_payload_rejects_prose() {
        assert!(matches!(
            parse_json_payload("I cannot predict that."),
            Err(LlmError::Parse(_))
        ));
    }

    #[test]
    fn test_transient_classification() {
        let rate_limited = LlmError::Upstream {
            status: 429,
            message: String::new(),
        };
        let bad_request = LlmError::Upstream {
            status: 400,
            message: String::new(),
        };
        assert!(rate_limited.is_transient());
        assert!(!bad_request.is_transient());
        assert!(!LlmError::EmptyContent.is_transient());
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let options = LlmOptions::default();
        assert_eq!(options.backoff_for(0), Duration::from_secs(1));
        assert_eq!(options.backoff_for(1), Duration::from_secs(2));
        assert_eq!(options.backoff_for(2), Duration::from_secs(4));
        assert_eq!(options.backoff_for(5), Duration::from_secs(30));
        assert_eq!(options.backoff_for(40), Duration::from_secs(30));
        assert_eq!(options.backoff_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_attempts_clamped_to_ceiling() {
        let client = unreachable_client(40, Duration::from_secs(1));
        assert_eq!(client.options.max_attempts, MAX_ATTEMPTS_CEILING);
        let client = unreachable_client(0, Duration::from_secs(1));
        assert_eq!(client.options.max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_attempt_count_stays_bounded() {
        let client = unreachable_client(40, Duration::from_secs(1));
        let started = tokio::time::Instant::now();

        let err = client.generate(&request("hi")).await.unwrap_err();

        assert!(matches!(err, LlmError::Network(_)));
        // 1 + 2 + 4 + 8 + 16 + 30 * 4 = 151s of backoff, plus at most one timeout per attempt.
        let worst_case = Duration::from_secs(151 + 5 * u64::from(MAX_ATTEMPTS_CEILING));
        assert!(started.elapsed() <= worst_case, "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_refused_connection_is_retried() {
        let client = unreachable_client(3, Duration::from_millis(20));
        let started = std::time::Instant::now();

        let err = client.generate(&request("hi")).await.unwrap_err();

        assert!(matches!(err, LlmError::Network(_)));
        assert!(err.is_transient());
        // Two backoffs (20ms + 40ms) only happen if the call was retried.
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_and_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(gemini_body("too late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = LlmClient::new(
            "test-key".to_string(),
            LlmOptions {
                base_url: server.uri(),
                model: "test-model".to_string(),
                timeout: Duration::from_millis(50),
                max_attempts: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(10),
            },
        )
        .unwrap();

        match client.generate(&request("hi")).await {
            Err(LlmError::Network(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "Hello, "}, {"text": "Castries"}]}}]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello, Castries"));
    }

    #[test]
    fn test_response_text_none_without_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(response.text().is_none());
    }

    #[tokio::test]
    async fn test_generate_sends_key_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("78")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 3);
        let text = client.generate(&request("volatility?")).await.unwrap();
        assert_eq!(text, "78");
    }

    #[tokio::test]
    async fn test_generate_retries_server_error_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("ok")))
            .mount(&server)
            .await;

        let client = client_for(&server, 3);
        assert_eq!(client.generate(&request("hi")).await.unwrap(), "ok");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_generate_does_not_retry_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 3);
        match client.generate(&request("hi")).await {
            Err(LlmError::Upstream { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server, 2);
        let err = client.generate(&request("hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::Upstream { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_generate_empty_candidates_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let client = client_for(&server, 1);
        assert!(matches!(
            client.generate(&request("hi")).await,
            Err(LlmError::EmptyContent)
        ));
    }

    #[tokio::test]
    async fn test_structured_request_carries_response_schema() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(gemini_body("{\"winner\": \"SLP\", \"margin\": 4.5}")),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, 1);
        let text = client
            .generate(&structured_request::<Verdict>("who wins?", "json only"))
            .await
            .unwrap();
        let verdict: Verdict = parse_structured(&text).unwrap();
        assert_eq!(verdict.winner, "SLP");

        let received = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "json only");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "who wins?");
    }

    #[test]
    fn test_parse_structured_rejects_partial_object() {
        let result = parse_structured::<Verdict>("{\"winner\": \"UWP\"}");
        assert!(matches!(
            result,
            Err(LlmError::SchemaValidation(SchemaViolation::MissingField("margin")))
        ));
    }

    #[test]
    fn test_parse_structured_accepts_fenced_output() {
        let verdict =
            parse_structured::<Verdict>("```json\n{\"winner\": \"SLP\", \"margin\": \"3\"}\n```")
                .unwrap();
        assert_eq!(
            verdict,
            Verdict {
                winner: "SLP".to_string(),
                margin: 3.0
            }
        );
    }

    #[tokio::test]
    async fn test_invoke_text_rejects_blank_output() {
        let invoker = ScriptedInvoker::replying("   ");
        assert!(matches!(
            invoke_text(&invoker, "p", "s").await,
            Err(LlmError::EmptyContent)
        ));
    }
}
