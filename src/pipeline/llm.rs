//! Completion calls: send an [`ExtractionRequest`] to the model service.
//!
//! [`CompletionClient`] is the seam between the pipeline and the network.
//! [`OpenRouterClient`] is the production implementation; tests plug in
//! scripted clients.
//!
//! ## Retry Strategy
//!
//! Off by default (`max_retries = 0`). When enabled, only retryable failures
//! (429, 5xx, timeouts, connect errors) are retried, with exponential backoff
//! `retry_backoff_ms * 2^(attempt-1)`.

use crate::config::{ApiKey, TrackerConfig};
use crate::error::SubTrackError;
use crate::pipeline::request::{ExtractionRequest, ResponseShape};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Raw model output for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Anything that can answer an [`ExtractionRequest`].
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        request: &ExtractionRequest,
        api_key: &ApiKey,
    ) -> Result<Completion, SubTrackError>;
}

/// Call `client`, retrying retryable failures per `config`.
///
/// Returns the completion and the number of retries it took.
pub async fn complete_with_retry(
    client: &dyn CompletionClient,
    request: &ExtractionRequest,
    api_key: &ApiKey,
    config: &TrackerConfig,
) -> Result<(Completion, u32), SubTrackError> {
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Completion retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match client.complete(request, api_key).await {
            Ok(completion) => {
                debug!(
                    "{} input tokens, {} output tokens, {:?}",
                    completion.prompt_tokens,
                    completion.completion_tokens,
                    start.elapsed()
                );
                return Ok((completion, attempt));
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                warn!("Completion attempt {} failed: {}", attempt + 1, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ── OpenRouter ───────────────────────────────────────────────────────────

/// Client for OpenRouter's OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    url: String,
    timeout_secs: Option<u64>,
}

impl OpenRouterClient {
    /// Build a client for `config.base_url`, honouring `api_timeout_secs`.
    pub fn new(config: &TrackerConfig) -> Result<Self, SubTrackError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.api_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            url: config.completions_url(),
            timeout_secs: config.api_timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

fn chat_request(request: &ExtractionRequest) -> ChatRequest<'_> {
    let response_format = match &request.shape {
        ResponseShape::FreeText => None,
        ResponseShape::JsonSchema { name, schema } => Some(ResponseFormat {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name,
                strict: true,
                schema,
            },
        }),
    };

    ChatRequest {
        model: &request.model,
        messages: vec![ChatMessage {
            role: "user",
            content: &request.prompt,
        }],
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        response_format,
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(
        &self,
        request: &ExtractionRequest,
        api_key: &ApiKey,
    ) -> Result<Completion, SubTrackError> {
        let body = chat_request(request);

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| match (e.is_timeout(), self.timeout_secs) {
                (true, Some(secs)) => SubTrackError::ApiTimeout { secs },
                _ => SubTrackError::Http(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => SubTrackError::AuthError { detail: text },
                429 => SubTrackError::RateLimitExceeded {
                    model: request.model.clone(),
                    retry_after_secs,
                },
                code => SubTrackError::LlmApiError {
                    status: code,
                    message: text,
                },
            });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SubTrackError::LlmApiError {
                status: status.as_u16(),
                message: "response contained no choices".into(),
            })?;
        let usage = reply.usage.unwrap_or(Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });

        Ok(Completion {
            content: content.trim().to_string(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}
