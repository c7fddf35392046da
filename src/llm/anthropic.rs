use crate::config::LLMConfig;
use crate::llm::client::{LLMClient, LLMError, ModelQuery, ModelTier};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_QUICK_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_MAIN_MODEL: &str = "claude-sonnet-4-5-20250929";
const MAX_TOKENS: u32 = 1024;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

// Rate limiting: 10 requests per minute
const RATE_LIMIT_REQUESTS: usize = 10;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock<'a>>,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop_sequences: &'a [&'a str],
}

fn no_stop_sequences(sequences: &&[&str]) -> bool {
    sequences.is_empty()
}

#[derive(Serialize)]
struct SystemBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    stop_sequence: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Other,
}

impl AnthropicResponse {
    /// Concatenate thinking and text blocks in order, restoring the stop
    /// sequence the API strips from the output
    fn into_text(self) -> Result<String, LLMError> {
        let mut parts = Vec::new();
        for block in self.content {
            match block {
                ContentBlock::Text { text } => parts.push(text),
                ContentBlock::Thinking { thinking } => parts.push(thinking),
                ContentBlock::Other => {}
            }
        }
        if parts.is_empty() {
            return Err(LLMError::InvalidResponse(
                "No text content in response".to_string(),
            ));
        }

        let mut text = parts.join("\n");
        if self.stop_reason.as_deref() == Some("stop_sequence") {
            if let Some(sequence) = self.stop_sequence {
                text.push_str(&sequence);
            }
        }
        Ok(text)
    }
}

pub struct AnthropicClient {
    api_key: String,
    quick_model: String,
    main_model: String,
    http_client: Client,
    // Rate limiting: track request timestamps
    request_times: Mutex<Vec<Instant>>,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Result<Self, LLMError> {
        Self::with_models(
            api_key,
            DEFAULT_QUICK_MODEL.to_string(),
            DEFAULT_MAIN_MODEL.to_string(),
        )
    }

    pub fn with_models(
        api_key: String,
        quick_model: String,
        main_model: String,
    ) -> Result<Self, LLMError> {
        let http_client = Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self {
            api_key,
            quick_model,
            main_model,
            http_client,
            request_times: Mutex::new(Vec::new()),
        })
    }

    pub fn from_config(config: &LLMConfig, api_key: String) -> Result<Self, LLMError> {
        Self::with_models(
            api_key,
            config.quick_model.clone(),
            config.main_model.clone(),
        )
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Quick => &self.quick_model,
            ModelTier::Main => &self.main_model,
        }
    }

    /// Check and enforce rate limiting
    /// Returns Ok(()) if request is allowed, Err with wait time if rate limited
    fn check_rate_limit(&self) -> Result<(), LLMError> {
        let now = Instant::now();
        let mut times = self
            .request_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Remove requests older than the rate limit window
        times.retain(|&time| now.duration_since(time) < RATE_LIMIT_WINDOW);

        if times.len() >= RATE_LIMIT_REQUESTS {
            let oldest = times[0];
            let wait_time = RATE_LIMIT_WINDOW.saturating_sub(now.duration_since(oldest));
            return Err(LLMError::RateLimitExceeded(wait_time.as_secs()));
        }

        times.push(now);
        Ok(())
    }

    async fn call_api(&self, query: ModelQuery<'_>) -> Result<String, LLMError> {
        let request_body = AnthropicRequest {
            model: self.model_for(query.tier),
            max_tokens: MAX_TOKENS,
            system: query
                .system_prompt
                .iter()
                .map(|text| SystemBlock { kind: "text", text })
                .collect(),
            messages: vec![Message {
                role: "user",
                content: query.user_input,
            }],
            stop_sequences: query.stop_sequences,
        };

        let mut attempt = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            attempt += 1;

            let response = self
                .http_client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        LLMError::Timeout
                    } else {
                        LLMError::NetworkError(e)
                    }
                })?;

            let status = response.status();

            if status.is_success() {
                let api_response: AnthropicResponse = response.json().await?;
                return api_response.into_text();
            } else if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);

                if attempt >= MAX_RETRIES {
                    return Err(LLMError::RateLimitExceeded(retry_after));
                }

                // Exponential backoff with retry-after
                let wait_ms = retry_after.saturating_mul(1000).max(backoff_ms);
                warn!(wait_ms, attempt, max = MAX_RETRIES, "rate limited by API, retrying");

                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                backoff_ms *= 2;
                continue;
            } else {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(LLMError::ApiError(format!(
                    "API returned status {}: {}",
                    status, error_text
                )));
            }
        }
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn query(
        &self,
        query: ModelQuery<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, LLMError> {
        if cancel.is_cancelled() {
            return Err(LLMError::Cancelled);
        }
        self.check_rate_limit()?;

        debug!(tier = %query.tier, model = self.model_for(query.tier), "querying model");
        tokio::select! {
            _ = cancel.cancelled() => Err(LLMError::Cancelled),
            result = self.call_api(query) => result,
        }
    }
}
