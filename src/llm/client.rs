use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded, retry after {0}s")]
    RateLimitExceeded(u64),

    #[error("Request timeout")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Which model class answers a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    /// Small, fast model tried first
    Quick,
    /// Primary model used when the quick one fails
    Main,
}

impl ModelTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Quick => "quick",
            ModelTier::Main => "main",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One question put to a model
#[derive(Debug, Clone, Copy)]
pub struct ModelQuery<'a> {
    /// System prompt blocks, sent in order
    pub system_prompt: &'a [String],
    pub user_input: &'a str,
    pub tier: ModelTier,
    /// Generation stops at the first of these; the matched sequence is kept
    /// at the end of the returned text
    pub stop_sequences: &'a [&'a str],
}

/// Narrow "ask a question, get text back" contract.
///
/// Implementations must return [`LLMError::Cancelled`] promptly once
/// `cancel` fires.
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn query(
        &self,
        query: ModelQuery<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, LLMError>;
}
