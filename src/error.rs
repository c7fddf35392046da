use std::io;
use thiserror::Error;

// Import module-level errors for AppError
use crate::config::settings::ConfigError;
use crate::gate::verdict::VerdictParseError;
use crate::llm::client::LLMError;
use crate::shell::prefix::ResolveError;

/// Top-level application error that wraps all module-specific errors
///
/// The permission matcher and the classifier never fail, and the gate folds
/// its failures into a decision, so these only surface from setup code and
/// direct use of the lower layers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    #[error("Prefix resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Verdict error: {0}")]
    Verdict(#[from] VerdictParseError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for application-level operations
pub type AppResult<T> = std::result::Result<T, AppError>;
