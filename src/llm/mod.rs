pub mod anthropic;
pub mod client;

pub use anthropic::AnthropicClient;
pub use client::{LLMClient, LLMError, ModelQuery, ModelTier};
