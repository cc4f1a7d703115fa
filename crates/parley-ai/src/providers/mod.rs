//! Completion endpoint implementations

pub mod openai;

use crate::{CompletionConfig, Error, Result, StreamEventStream, Turn};
use async_trait::async_trait;

/// Trait for streaming completion endpoints
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Open one streaming request for `history`.
    ///
    /// `history` must be non-empty and end with a user turn. The returned
    /// stream yields cumulative buffers and ends with exactly one terminal
    /// event; dropping it closes the connection.
    async fn open_stream(
        &self,
        history: &[Turn],
        config: &CompletionConfig,
    ) -> Result<StreamEventStream>;
}

/// Get an API key from a provided value or the environment
pub fn get_api_key(provided: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = provided.filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }

    std::env::var(env_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or(Error::InvalidApiKey)
}
