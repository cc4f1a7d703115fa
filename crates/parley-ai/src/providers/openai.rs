//! OpenAI-compatible Chat Completions provider

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::Serialize;

use crate::{
    error::{Error, Result},
    frame::EmptyFramePolicy,
    providers::CompletionProvider,
    stream::{FrameStream, StreamEventStream, ingest_frames},
    types::{CompletionConfig, Turn, validate_history},
};

/// Default endpoint base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the bearer token
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Chat Completions client
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    policy: EmptyFramePolicy,
}

impl OpenAIProvider {
    /// Create a new provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            policy: EmptyFramePolicy::default(),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = super::get_api_key(None, API_KEY_ENV)?;
        Ok(Self::new(api_key))
    }

    /// Point at a different OpenAI-compatible server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Choose how frames without objects are treated
    pub fn with_empty_frame_policy(mut self, policy: EmptyFramePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Full URL of the completions endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request<'a>(
        &self,
        history: &'a [Turn],
        config: &'a CompletionConfig,
    ) -> Result<CompletionRequest<'a>> {
        validate_history(history)?;
        config.validate()?;

        Ok(CompletionRequest {
            model: &config.model,
            messages: history,
            max_tokens: config.max_tokens,
            n: config.n,
            temperature: config.temperature,
            stream: true,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn open_stream(
        &self,
        history: &[Turn],
        config: &CompletionConfig,
    ) -> Result<StreamEventStream> {
        let request = self.build_request(history, config)?;
        let url = self.endpoint();

        tracing::debug!(
            model = %config.model,
            turns = history.len(),
            "Opening completion stream at {}",
            url
        );

        let request_builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(ingest_frames(frames_from(event_source), self.policy))
    }
}

/// Adapt an event source into a stream of frame payloads.
fn frames_from(mut event_source: EventSource) -> FrameStream {
    Box::pin(stream! {
        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {
                    tracing::debug!("Completion stream opened");
                }
                Ok(Event::Message(msg)) => {
                    yield Ok(msg.data);
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    event_source.close();
                    yield Err(Error::from_event_source(e).await);
                    return;
                }
            }
        }
        event_source.close();
    })
}

// Request types

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    max_tokens: u32,
    n: u32,
    temperature: f32,
    stream: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let provider = OpenAIProvider::new("sk-test");
        let history = vec![
            Turn::system("You are a chat bot."),
            Turn::user("What is 2+2?"),
        ];
        let config = CompletionConfig::default();
        let request = provider.build_request(&history, &config).unwrap();

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4",
                "messages": [
                    {"role": "system", "content": "You are a chat bot."},
                    {"role": "user", "content": "What is 2+2?"}
                ],
                "max_tokens": 600,
                "n": 1,
                "temperature": 0.5,
                "stream": true
            })
        );
    }

    #[test]
    fn test_rejects_history_not_ending_in_user() {
        let provider = OpenAIProvider::new("sk-test");
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];
        let config = CompletionConfig::default();
        let result = provider.build_request(&history, &config);
        assert!(matches!(result, Err(Error::InvalidHistory(_))));
    }

    #[test]
    fn test_rejects_empty_history() {
        let provider = OpenAIProvider::new("sk-test");
        let config = CompletionConfig::default();
        let result = provider.build_request(&[], &config);
        assert!(matches!(result, Err(Error::InvalidHistory(_))));
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let provider = OpenAIProvider::new("sk-test").with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_open_stream_validates_before_network() {
        let provider = OpenAIProvider::new("sk-test").with_base_url("http://127.0.0.1:9");
        let result = provider
            .open_stream(&[Turn::assistant("orphan")], &CompletionConfig::default())
            .await;
        assert!(matches!(result, Err(Error::InvalidHistory(_))));
    }
}
