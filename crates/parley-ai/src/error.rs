//! Error types for parley-ai

use thiserror::Error;

/// Result type alias using parley-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a completions endpoint
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Endpoint answered with a non-success status
    #[error("API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// The history handed to the provider cannot be sent
    #[error("Invalid history: {0}")]
    InvalidHistory(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether this error came from the transport rather than from the caller
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Api { .. } | Error::Sse(_) | Error::InvalidApiKey
        )
    }

    /// Convert an event-source failure into a readable error.
    ///
    /// Non-success responses have their body read so the caller sees the
    /// endpoint's own explanation.
    pub(crate) async fn from_event_source(error: reqwest_eventsource::Error) -> Self {
        use reqwest_eventsource::Error as SseError;

        match error {
            SseError::InvalidStatusCode(status, response) => {
                let body = response.text().await.unwrap_or_default();
                let message = extract_api_message(&body).unwrap_or(body);
                if status.as_u16() == 401 {
                    tracing::warn!("Endpoint rejected credentials: {}", message);
                }
                Error::api(status.as_u16(), message)
            }
            SseError::Transport(e) => Error::Http(e),
            other => Error::Sse(other.to_string()),
        }
    }
}

/// Pull `error.message` out of an OpenAI-style error body.
fn extract_api_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let e = Error::api(429, "Rate limit reached");
        assert_eq!(e.to_string(), "API error: Rate limit reached (status: 429)");
    }

    #[test]
    fn test_transport_classification() {
        assert!(Error::api(500, "boom").is_transport());
        assert!(Error::Sse("connection reset".into()).is_transport());
        assert!(Error::InvalidApiKey.is_transport());
        assert!(!Error::InvalidHistory("empty".into()).is_transport());
        assert!(!Error::InvalidConfig("n must be positive".into()).is_transport());
    }

    #[test]
    fn test_extract_api_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(
            extract_api_message(body).as_deref(),
            Some("Incorrect API key provided")
        );
    }

    #[test]
    fn test_extract_api_message_plain_body() {
        assert!(extract_api_message("Bad Gateway").is_none());
        assert!(extract_api_message(r#"{"detail":"nope"}"#).is_none());
    }
}
