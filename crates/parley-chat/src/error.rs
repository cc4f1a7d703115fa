//! Error types for parley-chat

use thiserror::Error;

/// Result type alias using parley-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a chat session
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the completions layer
    #[error(transparent)]
    Ai(#[from] parley_ai::Error),

    /// Submitted text was empty
    #[error("Nothing to submit")]
    EmptyInput,

    /// A response is still streaming
    #[error("A response is still streaming")]
    StreamOpen,

    /// The stream ended with an error
    #[error("Stream failed: {0}")]
    Stream(String),
}

impl Error {
    /// Whether the caller can fix this by changing what they submit
    pub fn is_rejected_input(&self) -> bool {
        matches!(self, Error::EmptyInput | Error::StreamOpen)
    }
}
