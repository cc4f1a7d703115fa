//! Core types for chat transcripts

use serde::{Deserialize, Serialize};

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Get the role as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in the conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    /// Create a turn
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system instruction turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Model identifier (e.g., "gpt-4")
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Number of choices to generate; only the first one is read
    pub n: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            max_tokens: 600,
            temperature: 0.5,
            n: 1,
        }
    }
}

impl CompletionConfig {
    /// Check the parameters before they are sent upstream
    pub fn validate(&self) -> crate::Result<()> {
        if self.model.trim().is_empty() {
            return Err(crate::Error::InvalidConfig("model must not be empty".into()));
        }
        if self.max_tokens == 0 {
            return Err(crate::Error::InvalidConfig(
                "max_tokens must be positive".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(crate::Error::InvalidConfig(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.n == 0 {
            return Err(crate::Error::InvalidConfig("n must be positive".into()));
        }
        Ok(())
    }
}

/// Check that a history can be sent: non-empty and ending in a user turn.
pub fn validate_history(history: &[Turn]) -> crate::Result<()> {
    match history.last() {
        None => Err(crate::Error::InvalidHistory("history is empty".into())),
        Some(turn) if turn.role != Role::User => Err(crate::Error::InvalidHistory(format!(
            "history must end with a user turn, found {}",
            turn.role.as_str()
        ))),
        Some(_) => Ok(()),
    }
}
