//! Session change notifications

use serde::{Deserialize, Serialize};

use crate::handle::Generation;

/// Emitted by a [`crate::ChatSession`] after every state change.
///
/// Renderers re-read [`crate::ChatSession::view`] when one arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A user turn was appended and a stream requested
    Submitted { generation: Generation, turns: usize },

    /// The trailing assistant turn changed
    Updated { text: String },

    /// The stream finished normally
    Finished { generation: Generation },

    /// The stream failed; the session is in the failed phase
    Failed { generation: Generation, message: String },

    /// The conversation was cleared
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(ChatEvent::Failed {
            generation: 2,
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "failed", "generation": 2, "message": "boom"})
        );
    }
}
