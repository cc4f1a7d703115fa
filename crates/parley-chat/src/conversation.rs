//! The ordered transcript of a chat.

use parley_ai::{Role, Turn};

/// Ordered turns, in the exact order they are sent upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Append a turn at the tail
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Merge a cumulative assistant buffer into the tail.
    ///
    /// Replaces the trailing assistant turn with a new value, or appends one
    /// when the tail is not an assistant turn. Returns whether anything
    /// changed.
    pub fn merge_assistant(&mut self, text: &str) -> bool {
        match self.turns.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                if last.content == text {
                    return false;
                }
                *last = Turn::assistant(text);
                true
            }
            _ => {
                self.turns.push(Turn::assistant(text));
                true
            }
        }
    }

    /// Turns shown to the user: everything except system instructions
    pub fn visible(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| !t.is_system())
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
