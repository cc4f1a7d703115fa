//! Chat session state: the conversation, its phase, and the open stream.

use parley_ai::{StreamEvent, Turn};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    conversation::Conversation,
    error::{Error, Result},
    events::ChatEvent,
    handle::{Generation, StreamHandle},
};

/// Instruction prepended to every new conversation
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a chat bot. Please return all responses in Markdown.";

/// Where a session is in its request cycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    /// No request in flight
    #[default]
    Idle,
    /// Request sent, nothing received yet
    AwaitingFirstDelta,
    /// Buffers are arriving
    Streaming,
    /// The last request failed; accepts new submissions like `Idle`
    Failed(String),
}

impl Phase {
    /// Whether the UI should show a loading indicator and block input
    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::AwaitingFirstDelta | Phase::Streaming)
    }
}

/// Everything a stream task needs to open and run one request
#[derive(Debug)]
pub struct StreamRequest {
    pub generation: Generation,
    pub history: Vec<Turn>,
    pub cancel: CancellationToken,
}

/// A stream event tagged with the generation that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUpdate {
    pub generation: Generation,
    pub event: StreamEvent,
}

/// Snapshot handed to renderers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    pub turns: Vec<Turn>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Owns the conversation and reconciles stream output into it.
pub struct ChatSession {
    conversation: Conversation,
    phase: Phase,
    /// Pending input text not yet submitted
    input: String,
    stream: Option<StreamHandle>,
    last_generation: Generation,
    system_prompt: String,
    event_tx: broadcast::Sender<ChatEvent>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl ChatSession {
    /// Create an empty session
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            conversation: Conversation::new(),
            phase: Phase::Idle,
            input: String::new(),
            stream: None,
            last_generation: 0,
            system_prompt: system_prompt.into(),
            event_tx,
        }
    }

    /// Subscribe to state-change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase.is_loading()
    }

    /// Message of the last failed request, if the session is in `Failed`
    pub fn last_error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Whether `submit` would accept the pending input
    pub fn can_submit(&self) -> bool {
        self.stream.is_none() && !self.input.trim().is_empty()
    }

    /// Turns to render: everything except system instructions, in order
    pub fn visible_turns(&self) -> impl Iterator<Item = &Turn> {
        self.conversation.visible()
    }

    pub fn view(&self) -> ChatView {
        ChatView {
            turns: self.visible_turns().cloned().collect(),
            is_loading: self.is_loading(),
            error: self.last_error().map(str::to_string),
        }
    }

    /// Submit the pending input text
    pub fn submit_input(&mut self) -> Result<StreamRequest> {
        let text = self.input.clone();
        self.submit(&text)
    }

    /// Append a user turn and open a new stream generation.
    ///
    /// The first submission of a conversation also prepends the system
    /// instruction. The returned request carries the full history.
    pub fn submit(&mut self, text: &str) -> Result<StreamRequest> {
        if self.stream.is_some() {
            return Err(Error::StreamOpen);
        }
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }

        if self.conversation.is_empty() {
            self.conversation.push(Turn::system(self.system_prompt.clone()));
        }
        self.conversation.push(Turn::user(text));
        self.input.clear();

        self.last_generation += 1;
        let generation = self.last_generation;
        let handle = StreamHandle::new(generation);
        let cancel = handle.cancel_token();
        self.stream = Some(handle);
        self.phase = Phase::AwaitingFirstDelta;

        tracing::debug!(generation, turns = self.conversation.len(), "Submitted user turn");
        let _ = self.event_tx.send(ChatEvent::Submitted {
            generation,
            turns: self.conversation.len(),
        });

        Ok(StreamRequest {
            generation,
            history: self.conversation.turns().to_vec(),
            cancel,
        })
    }

    /// Merge the full buffered text of the current response.
    ///
    /// Safe to call repeatedly with growing text, or once with the final
    /// text. Empty text is ignored. Returns whether the conversation changed.
    pub fn on_delta(&mut self, full_text: &str) -> bool {
        if full_text.is_empty() {
            return false;
        }
        if self.stream.is_some() {
            self.phase = Phase::Streaming;
        }
        if !self.conversation.merge_assistant(full_text) {
            return false;
        }
        let _ = self.event_tx.send(ChatEvent::Updated {
            text: full_text.to_string(),
        });
        true
    }

    /// Apply an update from a stream task.
    ///
    /// Updates from any generation other than the open stream are dropped.
    /// Returns whether the session changed.
    pub fn apply(&mut self, update: StreamUpdate) -> bool {
        let StreamUpdate { generation, event } = update;
        if !self.stream.as_ref().is_some_and(|s| s.owns(generation)) {
            tracing::debug!(generation, "Dropping update from stale stream");
            return false;
        }

        match event {
            StreamEvent::Start => false,
            StreamEvent::Buffer { text } => {
                let was_waiting = self.phase == Phase::AwaitingFirstDelta;
                self.on_delta(&text) || (was_waiting && self.phase == Phase::Streaming)
            }
            StreamEvent::Done { text } => {
                self.on_delta(&text);
                self.stream = None;
                self.phase = Phase::Idle;
                tracing::debug!(generation, "Stream finished");
                let _ = self.event_tx.send(ChatEvent::Finished { generation });
                true
            }
            StreamEvent::Error { message } => {
                self.stream = None;
                tracing::warn!(generation, "Stream failed: {}", message);
                self.phase = Phase::Failed(message.clone());
                let _ = self.event_tx.send(ChatEvent::Failed {
                    generation,
                    message,
                });
                true
            }
        }
    }

    /// Cancel any open stream and discard the whole conversation.
    pub fn reset(&mut self) {
        if let Some(handle) = self.stream.take() {
            handle.cancel();
        }
        self.conversation.clear();
        self.input.clear();
        self.phase = Phase::Idle;
        let _ = self.event_tx.send(ChatEvent::Reset);
    }
}
