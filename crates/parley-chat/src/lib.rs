//! parley-chat: Conversation state for a streaming chat client
//!
//! A [`ChatSession`] owns the conversation and reconciles streamed
//! assistant text into it. [`Chat`] runs the stream tasks for a session and
//! feeds their output back in order.

pub mod conversation;
pub mod driver;
pub mod error;
pub mod events;
pub mod handle;
pub mod session;

pub use conversation::Conversation;
pub use driver::{Chat, spawn_stream};
pub use error::{Error, Result};
pub use events::ChatEvent;
pub use handle::{Generation, StreamHandle};
pub use session::{
    ChatSession, ChatView, DEFAULT_SYSTEM_PROMPT, Phase, StreamRequest, StreamUpdate,
};
