//! parley-ai: chat-completions streaming client
//!
//! This crate opens streaming requests against an OpenAI-compatible
//! chat-completions endpoint and assembles the server-sent delta fragments
//! into a single cumulative text buffer.

pub mod error;
pub mod frame;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use frame::EmptyFramePolicy;
pub use providers::CompletionProvider;
pub use stream::{StreamEvent, StreamEventStream};
pub use types::*;
