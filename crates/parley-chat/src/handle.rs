//! Identity and cancellation for one in-flight stream.

use tokio_util::sync::CancellationToken;

/// Identifies the stream a [`crate::StreamUpdate`] came from.
pub type Generation = u64;

/// The open stream owned by a session.
///
/// Cloning the token lets the stream task observe cancellation; the
/// generation lets the session reject anything the task sent before it
/// noticed.
#[derive(Debug)]
pub struct StreamHandle {
    generation: Generation,
    cancel: CancellationToken,
}

impl StreamHandle {
    pub(crate) fn new(generation: Generation) -> Self {
        Self {
            generation,
            cancel: CancellationToken::new(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Token the stream task should watch
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether an update with `generation` belongs to this stream
    pub fn owns(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Signal the stream task to stop and drop its connection.
    pub fn cancel(&self) {
        tracing::debug!(generation = self.generation, "Cancelling stream");
        self.cancel.cancel();
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        // No stream task may outlive its handle.
        self.cancel.cancel();
    }
}
