//! Frame parsing and cumulative buffer assembly
//!
//! A frame is the payload of one server-sent `message` event. It usually
//! holds a single JSON chunk, but upstream proxies may concatenate several
//! chunks separated by `data:` tokens, so every frame is scanned for all
//! embedded objects.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentinel some servers send as the last frame
pub const DONE_SENTINEL: &str = "[DONE]";

/// Matches when the text after a closing brace is a framing boundary:
/// another `data:` token or the end of the payload.
static FRAME_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:data:|$)").expect("valid frame boundary pattern"));

/// What to do with a frame that yields zero parseable objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyFramePolicy {
    /// Treat the frame as the end-of-stream signal and close the connection
    #[default]
    EndStream,
    /// Only the `[DONE]` sentinel ends the stream; other empty frames are skipped
    SkipUnlessDone,
}

/// Result of feeding one frame to the [`Ingestor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStep {
    /// At least one fragment was appended; carries the full buffer
    Buffer(String),
    /// Nothing to report (objects without content, or a skipped frame)
    Unchanged,
    /// The stream is over
    End,
}

/// Accumulator for one in-flight response
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    pub buffered_text: String,
    pub is_open: bool,
}

/// Turns frames into a growing text buffer
#[derive(Debug)]
pub struct Ingestor {
    state: StreamState,
    policy: EmptyFramePolicy,
}

impl Ingestor {
    /// Create an ingestor with an empty, open buffer
    pub fn new(policy: EmptyFramePolicy) -> Self {
        Self {
            state: StreamState {
                buffered_text: String::new(),
                is_open: true,
            },
            policy,
        }
    }

    /// Current cumulative text
    pub fn text(&self) -> &str {
        &self.state.buffered_text
    }

    /// Whether more frames will be accepted
    pub fn is_open(&self) -> bool {
        self.state.is_open
    }

    /// Stop accepting frames
    pub fn close(&mut self) {
        self.state.is_open = false;
    }

    /// Discard the buffer and reopen for a new request
    pub fn reset(&mut self) {
        self.state.buffered_text.clear();
        self.state.is_open = true;
    }

    /// Consume the ingestor, returning the final text
    pub fn into_text(self) -> String {
        self.state.buffered_text
    }

    /// Apply one frame to the buffer
    pub fn ingest(&mut self, frame: &str) -> FrameStep {
        if !self.state.is_open {
            return FrameStep::End;
        }

        let mut parsed = 0usize;
        let mut appended = false;

        for candidate in extract_objects(frame) {
            match parse_fragment(candidate) {
                Ok(fragment) => {
                    parsed += 1;
                    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
                        self.state.buffered_text.push_str(&fragment);
                        appended = true;
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed object in frame: {}", e);
                }
            }
        }

        if parsed == 0 {
            return self.on_empty_frame(frame);
        }

        if appended {
            FrameStep::Buffer(self.state.buffered_text.clone())
        } else {
            FrameStep::Unchanged
        }
    }

    fn on_empty_frame(&mut self, frame: &str) -> FrameStep {
        let is_done = is_done_sentinel(frame);
        match self.policy {
            EmptyFramePolicy::EndStream => {
                tracing::debug!(done = is_done, "Frame carried no objects, ending stream");
                self.close();
                FrameStep::End
            }
            EmptyFramePolicy::SkipUnlessDone if is_done => {
                self.close();
                FrameStep::End
            }
            EmptyFramePolicy::SkipUnlessDone => {
                tracing::debug!("Skipping frame without objects: {:?}", frame);
                FrameStep::Unchanged
            }
        }
    }
}

fn is_done_sentinel(frame: &str) -> bool {
    let frame = frame.trim();
    let frame = frame.strip_prefix("data:").unwrap_or(frame).trim();
    frame == DONE_SENTINEL
}

/// Find every brace-delimited JSON candidate in a frame, in order.
///
/// A candidate runs from a `{` to a `}` at least one character later that
/// sits right before a `data:` token or the end of the frame. The first such
/// `}` that closes valid JSON wins, so content containing `} data:` does not
/// cut an object short. When no boundary closes valid JSON the first one is
/// used and the candidate is left for the parser to reject.
pub fn extract_objects(frame: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut pos = 0;

    while let Some(offset) = frame[pos..].find('{') {
        let start = pos + offset;
        match find_object_end(frame, start) {
            Some(end) => {
                objects.push(&frame[start..end]);
                pos = end;
            }
            None => break,
        }
    }

    objects
}

/// Exclusive end of the candidate opened at `start`, if any.
fn find_object_end(frame: &str, start: usize) -> Option<usize> {
    let mut ends = boundary_ends(frame, start);
    let first = ends.next()?;
    if is_json(&frame[start..first]) {
        return Some(first);
    }
    Some(ends.find(|&end| is_json(&frame[start..end])).unwrap_or(first))
}

/// Every `}` after `start` that is followed by a framing boundary.
fn boundary_ends(frame: &str, start: usize) -> impl Iterator<Item = usize> + '_ {
    let body_start = start + 1;
    frame[body_start..]
        .char_indices()
        .skip(1)
        .filter(|(_, c)| *c == '}')
        .map(move |(i, _)| body_start + i + 1)
        .filter(move |&end| FRAME_BOUNDARY.is_match(&frame[end..]))
}

fn is_json(candidate: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(candidate).is_ok()
}

/// Read `choices[0].delta.content` from one candidate.
///
/// `Ok(None)` means the object parsed but carried no content fragment.
pub fn parse_fragment(candidate: &str) -> serde_json::Result<Option<String>> {
    let chunk: StreamChunk = serde_json::from_str(candidate)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content))
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
