//! Streaming event types and the frame-to-event pipeline

use std::pin::Pin;

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use crate::error::Result;
use crate::frame::{EmptyFramePolicy, FrameStep, Ingestor};

/// Events emitted while a response streams in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The request was accepted and frames may follow
    Start,
    /// The cumulative response text after a frame added to it
    Buffer { text: String },
    /// The stream finished; carries the final text
    Done { text: String },
    /// The stream failed
    Error { message: String },
}

impl StreamEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// A stream of response events
pub type StreamEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// A stream of raw frame payloads
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Drive an [`Ingestor`] over a stream of frames.
///
/// Emits `Start`, one `Buffer` per frame that grew the text, then exactly
/// one terminal event. The frame source is dropped as soon as the stream
/// ends, which closes the underlying connection.
pub fn ingest_frames(mut frames: FrameStream, policy: EmptyFramePolicy) -> StreamEventStream {
    Box::pin(stream! {
        let mut ingestor = Ingestor::new(policy);
        yield StreamEvent::Start;

        while let Some(frame) = frames.next().await {
            match frame {
                Ok(data) => match ingestor.ingest(&data) {
                    FrameStep::Buffer(text) => {
                        yield StreamEvent::Buffer { text };
                    }
                    FrameStep::Unchanged => {}
                    FrameStep::End => break,
                },
                Err(e) => {
                    tracing::warn!("Stream failed after {} bytes: {}", ingestor.text().len(), e);
                    yield StreamEvent::Error { message: e.to_string() };
                    return;
                }
            }
        }

        drop(frames);
        yield StreamEvent::Done { text: ingestor.into_text() };
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn frames(items: Vec<Result<String>>) -> FrameStream {
        Box::pin(futures::stream::iter(items))
    }

    fn chunk(content: &str) -> String {
        serde_json::json!({"choices": [{"delta": {"content": content}}]}).to_string()
    }

    async fn collect(stream: StreamEventStream) -> Vec<StreamEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_emits_cumulative_buffers() {
        let events = collect(ingest_frames(
            frames(vec![Ok(chunk("4")), Ok(chunk(" is the answer.")), Ok("[DONE]".into())]),
            EmptyFramePolicy::EndStream,
        ))
        .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Start,
                StreamEvent::Buffer { text: "4".into() },
                StreamEvent::Buffer { text: "4 is the answer.".into() },
                StreamEvent::Done { text: "4 is the answer.".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_stops_reading_after_end_frame() {
        let events = collect(ingest_frames(
            frames(vec![Ok(chunk("a")), Ok("[DONE]".into()), Ok(chunk("never"))]),
            EmptyFramePolicy::EndStream,
        ))
        .await;

        assert_eq!(events.last(), Some(&StreamEvent::Done { text: "a".into() }));
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Buffer { text } if text.contains("never"))));
    }

    #[tokio::test]
    async fn test_source_exhaustion_is_done() {
        let events = collect(ingest_frames(
            frames(vec![Ok(chunk("tail"))]),
            EmptyFramePolicy::EndStream,
        ))
        .await;
        assert_eq!(events.last(), Some(&StreamEvent::Done { text: "tail".into() }));
    }

    #[tokio::test]
    async fn test_frames_without_content_emit_nothing() {
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#.to_string();
        let events = collect(ingest_frames(
            frames(vec![Ok(role_only), Ok(chunk("x")), Ok("[DONE]".into())]),
            EmptyFramePolicy::EndStream,
        ))
        .await;
        let buffers = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Buffer { .. }))
            .count();
        assert_eq!(buffers, 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_terminal() {
        let events = collect(ingest_frames(
            frames(vec![
                Ok(chunk("par")),
                Err(Error::Sse("connection reset".into())),
                Ok(chunk("never")),
            ]),
            EmptyFramePolicy::EndStream,
        ))
        .await;

        assert_eq!(events.len(), 3);
        match &events[2] {
            StreamEvent::Error { message } => assert!(message.contains("connection reset")),
            other => panic!("expected error, got {:?}", other),
        }
        assert!(events[2].is_terminal());
    }

    #[test]
    fn test_event_serialization_tag() {
        let json = serde_json::to_value(StreamEvent::Buffer { text: "hi".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "buffer", "text": "hi"}));
    }
}
