//! Runs stream tasks for a session and feeds their output back in order.

use std::sync::Arc;

use futures::StreamExt;
use parley_ai::{CompletionConfig, CompletionProvider, StreamEvent};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use crate::{
    error::{Error, Result},
    events::ChatEvent,
    handle::Generation,
    session::{ChatSession, Phase, StreamRequest, StreamUpdate},
};

/// A session wired to a completion provider.
///
/// Each submission spawns one stream task. Its events come back through a
/// single channel, so they are applied in the order the task produced them.
pub struct Chat {
    session: ChatSession,
    provider: Arc<dyn CompletionProvider>,
    config: CompletionConfig,
    updates_tx: mpsc::UnboundedSender<StreamUpdate>,
    updates_rx: mpsc::UnboundedReceiver<StreamUpdate>,
}

impl Chat {
    pub fn new(
        session: ChatSession,
        provider: Arc<dyn CompletionProvider>,
        config: CompletionConfig,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            session,
            provider,
            config,
            updates_tx,
            updates_rx,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ChatSession {
        &mut self.session
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Subscribe to session notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.session.subscribe()
    }

    /// Submit `text` and start streaming the reply
    pub fn submit(&mut self, text: &str) -> Result<Generation> {
        let request = self.session.submit(text)?;
        let generation = request.generation;
        spawn_stream(
            Arc::clone(&self.provider),
            self.config.clone(),
            request,
            self.updates_tx.clone(),
        );
        Ok(generation)
    }

    /// Submit whatever is in the session's input buffer
    pub fn submit_input(&mut self) -> Result<Generation> {
        let text = self.session.input().to_string();
        self.submit(&text)
    }

    /// Cancel the open stream and clear the conversation
    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Wait for the next update from any stream task and apply it.
    ///
    /// Returns whether the session changed. Stale updates are consumed and
    /// report `false`. Never resolves while no stream is sending.
    pub async fn next_update(&mut self) -> bool {
        match self.updates_rx.recv().await {
            Some(update) => self.session.apply(update),
            None => false,
        }
    }

    /// Apply updates until the session stops loading.
    ///
    /// Returns the stream's error message if the request failed.
    pub async fn wait_idle(&mut self) -> Result<()> {
        while self.session.is_loading() {
            self.next_update().await;
        }
        match self.session.phase() {
            Phase::Failed(message) => Err(Error::Stream(message.clone())),
            _ => Ok(()),
        }
    }

    /// Submit and wait for the complete reply
    pub async fn ask(&mut self, text: &str) -> Result<String> {
        self.submit(text)?;
        self.wait_idle().await?;
        Ok(self
            .session
            .conversation()
            .last()
            .filter(|t| t.is_assistant())
            .map(|t| t.content.clone())
            .unwrap_or_default())
    }
}

/// Spawn a task that opens a stream for `request` and forwards its events.
///
/// The task stops as soon as the request's token is cancelled, dropping the
/// connection. A failure to open the stream is forwarded as an error event.
pub fn spawn_stream(
    provider: Arc<dyn CompletionProvider>,
    config: CompletionConfig,
    request: StreamRequest,
    tx: mpsc::UnboundedSender<StreamUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(run_stream(provider, config, request, tx))
}

async fn run_stream(
    provider: Arc<dyn CompletionProvider>,
    config: CompletionConfig,
    request: StreamRequest,
    tx: mpsc::UnboundedSender<StreamUpdate>,
) {
    let StreamRequest {
        generation,
        history,
        cancel,
    } = request;

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(generation, "Stream cancelled before opening");
            return;
        }
        result = provider.open_stream(&history, &config) => result,
    };

    let mut events = match opened {
        Ok(events) => events,
        Err(e) => {
            if e.is_transport() {
                tracing::warn!(generation, "Failed to open stream: {}", e);
            } else {
                tracing::error!(generation, "Rejected stream request: {}", e);
            }
            forward(
                &tx,
                generation,
                StreamEvent::Error {
                    message: e.to_string(),
                },
            );
            return;
        }
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(generation, "Stream cancelled");
                break;
            }
            event = events.next() => match event {
                Some(event) => {
                    let terminal = event.is_terminal();
                    if !forward(&tx, generation, event) || terminal {
                        break;
                    }
                }
                None => {
                    forward(
                        &tx,
                        generation,
                        StreamEvent::Error {
                            message: "Stream closed without completing".to_string(),
                        },
                    );
                    break;
                }
            }
        }
    }
}

fn forward(
    tx: &mpsc::UnboundedSender<StreamUpdate>,
    generation: Generation,
    event: StreamEvent,
) -> bool {
    tx.send(StreamUpdate { generation, event }).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_ai::{StreamEventStream, Turn};
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    enum Script {
        Events(Vec<StreamEvent>),
        /// Emit events, then hold the stream open until dropped
        Hang(Vec<StreamEvent>),
        Fail(u16, String),
    }

    struct MockProvider {
        scripts: Mutex<Vec<Script>>,
        histories: Mutex<Vec<Vec<Turn>>>,
        dropped: Arc<AtomicBool>,
    }

    impl MockProvider {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts),
                histories: Mutex::new(Vec::new()),
                dropped: Arc::new(AtomicBool::new(false)),
            })
        }
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CompletionProvider for MockProvider {
        async fn open_stream(
            &self,
            history: &[Turn],
            _config: &CompletionConfig,
        ) -> parley_ai::Result<StreamEventStream> {
            self.histories.lock().unwrap().push(history.to_vec());
            let script = {
                let mut scripts = self.scripts.lock().unwrap();
                if scripts.is_empty() {
                    Script::Events(vec![StreamEvent::Done {
                        text: String::new(),
                    }])
                } else {
                    scripts.remove(0)
                }
            };

            let flag = DropFlag(Arc::clone(&self.dropped));
            let stream: StreamEventStream = match script {
                Script::Fail(status, message) => {
                    return Err(parley_ai::Error::api(status, message));
                }
                Script::Events(events) => Box::pin(async_stream::stream! {
                    let _flag = flag;
                    for event in events {
                        yield event;
                    }
                }),
                Script::Hang(events) => Box::pin(async_stream::stream! {
                    let _flag = flag;
                    for event in events {
                        yield event;
                    }
                    futures::future::pending::<()>().await;
                }),
            };
            Ok(stream)
        }
    }

    fn buffer(text: &str) -> StreamEvent {
        StreamEvent::Buffer { text: text.into() }
    }

    fn done(text: &str) -> StreamEvent {
        StreamEvent::Done { text: text.into() }
    }

    fn chat(provider: Arc<MockProvider>) -> Chat {
        Chat::new(ChatSession::default(), provider, CompletionConfig::default())
    }

    #[tokio::test]
    async fn test_streams_reply_into_conversation() {
        let provider = MockProvider::new(vec![Script::Events(vec![
            StreamEvent::Start,
            buffer("4"),
            buffer("4 is the answer."),
            done("4 is the answer."),
        ])]);
        let mut chat = chat(Arc::clone(&provider));

        let answer = chat.ask("What is 2+2?").await.unwrap();
        assert_eq!(answer, "4 is the answer.");
        assert!(!chat.session().is_loading());
        assert_eq!(
            chat.session().conversation().turns(),
            &[
                Turn::system(crate::DEFAULT_SYSTEM_PROMPT),
                Turn::user("What is 2+2?"),
                Turn::assistant("4 is the answer."),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_request_sends_full_history() {
        let provider = MockProvider::new(vec![
            Script::Events(vec![buffer("hello"), done("hello")]),
            Script::Events(vec![buffer("fine"), done("fine")]),
        ]);
        let mut chat = chat(Arc::clone(&provider));

        chat.ask("hi").await.unwrap();
        let mut expected = chat.session().conversation().turns().to_vec();
        expected.push(Turn::user("how are you?"));
        chat.ask("how are you?").await.unwrap();

        let histories = provider.histories.lock().unwrap();
        assert_eq!(histories.len(), 2);
        assert_eq!(histories[0].len(), 2);
        assert_eq!(histories[1], expected);
        assert_eq!(histories[1][2], Turn::assistant("hello"));
    }

    #[tokio::test]
    async fn test_updates_applied_in_emitted_order() {
        let mut events = Vec::new();
        let mut text = String::new();
        for i in 0..50 {
            text.push_str(&format!("{i} "));
            events.push(buffer(&text));
        }
        events.push(done(&text));
        let provider = MockProvider::new(vec![Script::Events(events.clone())]);
        let mut chat = chat(provider);
        let mut rx = chat.subscribe();

        chat.submit("count").unwrap();
        chat.wait_idle().await.unwrap();

        let mut updates = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ChatEvent::Updated { text } = event {
                updates.push(text);
            }
        }
        let emitted: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Buffer { text } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(updates, emitted);
        assert_eq!(
            chat.session().conversation().last(),
            Some(&Turn::assistant(text))
        );
    }

    #[tokio::test]
    async fn test_open_failure_surfaces_error() {
        let provider = MockProvider::new(vec![Script::Fail(503, "overloaded".into())]);
        let mut chat = chat(provider);

        chat.submit("q").unwrap();
        let err = chat.wait_idle().await.unwrap_err();
        assert!(matches!(err, Error::Stream(ref m) if m.contains("overloaded")));
        assert!(!chat.session().is_loading());
        assert!(chat.session().view().error.is_some());
    }

    #[tokio::test]
    async fn test_stream_closing_without_done_fails() {
        let provider = MockProvider::new(vec![Script::Events(vec![buffer("half")])]);
        let mut chat = chat(provider);

        chat.submit("q").unwrap();
        assert!(chat.wait_idle().await.is_err());
        assert_eq!(
            chat.session().conversation().last(),
            Some(&Turn::assistant("half"))
        );
    }

    #[tokio::test]
    async fn test_reset_mid_stream_stops_task() {
        let provider = MockProvider::new(vec![Script::Hang(vec![
            StreamEvent::Start,
            buffer("partial"),
        ])]);
        let mut chat = chat(Arc::clone(&provider));

        chat.submit("q").unwrap();
        while chat.session().conversation().last() != Some(&Turn::assistant("partial")) {
            chat.next_update().await;
        }
        assert!(chat.session().is_loading());

        chat.reset();
        assert!(chat.session().conversation().is_empty());
        assert!(!chat.session().is_loading());

        tokio::time::timeout(Duration::from_secs(1), async {
            while !provider.dropped.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("stream task kept running after reset");
        assert!(chat.session().conversation().is_empty());
    }

    #[tokio::test]
    async fn test_submit_while_streaming_rejected() {
        let provider = MockProvider::new(vec![Script::Hang(vec![buffer("slow")])]);
        let mut chat = chat(provider);

        chat.submit("first").unwrap();
        let err = chat.submit("second").unwrap_err();
        assert!(err.is_rejected_input());
        chat.reset();
    }

    #[tokio::test]
    async fn test_new_submission_after_reset_ignores_old_stream() {
        let provider = MockProvider::new(vec![
            Script::Hang(vec![buffer("old"), buffer("old and more")]),
            Script::Events(vec![buffer("new"), done("new")]),
        ]);
        let mut chat = chat(Arc::clone(&provider));

        chat.submit("first").unwrap();
        while chat.session().conversation().last() != Some(&Turn::assistant("old")) {
            chat.next_update().await;
        }
        chat.reset();
        chat.submit("second").unwrap();
        tokio::time::timeout(Duration::from_secs(2), chat.wait_idle())
            .await
            .expect("second request never finished")
            .unwrap();

        let visible: Vec<_> = chat.session().visible_turns().cloned().collect();
        assert_eq!(visible, vec![Turn::user("second"), Turn::assistant("new")]);
        assert_eq!(provider.histories.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_before_stream_opens_skips_provider() {
        let provider = MockProvider::new(vec![Script::Events(vec![buffer("new"), done("new")])]);
        let mut chat = chat(Arc::clone(&provider));

        chat.submit("first").unwrap();
        chat.reset();
        chat.submit("second").unwrap();
        tokio::time::timeout(Duration::from_secs(2), chat.wait_idle())
            .await
            .expect("second request never finished")
            .unwrap();

        assert_eq!(provider.histories.lock().unwrap().len(), 1);
        assert_eq!(
            chat.session().conversation().last(),
            Some(&Turn::assistant("new"))
        );
    }
}
