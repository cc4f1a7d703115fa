//! TUI implementation for parley

use std::time::{Duration, Instant};

use crossterm::event::{Event, EventStream, MouseEventKind};
use futures::StreamExt;
use parley_chat::{Chat, ChatEvent, ChatSession};
use parley_tui::{
    App, Theme,
    input::{Action, event_to_action},
    widgets::{InputBox, MessageList, Spinner},
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use tokio::sync::broadcast::error::RecvError;

const KEY_HELP: &str = "Enter: send │ Ctrl+R: reset │ Ctrl+C: quit";

/// TUI application state
pub struct TuiState {
    input: InputBox,
    /// Scroll offset in lines; `usize::MAX` pins the view to the bottom
    scroll: usize,
    status: String,
    model: String,
    spinner_start: Instant,
}

impl TuiState {
    pub fn new(model: impl Into<String>) -> Self {
        let input = InputBox::new()
            .with_placeholder("Type a message...")
            .with_disabled_placeholder("Waiting for response...");

        Self {
            input,
            scroll: 0,
            status: "Ready".to_string(),
            model: model.into(),
            spinner_start: Instant::now(),
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll = usize::MAX;
    }

    /// Input stays disabled for as long as a response is loading
    pub fn sync(&mut self, session: &ChatSession) {
        self.input.set_disabled(session.is_loading());
    }

    /// React to a session notification
    pub fn handle_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Submitted { .. } => {
                self.spinner_start = Instant::now();
                self.status = "Waiting for response".to_string();
                self.scroll_to_bottom();
            }
            ChatEvent::Updated { .. } => self.scroll_to_bottom(),
            ChatEvent::Finished { .. } => {
                self.status = "Ready".to_string();
                self.scroll_to_bottom();
            }
            ChatEvent::Failed { .. } => {
                self.status = "Request failed".to_string();
                self.scroll_to_bottom();
            }
            ChatEvent::Reset => {
                self.status = "Conversation reset".to_string();
                self.scroll = 0;
            }
        }
    }

    /// Handle a key action; returns false to quit
    pub fn handle_action(&mut self, action: Action, chat: &mut Chat, width: u16) -> bool {
        match action {
            Action::Quit | Action::Interrupt => false,
            Action::Reset => {
                chat.reset();
                self.input.clear();
                true
            }
            Action::Submit => {
                if chat.session().is_loading() || self.input.content().trim().is_empty() {
                    return true;
                }
                chat.session_mut().set_input(self.input.content());
                match chat.submit_input() {
                    Ok(_) => self.input.clear(),
                    Err(e) if e.is_rejected_input() => {}
                    Err(e) => self.status = format!("Error: {}", e),
                }
                true
            }
            Action::PageUp => {
                self.scroll = self.scroll.saturating_sub(10);
                true
            }
            Action::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                true
            }
            Action::Up => {
                self.scroll = self.scroll.saturating_sub(1);
                true
            }
            Action::Down => {
                self.scroll = self.scroll.saturating_add(1);
                true
            }
            _ => {
                self.input.handle_action(&action, width);
                true
            }
        }
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame, theme: &Theme, session: &ChatSession) {
        // Layout: messages (flex), status bar (1), input (3)
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.render_messages(frame, chunks[0], theme, session);
        self.render_status(frame, chunks[1], theme, session);
        self.input.render(chunks[2], frame.buffer_mut(), theme);
    }

    fn render_messages(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        theme: &Theme,
        session: &ChatSession,
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_style())
            .title(format!(" parley │ {} ", self.model));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let view = session.view();
        if inner.height == 0 || (view.turns.is_empty() && view.error.is_none()) {
            frame.render_widget(welcome(theme, &self.model), inner);
            return;
        }

        let list = MessageList::new(&view.turns, theme)
            .streaming(view.is_loading)
            .error(view.error.as_deref());
        let content_height = list.content_height(inner.width as usize);
        let max_scroll = content_height.saturating_sub(inner.height as usize);
        self.scroll = self.scroll.min(max_scroll);

        frame.render_widget(list.scroll(self.scroll), inner);

        if content_height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");

            let mut scrollbar_state = ScrollbarState::new(content_height)
                .position(self.scroll)
                .viewport_content_length(inner.height as usize);

            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, theme: &Theme, session: &ChatSession) {
        if session.is_loading() {
            let spinner = Spinner::loading(theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        let style = if session.last_error().is_some() {
            theme.error_style()
        } else {
            theme.dim_style()
        };
        let left = format!("{} │ {}", self.model, self.status);
        let left_width = left.chars().count();
        let right_width = KEY_HELP.chars().count();
        let available = area.width as usize;

        let line = if left_width + right_width + 2 <= available {
            let spacing = available - left_width - right_width;
            Line::from(vec![
                Span::styled(left, style),
                Span::raw(" ".repeat(spacing)),
                Span::styled(KEY_HELP, theme.dim_style()),
            ])
        } else {
            Line::from(Span::styled(left, style))
        };

        frame.render_widget(Paragraph::new(line), area);
    }
}

fn welcome(theme: &Theme, model: &str) -> Paragraph<'static> {
    let key = |keys: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(keys, theme.accent_style()),
            Span::styled(what, theme.base_style()),
        ])
    };

    Paragraph::new(vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  parley", theme.user_header()),
            Span::styled(" - streaming chat", theme.dim_style()),
        ]),
        Line::from(""),
        Line::from(Span::styled(format!("  Model: {}", model), theme.dim_style())),
        Line::from(""),
        key("    Enter     ", "Send message"),
        key("    Ctrl+R    ", "Reset conversation"),
        key("    Ctrl+C    ", "Quit"),
        key("    PgUp/Dn   ", "Scroll history"),
        Line::from(""),
        Line::from(Span::styled(
            "  Type a message to get started...",
            theme.dim_style(),
        )),
    ])
}

/// Run the TUI application
pub async fn run_tui(chat: &mut Chat, theme: Theme) -> anyhow::Result<()> {
    let mut app = App::new()?.with_theme(theme);
    let mut state = TuiState::new(chat.config().model.clone());
    let mut notifications = chat.subscribe();
    let mut event_stream = EventStream::new();

    // 80ms keeps the spinner smooth
    let mut tick_interval = tokio::time::interval(Duration::from_millis(80));

    loop {
        state.sync(chat.session());
        app.draw(|frame, theme| state.render(frame, theme, chat.session()))?;
        let area_width = app.width()?;

        tokio::select! {
            biased;

            event = notifications.recv() => match event {
                Ok(event) => state.handle_chat_event(event),
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!("Skipped {} session notifications", n);
                }
                Err(RecvError::Closed) => break,
            },

            _ = chat.next_update() => {}

            event = event_stream.next() => match event {
                Some(Ok(Event::Mouse(mouse))) => match mouse.kind {
                    MouseEventKind::ScrollUp => {
                        state.scroll = state.scroll.saturating_sub(3);
                    }
                    MouseEventKind::ScrollDown => {
                        state.scroll = state.scroll.saturating_add(3);
                    }
                    _ => {}
                },
                Some(Ok(event)) => {
                    if let Some(action) = event_to_action(event) {
                        if !state.handle_action(action, chat, area_width) {
                            break;
                        }
                    }
                }
                Some(Err(e)) => return Err(anyhow::anyhow!("Event error: {}", e)),
                None => break,
            },

            _ = tick_interval.tick() => {}
        }
    }

    chat.reset();
    Ok(())
}
