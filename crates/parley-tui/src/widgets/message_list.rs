//! Message list widget for displaying the chat transcript

use crate::theme::Theme;
use crate::widgets::markdown::render_markdown;
use parley_ai::{Role, Turn};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

const INDENT: &str = "  ";

/// Widget for displaying the visible turns of a conversation
pub struct MessageList<'a> {
    turns: &'a [Turn],
    theme: &'a Theme,
    scroll: usize,
    streaming: bool,
    error: Option<&'a str>,
}

impl<'a> MessageList<'a> {
    pub fn new(turns: &'a [Turn], theme: &'a Theme) -> Self {
        Self {
            turns,
            theme,
            scroll: 0,
            streaming: false,
            error: None,
        }
    }

    /// Set scroll offset in lines
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    /// Mark a trailing assistant turn as still receiving text
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Show a failure below the transcript
    pub fn error(mut self, error: Option<&'a str>) -> Self {
        self.error = error;
        self
    }

    /// Every line the widget would draw at `width`, before scrolling
    pub fn lines(&self, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let last = self.turns.len().saturating_sub(1);
        for (i, turn) in self.turns.iter().enumerate() {
            let open = self.streaming && i == last && turn.is_assistant();
            lines.extend(render_turn(turn, self.theme, width, open));
        }
        if let Some(error) = self.error {
            lines.push(Line::from(Span::styled("✗ Error", self.theme.error_style())));
            for line in textwrap::wrap(error, width.saturating_sub(INDENT.len()).max(1)) {
                lines.push(Line::from(Span::styled(
                    format!("{INDENT}{line}"),
                    self.theme.error_style(),
                )));
            }
        }
        lines
    }

    /// Total height in lines at `width`
    pub fn content_height(&self, width: usize) -> usize {
        self.lines(width).len()
    }
}

fn render_turn(turn: &Turn, theme: &Theme, width: usize, open: bool) -> Vec<Line<'static>> {
    let (label, style) = match turn.role {
        Role::User => ("▶ You", theme.user_header()),
        Role::Assistant => ("◀ Assistant", theme.assistant_header()),
        Role::System => ("● System", theme.dim_style()),
    };
    let header = if open {
        format!("{label} ▌")
    } else {
        label.to_string()
    };

    let mut lines = vec![Line::from(Span::styled(header, style))];
    let content_width = width.saturating_sub(INDENT.len()).max(1);

    if turn.is_assistant() {
        for line in render_markdown(&turn.content, theme, content_width) {
            lines.extend(hard_wrap(line, content_width));
        }
    } else {
        let style = if turn.role == Role::System {
            theme.dim_style()
        } else {
            theme.base_style()
        };
        for line in textwrap::wrap(&turn.content, content_width) {
            lines.push(Line::from(Span::styled(format!("{INDENT}{line}"), style)));
        }
    }

    lines.push(Line::default());
    lines
}

/// Split a styled line into indented rows of at most `width` columns
fn hard_wrap(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    let mut rows = Vec::new();
    let mut row = vec![Span::raw(INDENT)];
    let mut used = 0;

    for span in line.spans {
        let mut chunk = String::new();
        for c in span.content.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > width && used > 0 {
                if !chunk.is_empty() {
                    row.push(Span::styled(std::mem::take(&mut chunk), span.style));
                }
                rows.push(Line::from(std::mem::replace(
                    &mut row,
                    vec![Span::raw(INDENT)],
                )));
                used = 0;
            }
            chunk.push(c);
            used += w;
        }
        if !chunk.is_empty() {
            row.push(Span::styled(chunk, span.style));
        }
    }
    rows.push(Line::from(row));
    rows
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let visible: Vec<Line> = self
            .lines(area.width as usize)
            .into_iter()
            .skip(self.scroll)
            .take(area.height as usize)
            .collect();

        Paragraph::new(visible).render(area, buf);
    }
}
