//! Text input widget

use crate::input::Action;
use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

/// Single-line text input.
///
/// A disabled box ignores edits and renders its disabled placeholder, but
/// keeps whatever text it already holds.
#[derive(Debug, Default)]
pub struct InputBox {
    content: String,
    /// Cursor position in chars, not bytes
    cursor: usize,
    /// Horizontal scroll offset in display columns
    scroll: usize,
    placeholder: String,
    disabled_placeholder: String,
    disabled: bool,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder shown while the box is empty and enabled
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Placeholder shown while the box is disabled
    pub fn with_disabled_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.disabled_placeholder = placeholder.into();
        self
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.cursor = self.char_count();
        self.scroll = 0;
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
        self.scroll = 0;
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn cursor_display_width(&self) -> usize {
        self.content
            .chars()
            .take(self.cursor)
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    fn insert_char(&mut self, c: char) {
        let offset = self.byte_offset(self.cursor);
        self.content.insert(offset, c);
        self.cursor += 1;
    }

    /// Remove chars in `start..end` and park the cursor at `start`
    fn remove_range(&mut self, start: usize, end: usize) {
        let (from, to) = (self.byte_offset(start), self.byte_offset(end));
        self.content.drain(from..to);
        self.cursor = start;
    }

    /// Handle an input action; returns whether it was consumed
    pub fn handle_action(&mut self, action: &Action, width: u16) -> bool {
        if self.disabled && action.is_edit() {
            return false;
        }

        let char_count = self.char_count();
        let handled = match action {
            Action::Char(c) => {
                self.insert_char(*c);
                true
            }
            Action::Backspace if self.cursor > 0 => {
                self.remove_range(self.cursor - 1, self.cursor);
                true
            }
            Action::Delete if self.cursor < char_count => {
                self.remove_range(self.cursor, self.cursor + 1);
                true
            }
            Action::Left if self.cursor > 0 => {
                self.cursor -= 1;
                true
            }
            Action::Right if self.cursor < char_count => {
                self.cursor += 1;
                true
            }
            Action::Home => {
                self.cursor = 0;
                true
            }
            Action::End => {
                self.cursor = char_count;
                true
            }
            Action::ClearLine => {
                self.clear();
                true
            }
            Action::DeleteWord => {
                let chars: Vec<char> = self.content.chars().collect();
                let mut start = self.cursor;
                while start > 0 && chars[start - 1] == ' ' {
                    start -= 1;
                }
                while start > 0 && chars[start - 1] != ' ' {
                    start -= 1;
                }
                self.remove_range(start, self.cursor);
                true
            }
            Action::Paste(text) => {
                // Single line: newlines collapse to one space
                for c in text.chars() {
                    if c == '\n' || c == '\r' {
                        if self.cursor > 0 && !self.content.ends_with(' ') {
                            self.insert_char(' ');
                        }
                    } else {
                        self.insert_char(c);
                    }
                }
                true
            }
            _ => false,
        };

        if handled {
            self.update_scroll(width as usize);
        }
        handled
    }

    fn update_scroll(&mut self, width: usize) {
        // Borders and padding
        let visible_width = width.saturating_sub(4).max(1);
        let cursor_pos = self.cursor_display_width();

        if cursor_pos < self.scroll {
            self.scroll = cursor_pos;
        } else if cursor_pos >= self.scroll + visible_width {
            self.scroll = cursor_pos + 1 - visible_width;
        }
    }

    /// Chars of the content that fit in `width` columns after scrolling
    fn visible_text(&self, width: usize) -> String {
        let mut skipped = 0;
        let mut used = 0;
        let mut visible = String::new();
        for c in self.content.chars() {
            let w = c.width().unwrap_or(0);
            if skipped < self.scroll {
                skipped += w;
                continue;
            }
            if used + w > width {
                break;
            }
            visible.push(c);
            used += w;
        }
        visible
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(if self.disabled {
                theme.border_style()
            } else {
                theme.accent_style()
            });

        let inner = block.inner(area);
        block.render(area, buf);

        let (text, style) = if self.disabled {
            (self.disabled_placeholder.clone(), theme.dim_style())
        } else if self.content.is_empty() {
            (self.placeholder.clone(), theme.dim_style())
        } else {
            (self.visible_text(inner.width as usize), theme.base_style())
        };
        Paragraph::new(text).style(style).render(inner, buf);

        if !self.disabled && inner.width > 0 {
            let cursor_x = self.cursor_display_width().saturating_sub(self.scroll);
            if cursor_x < inner.width as usize {
                let x = inner.x + cursor_x as u16;
                if let Some(cell) = buf.cell_mut((x, inner.y)) {
                    cell.set_style(Style::default().bg(theme.accent));
                }
            }
        }
    }
}
