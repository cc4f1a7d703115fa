//! Animated loading indicator

use crate::theme::Theme;
use ratatui::{buffer::Buffer, layout::Rect, text::Span, widgets::Widget};
use std::time::{Duration, Instant};

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_DURATION: Duration = Duration::from_millis(80);

/// Default label shown while a response is pending
pub const LOADING_LABEL: &str = "Loading...";

/// Animated spinner widget
pub struct Spinner<'a> {
    label: &'a str,
    theme: &'a Theme,
    start_time: Instant,
}

impl<'a> Spinner<'a> {
    pub fn new(label: &'a str, theme: &'a Theme) -> Self {
        Self {
            label,
            theme,
            start_time: Instant::now(),
        }
    }

    /// Spinner with the standard loading label
    pub fn loading(theme: &'a Theme) -> Self {
        Self::new(LOADING_LABEL, theme)
    }

    /// Animate relative to `start` so frames stay stable across redraws
    pub fn with_start_time(mut self, start: Instant) -> Self {
        self.start_time = start;
        self
    }

    fn current_frame(&self) -> &'static str {
        frame_at(self.start_time.elapsed())
    }
}

fn frame_at(elapsed: Duration) -> &'static str {
    let index = (elapsed.as_millis() / FRAME_DURATION.as_millis()) as usize;
    SPINNER_FRAMES[index % SPINNER_FRAMES.len()]
}

impl Widget for Spinner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 3 || area.height == 0 {
            return;
        }

        let text = format!("{} {}", self.current_frame(), self.label);
        let span = Span::styled(&text, self.theme.accent_style());
        buf.set_span(area.x, area.y, &span, area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_cycle() {
        assert_eq!(frame_at(Duration::ZERO), SPINNER_FRAMES[0]);
        assert_eq!(frame_at(FRAME_DURATION), SPINNER_FRAMES[1]);
        assert_eq!(
            frame_at(FRAME_DURATION * SPINNER_FRAMES.len() as u32),
            SPINNER_FRAMES[0]
        );
    }

    #[test]
    fn test_renders_label() {
        let theme = Theme::dark();
        let area = Rect::new(0, 0, 20, 1);
        let mut buf = Buffer::empty(area);
        Spinner::loading(&theme).render(area, &mut buf);
        let row: String = (0..area.width)
            .map(|x| buf[(x, 0)].symbol().to_string())
            .collect();
        assert!(row.contains(LOADING_LABEL));
    }
}
