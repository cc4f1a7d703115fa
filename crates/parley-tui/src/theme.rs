//! Color theme support

use ratatui::style::{Color, Modifier, Style};
use serde::{Deserialize, Serialize};

/// Built-in theme selectable from the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Dark,
    Light,
}

/// Color theme for the UI
#[derive(Debug, Clone)]
pub struct Theme {
    /// Background color
    pub bg: Color,
    /// Primary text color
    pub fg: Color,
    /// Dimmed/secondary text
    pub dim: Color,
    /// Accent color (user turns, prompts)
    pub accent: Color,
    /// Assistant turn header
    pub assistant: Color,
    /// Error color
    pub error: Color,
    /// Border color
    pub border: Color,
    /// Code/preformatted text color
    pub code: Color,
    /// Link color
    pub link: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl From<ThemeName> for Theme {
    fn from(name: ThemeName) -> Self {
        match name {
            ThemeName::Dark => Self::dark(),
            ThemeName::Light => Self::light(),
        }
    }
}

impl Theme {
    /// Dark theme (default)
    pub fn dark() -> Self {
        Self {
            bg: Color::Reset,
            fg: Color::White,
            dim: Color::DarkGray,
            accent: Color::Cyan,
            assistant: Color::Green,
            error: Color::Red,
            border: Color::DarkGray,
            code: Color::Magenta,
            link: Color::Blue,
        }
    }

    /// Light theme
    pub fn light() -> Self {
        Self {
            bg: Color::White,
            fg: Color::Black,
            dim: Color::Gray,
            accent: Color::Blue,
            assistant: Color::Rgb(0, 120, 60),
            error: Color::Red,
            border: Color::Gray,
            code: Color::Magenta,
            link: Color::Blue,
        }
    }

    pub fn base_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    pub fn dim_style(&self) -> Style {
        Style::default().fg(self.dim)
    }

    pub fn accent_style(&self) -> Style {
        Style::default().fg(self.accent)
    }

    /// Header style for user turns
    pub fn user_header(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    /// Header style for assistant turns
    pub fn assistant_header(&self) -> Style {
        Style::default()
            .fg(self.assistant)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }

    /// Inline code style
    pub fn code_style(&self) -> Style {
        Style::default().fg(self.code).add_modifier(Modifier::BOLD)
    }

    /// Fenced code block style
    pub fn code_block_style(&self) -> Style {
        Style::default().fg(self.code).add_modifier(Modifier::DIM)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }
}
