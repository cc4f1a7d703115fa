//! Markdown rendering for assistant turns

use crate::theme::Theme;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthChar;

/// Per-list counter; `None` for bullet lists
type ListState = Option<u64>;

struct Renderer<'t> {
    theme: &'t Theme,
    width: usize,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<ListState>,
    code_block: Option<String>,
    quote_depth: usize,
}

impl<'t> Renderer<'t> {
    fn new(theme: &'t Theme, width: usize) -> Self {
        Self {
            theme,
            width,
            lines: Vec::new(),
            current: Vec::new(),
            styles: vec![theme.base_style()],
            lists: Vec::new(),
            code_block: None,
            quote_depth: 0,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, f: impl FnOnce(Style) -> Style) {
        let next = f(self.style());
        self.styles.push(next);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut spans = Vec::new();
        if self.quote_depth > 0 {
            spans.push(Span::styled("│ ".repeat(self.quote_depth), self.theme.dim_style()));
        }
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| !l.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                let accent = self.theme.accent_style();
                self.push_style(|_| match level {
                    HeadingLevel::H1 => {
                        accent.add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
                    }
                    HeadingLevel::H2 => accent.add_modifier(Modifier::BOLD),
                    _ => accent,
                });
            }
            Tag::Paragraph => self.flush(),
            Tag::BlockQuote(_) => {
                self.flush();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.code_block = Some(String::new());
            }
            Tag::List(first) => {
                self.flush();
                self.lists.push(first);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => format!("{indent}• "),
                };
                self.current
                    .push(Span::styled(marker, self.theme.dim_style()));
            }
            Tag::Emphasis => self.push_style(|s| s.add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(|s| s.add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(|s| s.add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => {
                let link = self.theme.link;
                self.push_style(|s| s.fg(link).add_modifier(Modifier::UNDERLINED));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.pop_style();
                self.blank();
            }
            TagEnd::Paragraph => {
                // Tight list items carry no blank line
                if self.lists.is_empty() {
                    self.blank();
                } else {
                    self.flush();
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            TagEnd::CodeBlock => {
                let code = self.code_block.take().unwrap_or_default();
                let style = self.theme.code_block_style();
                let max = self.width.saturating_sub(2);
                for code_line in code.lines() {
                    let shown = truncate_to_width(code_line, max);
                    self.lines
                        .push(Line::from(Span::styled(format!("  {shown}"), style)));
                }
                self.blank();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.pop_style()
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = self.code_block.as_mut() {
            code.push_str(text);
            return;
        }
        let style = self.style();
        self.current.push(Span::styled(text.to_string(), style));
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if self.code_block.is_some() {
            self.end(TagEnd::CodeBlock);
        }
        self.flush();
        while self.lines.last().is_some_and(|l| {
            l.spans.is_empty() || l.spans.iter().all(|s| s.content.is_empty())
        }) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Cut `text` to at most `width` display columns, marking the cut with `…`
fn truncate_to_width(text: &str, width: usize) -> String {
    let total: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= width {
        return text.to_string();
    }

    let budget = width.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Convert markdown text to styled ratatui lines
pub fn render_markdown(text: &str, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let mut renderer = Renderer::new(theme, width);

    for event in Parser::new(text) {
        match event {
            Event::Start(tag) => renderer.start(tag),
            Event::End(tag) => renderer.end(tag),
            Event::Text(text) => renderer.text(&text),
            Event::Code(code) => {
                let style = theme.code_style();
                renderer
                    .current
                    .push(Span::styled(format!("`{code}`"), style));
            }
            Event::SoftBreak => renderer.current.push(Span::raw(" ")),
            Event::HardBreak => renderer.flush(),
            Event::Rule => {
                renderer.flush();
                renderer.lines.push(Line::from(Span::styled(
                    "─".repeat(width.min(40)),
                    theme.dim_style(),
                )));
            }
            _ => {}
        }
    }

    renderer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_simple_text() {
        let theme = Theme::dark();
        let lines = render_markdown("Hello, world!", &theme, 80);
        assert_eq!(plain(&lines), vec!["Hello, world!"]);
    }

    #[test]
    fn test_paragraphs_separated_by_blank_line() {
        let theme = Theme::dark();
        let lines = render_markdown("one\n\ntwo", &theme, 80);
        assert_eq!(plain(&lines), vec!["one", "", "two"]);
    }

    #[test]
    fn test_code_block() {
        let theme = Theme::dark();
        let md = "```rust\nfn main() {}\n```";
        let lines = render_markdown(md, &theme, 80);
        assert_eq!(plain(&lines), vec!["  fn main() {}"]);
    }

    #[test]
    fn test_unterminated_code_block_renders() {
        let theme = Theme::dark();
        let lines = render_markdown("Here:\n\n```\nlet x = 1;", &theme, 80);
        assert_eq!(plain(&lines), vec!["Here:", "", "  let x = 1;"]);
    }

    #[test]
    fn test_lists() {
        let theme = Theme::dark();
        let lines = render_markdown("- a\n- b\n\n1. x\n2. y", &theme, 80);
        let text = plain(&lines);
        assert!(text.contains(&"• a".to_string()));
        assert!(text.contains(&"• b".to_string()));
        assert!(text.contains(&"1. x".to_string()));
        assert!(text.contains(&"2. y".to_string()));
    }

    #[test]
    fn test_nested_emphasis_restores_style() {
        let theme = Theme::dark();
        let lines = render_markdown("**bold *both* bold** plain", &theme, 80);
        let spans = &lines[0].spans;
        let both = spans.iter().find(|s| s.content == "both").unwrap();
        assert!(both.style.add_modifier.contains(Modifier::BOLD | Modifier::ITALIC));
        let tail = spans.iter().find(|s| s.content == " bold").unwrap();
        assert!(tail.style.add_modifier.contains(Modifier::BOLD));
        assert!(!tail.style.add_modifier.contains(Modifier::ITALIC));
        let last = spans.last().unwrap();
        assert_eq!(last.content, " plain");
        assert_eq!(last.style, theme.base_style());
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("abcdefgh", 5), "abcd…");
        // Wide chars count double
        assert_eq!(truncate_to_width("日本語テキスト", 5), "日本…");
    }
}
