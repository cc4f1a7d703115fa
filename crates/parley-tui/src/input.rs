//! Input handling

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Processed input action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Regular character input
    Char(char),
    /// Enter/submit
    Submit,
    /// Backspace
    Backspace,
    /// Delete
    Delete,
    /// Move cursor left
    Left,
    /// Move cursor right
    Right,
    /// Scroll history up one line
    Up,
    /// Scroll history down one line
    Down,
    /// Move to start of line
    Home,
    /// Move to end of line
    End,
    /// Page up
    PageUp,
    /// Page down
    PageDown,
    /// Escape
    Escape,
    /// Ctrl+C
    Interrupt,
    /// Ctrl+R (discard the conversation)
    Reset,
    /// Ctrl+U (clear line)
    ClearLine,
    /// Ctrl+W (delete word)
    DeleteWord,
    /// Bracketed paste
    Paste(String),
    /// Ctrl+Q
    Quit,
    /// Unknown/unhandled
    Unknown,
}

impl Action {
    /// Whether this action edits the input text
    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            Action::Char(_)
                | Action::Backspace
                | Action::Delete
                | Action::ClearLine
                | Action::DeleteWord
                | Action::Paste(_)
        )
    }
}

/// Convert a crossterm key event to an action
pub fn key_to_action(event: KeyEvent) -> Action {
    let KeyEvent {
        code,
        modifiers,
        kind,
        ..
    } = event;

    // Windows reports releases too
    if kind == KeyEventKind::Release {
        return Action::Unknown;
    }

    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => Action::Interrupt,
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('r') => Action::Reset,
            KeyCode::Char('u') => Action::ClearLine,
            KeyCode::Char('w') => Action::DeleteWord,
            KeyCode::Char('a') => Action::Home,
            KeyCode::Char('e') => Action::End,
            _ => Action::Unknown,
        };
    }

    if modifiers.contains(KeyModifiers::ALT) {
        return Action::Unknown;
    }

    match code {
        KeyCode::Char(c) => Action::Char(c),
        KeyCode::Enter => Action::Submit,
        KeyCode::Backspace => Action::Backspace,
        KeyCode::Delete => Action::Delete,
        KeyCode::Left => Action::Left,
        KeyCode::Right => Action::Right,
        KeyCode::Up => Action::Up,
        KeyCode::Down => Action::Down,
        KeyCode::Home => Action::Home,
        KeyCode::End => Action::End,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Esc => Action::Escape,
        _ => Action::Unknown,
    }
}

/// Convert a crossterm event to an action
pub fn event_to_action(event: Event) -> Option<Action> {
    match event {
        Event::Key(key_event) => Some(key_to_action(key_event)),
        Event::Paste(text) => Some(Action::Paste(text)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_control_bindings() {
        assert_eq!(
            key_to_action(key(KeyCode::Char('r'), KeyModifiers::CONTROL)),
            Action::Reset
        );
        assert_eq!(
            key_to_action(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Interrupt
        );
        assert_eq!(
            key_to_action(key(KeyCode::Char('q'), KeyModifiers::CONTROL)),
            Action::Quit
        );
    }

    #[test]
    fn test_plain_keys() {
        assert_eq!(
            key_to_action(key(KeyCode::Enter, KeyModifiers::NONE)),
            Action::Submit
        );
        assert_eq!(
            key_to_action(key(KeyCode::Char('R'), KeyModifiers::SHIFT)),
            Action::Char('R')
        );
    }

    #[test]
    fn test_release_ignored() {
        let mut event = key(KeyCode::Char('x'), KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert_eq!(key_to_action(event), Action::Unknown);
    }

    #[test]
    fn test_paste_event() {
        assert_eq!(
            event_to_action(Event::Paste("hi".into())),
            Some(Action::Paste("hi".into()))
        );
        assert!(event_to_action(Event::FocusGained).is_none());
    }

    #[test]
    fn test_is_edit() {
        assert!(Action::Char('a').is_edit());
        assert!(Action::Paste("x".into()).is_edit());
        assert!(!Action::Submit.is_edit());
        assert!(!Action::Reset.is_edit());
    }
}
