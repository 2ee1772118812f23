//! Keyboard shortcuts.
//!
//! Hosts translate their key events into [`KeyEvent`] and the canvas maps
//! them to a [`KeyCommand`] with [`key_command`].

/// Key that was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    PageUp,
    PageDown,
    Tab,
    Enter,
    Delete,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
}

/// A key press with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            alt: false,
            shift: false,
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// Which edge of a word box a nudge moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BboxSide {
    Left,
    Right,
}

/// Action bound to a key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyCommand {
    Zoom(f64),
    /// Page offset from the current page
    ChangePage(isize),
    NextWord,
    PrevWord,
    RightWord { multi: bool },
    LeftWord { multi: bool },
    AboveWord,
    BelowWord,
    NudgeBbox { side: BboxSide, amount: f64 },
    /// Open the editor at the start, or at the end when `at_end`
    Edit { at_end: bool },
    ToggleItalic,
    ToggleBold,
    DeleteWords,
    FontSizeUp,
    FontSizeDown,
    /// Hide the text and layout layers while ctrl+space is held
    PeekBackground,
}

// Shift and ctrl+alt change which character the plus and minus keys report.
const PLUS_KEYS: [char; 3] = ['+', '=', '×'];
const MINUS_KEYS: [char; 3] = ['-', '_', '–'];

/// Command bound to `event`. `editing` is `true` while the inline editor
/// is open, which leaves arrows, Enter and font size keys to the editor.
pub fn key_command(event: &KeyEvent, editing: bool) -> Option<KeyCommand> {
    let KeyEvent {
        key,
        ctrl,
        alt,
        shift,
    } = *event;

    let command = match key {
        Key::Char(c) if ctrl && !alt && PLUS_KEYS.contains(&c) => KeyCommand::Zoom(1.1),
        Key::Char(c) if ctrl && !alt && MINUS_KEYS.contains(&c) => KeyCommand::Zoom(0.9),
        Key::PageUp => KeyCommand::ChangePage(-1),
        Key::PageDown => KeyCommand::ChangePage(1),
        Key::Tab if shift => KeyCommand::PrevWord,
        Key::Tab => KeyCommand::NextWord,
        Key::ArrowRight | Key::ArrowLeft if editing => return None,
        Key::ArrowRight | Key::ArrowLeft if ctrl => {
            let side = if alt { BboxSide::Right } else { BboxSide::Left };
            let amount = if key == Key::ArrowRight { 1.0 } else { -1.0 };
            KeyCommand::NudgeBbox { side, amount }
        }
        Key::ArrowRight => KeyCommand::RightWord { multi: shift },
        Key::ArrowLeft => KeyCommand::LeftWord { multi: shift },
        Key::Char(' ') if ctrl => KeyCommand::PeekBackground,
        Key::ArrowUp => KeyCommand::AboveWord,
        Key::ArrowDown => KeyCommand::BelowWord,
        Key::Enter if editing => return None,
        Key::Enter => KeyCommand::Edit { at_end: alt },
        Key::Char('i') if ctrl => KeyCommand::ToggleItalic,
        Key::Char('b') if ctrl => KeyCommand::ToggleBold,
        Key::Delete if ctrl => KeyCommand::DeleteWords,
        Key::Char(c) if alt && !editing && PLUS_KEYS.contains(&c) => KeyCommand::FontSizeUp,
        Key::Char(c) if alt && !editing && MINUS_KEYS.contains(&c) => KeyCommand::FontSizeDown,
        _ => return None,
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_keys() {
        let plus = KeyEvent::new(Key::Char('=')).ctrl();
        assert_eq!(key_command(&plus, false), Some(KeyCommand::Zoom(1.1)));
        let minus = KeyEvent::new(Key::Char('-')).ctrl();
        assert_eq!(key_command(&minus, true), Some(KeyCommand::Zoom(0.9)));
        // ctrl+alt plus is not zoom
        let both = KeyEvent::new(Key::Char('+')).ctrl().alt();
        assert_eq!(key_command(&both, false), Some(KeyCommand::FontSizeUp));
    }

    #[test]
    fn test_navigation_keys() {
        assert_eq!(
            key_command(&KeyEvent::new(Key::Tab), false),
            Some(KeyCommand::NextWord)
        );
        assert_eq!(
            key_command(&KeyEvent::new(Key::Tab).shift(), false),
            Some(KeyCommand::PrevWord)
        );
        assert_eq!(
            key_command(&KeyEvent::new(Key::ArrowRight).shift(), false),
            Some(KeyCommand::RightWord { multi: true })
        );
        assert_eq!(key_command(&KeyEvent::new(Key::ArrowLeft), true), None);
        assert_eq!(
            key_command(&KeyEvent::new(Key::PageUp), false),
            Some(KeyCommand::ChangePage(-1))
        );
    }

    #[test]
    fn test_bbox_nudge_keys() {
        assert_eq!(
            key_command(&KeyEvent::new(Key::ArrowRight).ctrl(), false),
            Some(KeyCommand::NudgeBbox {
                side: BboxSide::Left,
                amount: 1.0
            })
        );
        assert_eq!(
            key_command(&KeyEvent::new(Key::ArrowLeft).ctrl().alt(), false),
            Some(KeyCommand::NudgeBbox {
                side: BboxSide::Right,
                amount: -1.0
            })
        );
    }

    #[test]
    fn test_edit_and_style_keys() {
        assert_eq!(
            key_command(&KeyEvent::new(Key::Enter).alt(), false),
            Some(KeyCommand::Edit { at_end: true })
        );
        assert_eq!(key_command(&KeyEvent::new(Key::Enter), true), None);
        assert_eq!(
            key_command(&KeyEvent::new(Key::Char('b')).ctrl(), true),
            Some(KeyCommand::ToggleBold)
        );
        assert_eq!(
            key_command(&KeyEvent::new(Key::Delete).ctrl(), false),
            Some(KeyCommand::DeleteWords)
        );
        assert_eq!(key_command(&KeyEvent::new(Key::Delete), false), None);
        assert_eq!(key_command(&KeyEvent::new(Key::Char('-')).alt(), true), None);
    }
}
