//! Keyboard input events delivered to the compositor.

/// Logical key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
    Tab,
    /// Any key without editing meaning (Escape, function keys, ...).
    Other,
}

impl Key {
    pub fn is_navigation(self) -> bool {
        matches!(
            self,
            Key::ArrowLeft | Key::ArrowRight | Key::ArrowUp | Key::ArrowDown | Key::Home | Key::End
        )
    }

    pub fn is_deletion(self) -> bool {
        matches!(self, Key::Backspace | Key::Delete)
    }
}

/// Key press with modifier state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyInput {
    pub key: Key,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            shift: false,
        }
    }

    pub fn char(ch: char) -> Self {
        Self::new(Key::Char(ch))
    }

    /// Ctrl+`ch`.
    pub fn ctrl(ch: char) -> Self {
        Self {
            ctrl: true,
            ..Self::char(ch)
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Ctrl or Meta held.
    pub fn is_command(&self) -> bool {
        self.ctrl || self.meta
    }

    /// Keys that cannot add content: navigation, deletion, and Ctrl/Meta
    /// combos.
    pub fn permitted_while_overflowed(&self) -> bool {
        self.is_command() || self.key.is_navigation() || self.key.is_deletion()
    }
}

impl From<Key> for KeyInput {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}
