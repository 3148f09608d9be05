//! Keyboard input types.
//!
//! Only the keys overlay navigation interprets get their own variant; every
//! printable character arrives as [`Key::Character`] for typeahead.

use crate::platform::ElementId;

/// Keyboard key identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    // Navigation
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,

    // Activation and focus
    Enter,
    Space,
    Tab,
    Escape,

    // Editing
    Backspace,

    /// A printable character.
    Character(char),

    /// Any key the overlay does not interpret.
    Other,
}

impl Key {
    /// Check if this is one of the four arrow keys.
    pub fn is_arrow(&self) -> bool {
        matches!(
            self,
            Key::ArrowUp | Key::ArrowDown | Key::ArrowLeft | Key::ArrowRight
        )
    }

    /// Check if this key activates the highlighted entry.
    pub fn is_activation(&self) -> bool {
        matches!(self, Key::Enter | Key::Space)
    }

    /// The character this key types, if any.
    pub fn to_char(&self) -> Option<char> {
        match self {
            Key::Character(ch) => Some(*ch),
            Key::Space => Some(' '),
            _ => None,
        }
    }
}

/// Keyboard modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyboardModifiers {
    /// Shift key is held.
    pub shift: bool,
    /// Control key is held.
    pub control: bool,
    /// Alt (Option on macOS) key is held.
    pub alt: bool,
    /// Meta (Command on macOS, Windows key) is held.
    pub meta: bool,
}

impl KeyboardModifiers {
    /// No modifiers held.
    pub const NONE: Self = Self {
        shift: false,
        control: false,
        alt: false,
        meta: false,
    };

    /// Check whether a shortcut modifier (control, alt, meta) is held.
    pub fn has_command(&self) -> bool {
        self.control || self.alt || self.meta
    }
}

/// A key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The pressed key.
    pub key: Key,
    /// Modifier state at the time of the press.
    pub modifiers: KeyboardModifiers,
    /// The focused element the event was dispatched to, if any.
    pub target: Option<ElementId>,
}

impl KeyEvent {
    /// A key press with no modifiers and no target.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: KeyboardModifiers::NONE,
            target: None,
        }
    }

    /// Set the target element.
    pub fn with_target(mut self, target: ElementId) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the modifier state.
    pub fn with_modifiers(mut self, modifiers: KeyboardModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

impl From<Key> for KeyEvent {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}
