use std::fmt;

/// Keyboard key identifier.
///
/// Platform layers map physical key codes into these variants. Keys without a
/// variant use `Key::Unknown(code)` with the platform's stable code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,

    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    Shift,
    Control,
    Alt,
    Meta,

    // Letters
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    // Digits
    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    // Function keys
    F1, F2, F3, F4, F5, F6,
    F7, F8, F9, F10, F11, F12,

    Unknown(u32),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Mouse button identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

/// Edge reported for a key or button.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// How often a held key or button fires its action.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Frequency {
    /// Once per press, however long it is held.
    Once,
    /// Every tick while held.
    Repeat,
}

/// Identifier of a key or mouse button that can start an action.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Trigger {
    Key(Key),
    Button(MouseButton),
}

impl From<Key> for Trigger {
    fn from(key: Key) -> Self {
        Trigger::Key(key)
    }
}

impl From<MouseButton> for Trigger {
    fn from(button: MouseButton) -> Self {
        Trigger::Button(button)
    }
}

/// Platform-agnostic input event.
///
/// Pointer positions are logical pixels from the window's top-left corner.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum InputEvent {
    Key {
        key: Key,
        state: ButtonState,
        /// True for auto-repeat presses generated while the key is held.
        repeat: bool,
    },
    MouseButton {
        button: MouseButton,
        state: ButtonState,
    },
    PointerMoved {
        x: f64,
        y: f64,
    },
    /// Raw wheel offsets, as reported by the platform.
    Scroll {
        x: f64,
        y: f64,
    },
}
