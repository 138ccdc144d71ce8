//! # Event Synthesizer
//!
//! Turns mapped actions into synthetic keyboard and mouse events and hands
//! them to an [`InputSink`]. The engine only ever talks to the sink trait, so
//! a native window, a test harness or the console host can each provide their
//! own.
//!
//! ## Action strings
//!
//! ```text
//! MOUSE_LEFT | MOUSE_MIDDLE | MOUSE_RIGHT                  -> mouse button
//! MOUSE_UP | MOUSE_DOWN | MOUSE_LOOK_LEFT | MOUSE_LOOK_RIGHT -> held mouse-look
//! " " ctrl shift alt tab esc enter backspace                 -> named special key
//! anything else                                              -> literal key
//! ""                                                         -> unmapped
//! ```

pub mod sinks;
pub mod synthesizer;

pub use sinks::{RecordingSink, TracingSink};
pub use synthesizer::Synthesizer;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    Down,
    Up,
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyState::Down => f.write_str("down"),
            KeyState::Up => f.write_str("up"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// DOM-style button index.
    pub fn index(&self) -> u8 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(MouseButton::Left),
            1 => Some(MouseButton::Middle),
            2 => Some(MouseButton::Right),
            _ => None,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            MouseButton::Left => "MOUSE_LEFT",
            MouseButton::Middle => "MOUSE_MIDDLE",
            MouseButton::Right => "MOUSE_RIGHT",
        }
    }
}

/// Direction of held mouse-look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookDirection {
    Up,
    Down,
    Left,
    Right,
}

/// A keyboard event as the host sees it: the logical key and its code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyStroke {
    pub key: String,
    pub code: String,
}

/// What an action string resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Key(KeyStroke),
    Mouse(MouseButton),
    Look(LookDirection),
    Unmapped,
}

const SPECIAL_KEYS: [(&str, &str); 8] = [
    (" ", "Space"),
    ("ctrl", "Control"),
    ("shift", "Shift"),
    ("alt", "Alt"),
    ("tab", "Tab"),
    ("esc", "Escape"),
    ("enter", "Enter"),
    ("backspace", "Backspace"),
];

impl Action {
    pub fn parse(action: &str) -> Action {
        match action {
            "" => return Action::Unmapped,
            "MOUSE_LEFT" => return Action::Mouse(MouseButton::Left),
            "MOUSE_MIDDLE" => return Action::Mouse(MouseButton::Middle),
            "MOUSE_RIGHT" => return Action::Mouse(MouseButton::Right),
            "MOUSE_UP" => return Action::Look(LookDirection::Up),
            "MOUSE_DOWN" => return Action::Look(LookDirection::Down),
            "MOUSE_LOOK_LEFT" => return Action::Look(LookDirection::Left),
            "MOUSE_LOOK_RIGHT" => return Action::Look(LookDirection::Right),
            _ => {}
        }

        let code = if let Some((_, code)) = SPECIAL_KEYS.iter().find(|(name, _)| *name == action)
        {
            code.to_string()
        } else if action.chars().count() == 1 || is_function_key(action) {
            action.to_uppercase()
        } else {
            // Arrow* and any other named key pass through
            action.to_string()
        };

        Action::Key(KeyStroke {
            key: action.to_string(),
            code,
        })
    }
}

fn is_function_key(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some('f') | Some('F') => {}
        _ => return false,
    }
    matches!(chars.as_str().parse::<u8>(), Ok(1..=24))
}

/// Everything a sink can be asked to do, as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntheticEvent {
    Key { stroke: KeyStroke, state: KeyState },
    MouseButton { button: MouseButton, state: KeyState },
    MouseMove { dx: f32, dy: f32 },
}

/// Host binding for synthetic input.
///
/// Implementations must not block: they are called from the engine loop for
/// every emitted event.
pub trait InputSink: Send {
    fn emit_key(&mut self, stroke: &KeyStroke, state: KeyState);

    fn emit_mouse_button(&mut self, button: MouseButton, state: KeyState);

    fn emit_mouse_move(&mut self, dx: f32, dy: f32);
}
