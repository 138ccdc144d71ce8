//! Inbound events from the host and the pointer registry.

pub mod registry;

pub use registry::{Pointer, PointerRegistry};

use crate::controls::geometry::Point;
use std::fmt;
use std::str::FromStr;

/// Touch identifier assigned by the device, or the single mouse pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PointerId {
    Touch(i64),
    Mouse,
}

impl fmt::Display for PointerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerId::Touch(id) => write!(f, "touch#{}", id),
            PointerId::Mouse => f.write_str("mouse"),
        }
    }
}

impl FromStr for PointerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("mouse") {
            Ok(PointerId::Mouse)
        } else {
            s.parse().map(PointerId::Touch)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One pointer sample in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub id: PointerId,
    pub phase: PointerPhase,
    pub position: Point,
}

impl PointerEvent {
    pub fn new(id: PointerId, phase: PointerPhase, x: f32, y: f32) -> Self {
        Self {
            id,
            phase,
            position: Point::new(x, y),
        }
    }
}

/// A physical key or mouse-button press, only consumed by calibration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalInput {
    /// DOM-style key value (`"k"`, `"Escape"`, `"ArrowUp"`, ...)
    Key(String),
    /// DOM-style button index
    MouseButton(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_ids_parse() {
        assert_eq!("mouse".parse::<PointerId>().unwrap(), PointerId::Mouse);
        assert_eq!("7".parse::<PointerId>().unwrap(), PointerId::Touch(7));
        assert!("finger".parse::<PointerId>().is_err());
    }
}
