//! # Control State Machines
//!
//! One instance per virtual control: two joysticks and fourteen buttons
//! (face, D-pad, shoulders, system). Each control owns its activation state
//! and reports transitions through the [`Synthesizer`] it is handed in a
//! [`ControlContext`].
//!
//! Hit-testing always runs against the current [`Layout`]: button regions are
//! rendered from their cluster transform on every pointer event.

pub mod button;
pub mod geometry;
pub mod joystick;
pub mod layout;

pub use button::ButtonControl;
pub use joystick::{Direction, Joystick, StickDown};
pub use layout::Layout;

use crate::config::Settings;
use crate::diagnostics::Diagnostics;
use crate::engine::timer::earliest;
use crate::profile::{ControlId, Mapping};
use crate::synth::Synthesizer;
use geometry::Point;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StickSide {
    Left,
    Right,
}

/// What a stick produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StickMode {
    /// Four edge-triggered direction latches
    Movement,
    /// Continuous relative mouse movement
    Look,
}

/// A control that can own a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlSlot {
    Stick(StickSide),
    Button(ControlId),
}

impl ControlSlot {
    /// Whether calibrating `target` suspends this slot.
    pub fn is_calibrating(&self, target: Option<ControlId>) -> bool {
        match (self, target) {
            (ControlSlot::Button(id), Some(t)) => *id == t,
            (ControlSlot::Stick(side), Some(t)) => Joystick::owns_control(*side, t),
            _ => false,
        }
    }
}

/// Hit-test order: joysticks, face buttons, D-pad, shoulders, system buttons.
pub const HIT_ORDER: [ControlSlot; 16] = [
    ControlSlot::Stick(StickSide::Left),
    ControlSlot::Stick(StickSide::Right),
    ControlSlot::Button(ControlId::ButtonA),
    ControlSlot::Button(ControlId::ButtonB),
    ControlSlot::Button(ControlId::ButtonX),
    ControlSlot::Button(ControlId::ButtonY),
    ControlSlot::Button(ControlId::ButtonDpadUp),
    ControlSlot::Button(ControlId::ButtonDpadDown),
    ControlSlot::Button(ControlId::ButtonDpadLeft),
    ControlSlot::Button(ControlId::ButtonDpadRight),
    ControlSlot::Button(ControlId::ButtonLb),
    ControlSlot::Button(ControlId::ButtonLt),
    ControlSlot::Button(ControlId::ButtonRb),
    ControlSlot::Button(ControlId::ButtonRt),
    ControlSlot::Button(ControlId::ButtonSelect),
    ControlSlot::Button(ControlId::ButtonStart),
];

/// Everything a control may touch while handling an event.
pub struct ControlContext<'a> {
    pub synth: &'a mut Synthesizer,
    pub mapping: &'a Mapping,
    pub diagnostics: &'a mut Diagnostics,
    pub settings: &'a Settings,
    pub now: Instant,
}

/// Result of routing a pointer-down to a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownOutcome {
    /// The control now tracks the pointer
    Bound,
    /// The touch was used up (double tap) and must not be bound
    Consumed,
}

/// Result of routing a pointer-move to its control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Tracking,
    /// The pointer left a button; the button released and dropped it
    Released,
}

/// All controls of one layout.
pub struct ControlSet {
    layout: Layout,
    left: Joystick,
    right: Joystick,
    buttons: Vec<ButtonControl>,
}

impl ControlSet {
    pub fn new(settings: &Settings) -> Self {
        let layout = settings.layout.clone();
        let buttons = HIT_ORDER
            .iter()
            .filter_map(|slot| match slot {
                ControlSlot::Button(id) => Some(ButtonControl::new(*id)),
                ControlSlot::Stick(_) => None,
            })
            .collect();

        Self {
            left: Joystick::new(StickSide::Left, settings.left_stick_mode, layout.left_stick),
            right: Joystick::new(
                StickSide::Right,
                settings.right_stick_mode,
                layout.right_stick,
            ),
            buttons,
            layout,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// First slot in hit order containing `p` for which `available` holds.
    pub fn hit_test(
        &self,
        p: Point,
        mut available: impl FnMut(ControlSlot) -> bool,
    ) -> Option<ControlSlot> {
        HIT_ORDER
            .iter()
            .copied()
            .find(|slot| self.contains(*slot, p) && available(*slot))
    }

    pub fn contains(&self, slot: ControlSlot, p: Point) -> bool {
        match slot {
            ControlSlot::Stick(side) => self.stick(side).region().contains(p),
            ControlSlot::Button(id) => self
                .layout
                .button_region(id)
                .map(|region| region.contains(p))
                .unwrap_or(false),
        }
    }

    pub fn stick(&self, side: StickSide) -> &Joystick {
        match side {
            StickSide::Left => &self.left,
            StickSide::Right => &self.right,
        }
    }

    pub fn stick_mut(&mut self, side: StickSide) -> &mut Joystick {
        match side {
            StickSide::Left => &mut self.left,
            StickSide::Right => &mut self.right,
        }
    }

    pub fn button(&self, id: ControlId) -> Option<&ButtonControl> {
        self.buttons.iter().find(|b| b.id() == id)
    }

    fn button_mut(&mut self, id: ControlId) -> Option<&mut ButtonControl> {
        self.buttons.iter_mut().find(|b| b.id() == id)
    }

    pub fn pointer_down(
        &mut self,
        slot: ControlSlot,
        p: Point,
        ctx: &mut ControlContext<'_>,
    ) -> DownOutcome {
        match slot {
            ControlSlot::Stick(side) => match self.stick_mut(side).pointer_down(p, ctx) {
                StickDown::Tracking => DownOutcome::Bound,
                StickDown::ThumbClick => DownOutcome::Consumed,
            },
            ControlSlot::Button(id) => {
                if let Some(button) = self.button_mut(id) {
                    button.press(ctx);
                }
                DownOutcome::Bound
            }
        }
    }

    pub fn pointer_move(
        &mut self,
        slot: ControlSlot,
        p: Point,
        ctx: &mut ControlContext<'_>,
    ) -> MoveOutcome {
        match slot {
            ControlSlot::Stick(side) => {
                self.stick_mut(side).pointer_move(p, ctx);
                MoveOutcome::Tracking
            }
            ControlSlot::Button(id) => {
                if self.contains(slot, p) {
                    return MoveOutcome::Tracking;
                }
                if let Some(button) = self.button_mut(id) {
                    button.release(ctx);
                }
                MoveOutcome::Released
            }
        }
    }

    /// Returns the control to rest, releasing whatever it asserted.
    pub fn release(&mut self, slot: ControlSlot, ctx: &mut ControlContext<'_>) {
        match slot {
            ControlSlot::Stick(side) => self.stick_mut(side).reset(ctx),
            ControlSlot::Button(id) => {
                if let Some(button) = self.button_mut(id) {
                    button.release(ctx);
                }
            }
        }
    }

    /// Runs due timers of every control.
    pub fn advance(&mut self, ctx: &mut ControlContext<'_>) {
        self.left.advance(ctx);
        self.right.advance(ctx);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(self.left.next_deadline(), self.right.next_deadline())
    }

    pub fn pressed_buttons(&self) -> Vec<ControlId> {
        self.buttons
            .iter()
            .filter(|b| b.is_pressed())
            .map(|b| b.id())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_order_starts_with_sticks_and_ends_with_system() {
        assert_eq!(HIT_ORDER[0], ControlSlot::Stick(StickSide::Left));
        assert_eq!(HIT_ORDER[1], ControlSlot::Stick(StickSide::Right));
        assert_eq!(HIT_ORDER[15], ControlSlot::Button(ControlId::ButtonStart));
    }

    #[test]
    fn hit_test_skips_unavailable_slots() {
        let controls = ControlSet::new(&Settings::default());
        let centre = controls.layout().left_stick.center;
        assert_eq!(
            controls.hit_test(centre, |_| true),
            Some(ControlSlot::Stick(StickSide::Left))
        );
        assert_eq!(controls.hit_test(centre, |_| false), None);
        assert_eq!(controls.hit_test(Point::new(640.0, 300.0), |_| true), None);
    }

    #[test]
    fn calibrating_a_stick_direction_suspends_the_stick() {
        let slot = ControlSlot::Stick(StickSide::Left);
        assert!(slot.is_calibrating(Some(ControlId::JoystickLeftUp)));
        assert!(slot.is_calibrating(Some(ControlId::ButtonL3)));
        assert!(!slot.is_calibrating(Some(ControlId::JoystickRightUp)));
        assert!(!slot.is_calibrating(None));
        assert!(ControlSlot::Button(ControlId::ButtonA).is_calibrating(Some(ControlId::ButtonA)));
    }
}
