//! # Calibration Coordinator
//!
//! ```text
//!            start(C)                    capture / deadline / cancel
//!   Idle ─────────────► Awaiting(C, t) ─────────────────────────────► Idle
//!                          │   ▲
//!                          └───┘ start(D): C is cancelled first
//! ```
//!
//! While awaiting, the next physical key or mouse button is captured,
//! normalized to an action string and written into the active mapping.

use crate::config::CALIBRATION_TIMEOUT;
use crate::diagnostics::{Category, Diagnostics};
use crate::engine::timer::Timer;
use crate::input::PhysicalInput;
use crate::profile::{ControlId, Mapping};
use crate::synth::MouseButton;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Idle,
    Awaiting { target: ControlId, deadline: Instant },
}

/// What happened to a physical input offered to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Not calibrating; the input belongs to the host
    Idle,
    /// Calibrating, but the input cannot be bound (e.g. mouse button 4)
    Ignored,
    Captured { target: ControlId, action: String },
}

impl Capture {
    pub fn consumed(&self) -> bool {
        !matches!(self, Capture::Idle)
    }
}

#[derive(Debug)]
pub struct CalibrationCoordinator {
    state: CalibrationState,
    timer: Timer,
}

impl Default for CalibrationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationCoordinator {
    pub fn new() -> Self {
        Self {
            state: CalibrationState::Idle,
            timer: Timer::new(),
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn target(&self) -> Option<ControlId> {
        match self.state {
            CalibrationState::Awaiting { target, .. } => Some(target),
            CalibrationState::Idle => None,
        }
    }

    /// Starts awaiting input for `target`, cancelling any pending session.
    pub fn start(&mut self, target: ControlId, now: Instant, diagnostics: &mut Diagnostics) {
        if let Some(previous) = self.target() {
            diagnostics.info(
                now,
                Category::Calibration,
                format!("Calibration of {} cancelled for {}", previous, target),
            );
        }
        self.timer.arm(now, CALIBRATION_TIMEOUT);
        self.state = CalibrationState::Awaiting {
            target,
            deadline: now + CALIBRATION_TIMEOUT,
        };
        diagnostics.info(
            now,
            Category::Calibration,
            format!("Calibrating {}: press a key...", target),
        );
    }

    /// Drops a pending session without touching the mapping.
    pub fn cancel(&mut self, now: Instant, diagnostics: &mut Diagnostics) {
        if let Some(target) = self.target() {
            diagnostics.info(
                now,
                Category::Calibration,
                format!("Calibration of {} cancelled", target),
            );
        }
        self.idle();
    }

    /// Offers a physical input. On capture the action is written into
    /// `mapping`.
    pub fn on_physical_input(
        &mut self,
        input: &PhysicalInput,
        mapping: &mut Mapping,
        now: Instant,
        diagnostics: &mut Diagnostics,
    ) -> Capture {
        if self.expire(now, diagnostics).is_some() {
            return Capture::Idle;
        }
        let Some(target) = self.target() else {
            return Capture::Idle;
        };
        let Some(action) = capture_action(input) else {
            diagnostics.debug(
                now,
                Category::Calibration,
                format!("Ignoring {:?} while calibrating {}", input, target),
            );
            return Capture::Ignored;
        };

        let previous = mapping.get(target).unwrap_or("unset").to_string();
        mapping.set(target, action.clone());
        self.idle();
        diagnostics.info(
            now,
            Category::Calibration,
            format!("{} calibrated: {:?} (was {:?})", target, action, previous),
        );
        Capture::Captured { target, action }
    }

    /// Ends an expired session. Returns the control that timed out.
    pub fn expire(&mut self, now: Instant, diagnostics: &mut Diagnostics) -> Option<ControlId> {
        if !self.timer.fire(now) {
            return None;
        }
        let target = self.target();
        self.idle();
        if let Some(target) = target {
            diagnostics.info(
                now,
                Category::Calibration,
                format!("Calibration of {} timed out", target),
            );
        }
        target
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    fn idle(&mut self) {
        self.timer.cancel();
        self.state = CalibrationState::Idle;
    }
}

/// Normalizes a physical input into the action string stored in a mapping.
///
/// Mouse buttons other than left, middle and right cannot be bound.
pub fn capture_action(input: &PhysicalInput) -> Option<String> {
    match input {
        PhysicalInput::MouseButton(index) => {
            MouseButton::from_index(*index).map(|b| b.action().to_string())
        }
        PhysicalInput::Key(key) => {
            let action = match key.as_str() {
                "Escape" => "esc".to_string(),
                " " => " ".to_string(),
                "Control" => "ctrl".to_string(),
                "Shift" => "shift".to_string(),
                "Alt" => "alt".to_string(),
                "Tab" => "tab".to_string(),
                "Enter" => "enter".to_string(),
                "Backspace" => "backspace".to_string(),
                k if k.starts_with("Arrow") => k.to_string(),
                k if is_function_key(k) => k.to_uppercase(),
                k if k.chars().count() == 1 => k.to_lowercase(),
                "" => return None,
                k => k.to_string(),
            };
            Some(action)
        }
    }
}

fn is_function_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix('F').or_else(|| key.strip_prefix('f')) else {
        return false;
    };
    matches!(rest.parse::<u8>(), Ok(1..=24))
}
