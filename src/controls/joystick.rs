//! Virtual analog stick
//!
//! ```text
//!  touch ──► offset from centre ──► / max throw ──► clamp |v| ≤ 1 ──► dead zone
//!                                                                         │
//!                      ┌──────────────────────────────────────────────────┤
//!                      ▼                                                  ▼
//!        Movement: 4 edge-triggered latches            Look: vector read by a 16 ms ticker
//! ```

use super::geometry::{Circle, Point, Vector};
use super::{ControlContext, StickMode, StickSide};
use crate::diagnostics::Category;
use crate::engine::timer::{earliest, Ticker, Timer};
use crate::profile::ControlId;
use crate::synth::synthesizer::{LOOK_SPEED_SCALE, LOOK_TICK};
use crate::synth::KeyState;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Maximum throw as a fraction of the stick radius.
pub const MAX_THROW_FRACTION: f32 = 0.35;
/// Axis value a direction latch activates above.
pub const ACTIVATION_THRESHOLD: f32 = 0.1;
/// Look vector component needed to start the ticker.
pub const LOOK_START_EPSILON: f32 = 0.01;
/// Look vector component needed for a tick to emit.
pub const LOOK_EMIT_EPSILON: f32 = 0.001;
/// Travel in pixels after which a touch no longer counts as a tap.
pub const TAP_MOVE_TOLERANCE: f32 = 5.0;
/// How long a synthesized thumb click is held.
pub const THUMB_CLICK_HOLD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Screen coordinates: y grows downward, so "up" is negative y.
    pub fn is_active(self, v: Vector) -> bool {
        match self {
            Direction::Up => v.y < -ACTIVATION_THRESHOLD,
            Direction::Down => v.y > ACTIVATION_THRESHOLD,
            Direction::Left => v.x < -ACTIVATION_THRESHOLD,
            Direction::Right => v.x > ACTIVATION_THRESHOLD,
        }
    }

    pub fn control(self, side: StickSide) -> ControlId {
        match (side, self) {
            (StickSide::Left, Direction::Up) => ControlId::JoystickLeftUp,
            (StickSide::Left, Direction::Down) => ControlId::JoystickLeftDown,
            (StickSide::Left, Direction::Left) => ControlId::JoystickLeftLeft,
            (StickSide::Left, Direction::Right) => ControlId::JoystickLeftRight,
            (StickSide::Right, Direction::Up) => ControlId::JoystickRightUp,
            (StickSide::Right, Direction::Down) => ControlId::JoystickRightDown,
            (StickSide::Right, Direction::Left) => ControlId::JoystickRightLeft,
            (StickSide::Right, Direction::Right) => ControlId::JoystickRightRight,
        }
    }
}

/// Radial dead zone.
///
/// Magnitudes up to `dead_zone` collapse to zero; the rest of the range is
/// rescaled so the boundary maps to 0 and full throw still maps to 1. The
/// direction is preserved.
pub fn apply_dead_zone(v: Vector, dead_zone: f32) -> Vector {
    let magnitude = v.magnitude();
    if magnitude <= dead_zone || magnitude == 0.0 {
        return Vector::ZERO;
    }
    let scaled = ((magnitude - dead_zone) / (1.0 - dead_zone)).min(1.0);
    Vector::new(v.x / magnitude * scaled, v.y / magnitude * scaled)
}

/// Returned by [`Joystick::pointer_down`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickDown {
    Tracking,
    /// Second tap inside the double-tap window: a thumb click was sent
    ThumbClick,
}

#[derive(Debug, Clone, Default)]
struct Latch {
    active: bool,
    /// Action sent on activation; released on deactivation even if the
    /// mapping changed in between.
    sent: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct TapCandidate {
    at: Instant,
    origin: Point,
    moved: bool,
}

pub struct Joystick {
    side: StickSide,
    mode: StickMode,
    region: Circle,
    position: Vector,
    latches: [Latch; 4],
    look: Vector,
    look_ticker: Ticker,
    tap: Option<TapCandidate>,
    click: Option<String>,
    click_timer: Timer,
}

impl Joystick {
    pub fn new(side: StickSide, mode: StickMode, region: Circle) -> Self {
        Self {
            side,
            mode,
            region,
            position: Vector::ZERO,
            latches: Default::default(),
            look: Vector::ZERO,
            look_ticker: Ticker::new(LOOK_TICK),
            tap: None,
            click: None,
            click_timer: Timer::new(),
        }
    }

    pub fn thumb_control(side: StickSide) -> ControlId {
        match side {
            StickSide::Left => ControlId::ButtonL3,
            StickSide::Right => ControlId::ButtonR3,
        }
    }

    /// Whether `id` is one of this stick's directions or its thumb click.
    pub fn owns_control(side: StickSide, id: ControlId) -> bool {
        id == Self::thumb_control(side) || Direction::ALL.iter().any(|d| d.control(side) == id)
    }

    pub fn side(&self) -> StickSide {
        self.side
    }

    pub fn mode(&self) -> StickMode {
        self.mode
    }

    pub fn region(&self) -> Circle {
        self.region
    }

    pub fn max_throw(&self) -> f32 {
        self.region.radius * MAX_THROW_FRACTION
    }

    /// Normalized position after the dead zone.
    pub fn position(&self) -> Vector {
        self.position
    }

    pub fn is_active(&self, direction: Direction) -> bool {
        self.latches[direction.index()].active
    }

    pub fn active_directions(&self) -> Vec<Direction> {
        Direction::ALL
            .iter()
            .copied()
            .filter(|d| self.is_active(*d))
            .collect()
    }

    pub fn look_vector(&self) -> Vector {
        self.look
    }

    pub fn is_looking(&self) -> bool {
        self.look_ticker.is_running()
    }

    pub fn thumb_click_held(&self) -> bool {
        self.click.is_some()
    }

    /// Normalized, dead-zoned vector for a touch at `p`.
    pub fn normalize(&self, p: Point, dead_zone: f32) -> Vector {
        let throw = self.max_throw();
        if throw <= 0.0 {
            return Vector::ZERO;
        }
        let mut v = Vector::new(
            (p.x - self.region.center.x) / throw,
            (p.y - self.region.center.y) / throw,
        );
        let magnitude = v.magnitude();
        if magnitude > 1.0 {
            v = Vector::new(v.x / magnitude, v.y / magnitude);
        }
        apply_dead_zone(v, dead_zone)
    }

    pub fn pointer_down(&mut self, p: Point, ctx: &mut ControlContext<'_>) -> StickDown {
        if ctx.settings.clickable_thumbsticks {
            let window = ctx.settings.double_tap_window();
            let double_tap = self
                .tap
                .map(|tap| !tap.moved && ctx.now.duration_since(tap.at) < window)
                .unwrap_or(false);
            if double_tap {
                self.tap = None;
                self.thumb_click(ctx);
                return StickDown::ThumbClick;
            }
        }

        self.tap = Some(TapCandidate {
            at: ctx.now,
            origin: p,
            moved: false,
        });
        debug!("{:?} stick: touch started", self.side);
        self.track(p, ctx);
        StickDown::Tracking
    }

    pub fn pointer_move(&mut self, p: Point, ctx: &mut ControlContext<'_>) {
        if let Some(tap) = &mut self.tap {
            if tap.origin.distance(p) > TAP_MOVE_TOLERANCE {
                tap.moved = true;
            }
        }
        self.track(p, ctx);
    }

    fn track(&mut self, p: Point, ctx: &mut ControlContext<'_>) {
        self.position = self.normalize(p, ctx.settings.dead_zone);
        match self.mode {
            StickMode::Movement => self.update_latches(ctx),
            StickMode::Look => {
                self.look = self.position;
                if self.look.exceeds(LOOK_START_EPSILON) {
                    self.look_ticker.start(ctx.now);
                }
            }
        }
    }

    fn update_latches(&mut self, ctx: &mut ControlContext<'_>) {
        for direction in Direction::ALL {
            let active = direction.is_active(self.position);
            let latch = &mut self.latches[direction.index()];
            if latch.active == active {
                continue;
            }
            latch.active = active;
            let control = direction.control(self.side);

            if active {
                if let Some(action) = ctx.mapping.get(control) {
                    ctx.synth.send_key(action, KeyState::Down, ctx.now);
                    ctx.diagnostics
                        .debug(ctx.now, Category::Input, format!("{} down ({:?})", control, action));
                    latch.sent = Some(action.to_string());
                }
            } else if let Some(action) = latch.sent.take() {
                ctx.synth.send_key(&action, KeyState::Up, ctx.now);
                ctx.diagnostics
                    .debug(ctx.now, Category::Input, format!("{} up ({:?})", control, action));
            }
        }
    }

    /// Back to rest: every active latch releases exactly once and look stops.
    pub fn reset(&mut self, ctx: &mut ControlContext<'_>) {
        self.position = Vector::ZERO;
        self.update_latches(ctx);
        self.look_ticker.stop();
        self.look = Vector::ZERO;
        debug!("{:?} stick: reset", self.side);
    }

    fn thumb_click(&mut self, ctx: &mut ControlContext<'_>) {
        self.release_click(ctx);

        let control = Self::thumb_control(self.side);
        match ctx.mapping.get(control) {
            Some(action) => {
                ctx.synth.send_key(action, KeyState::Down, ctx.now);
                self.click = Some(action.to_string());
                self.click_timer.arm(ctx.now, THUMB_CLICK_HOLD);
                ctx.diagnostics.info(
                    ctx.now,
                    Category::Input,
                    format!("{:?} stick double tap: {} ({:?})", self.side, control, action),
                );
            }
            None => {
                ctx.diagnostics.debug(
                    ctx.now,
                    Category::Input,
                    format!("{:?} stick double tap: {} unmapped", self.side, control),
                );
            }
        }
    }

    fn release_click(&mut self, ctx: &mut ControlContext<'_>) {
        self.click_timer.cancel();
        if let Some(action) = self.click.take() {
            ctx.synth.send_key(&action, KeyState::Up, ctx.now);
        }
    }

    /// Runs the thumb-click release and the look ticker.
    pub fn advance(&mut self, ctx: &mut ControlContext<'_>) {
        if self.click_timer.fire(ctx.now) {
            self.release_click(ctx);
        }
        if self.look_ticker.poll(ctx.now) && self.look.exceeds(LOOK_EMIT_EPSILON) {
            let speed = ctx.settings.look_sensitivity * LOOK_SPEED_SCALE;
            ctx.synth
                .send_mouse_move(self.look.x * speed, self.look.y * speed);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(self.look_ticker.deadline(), self.click_timer.deadline())
    }
}
