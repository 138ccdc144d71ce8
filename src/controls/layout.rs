//! On-screen placement of every control

use super::geometry::{ButtonTransform, Circle, ClusterSquare, HitRegion, Point, Rect};
use super::StickSide;
use crate::profile::ControlId;
use serde::{Deserialize, Serialize};

const STICK_RADIUS: f32 = 75.0;
const EDGE_MARGIN: f32 = 30.0;
const FACE_SIZE: f32 = 200.0;
const DPAD_SIZE: f32 = 120.0;
const CLUSTER_TOP: f32 = 130.0;
const SHOULDER_WIDTH: f32 = 100.0;
const SHOULDER_HEIGHT: f32 = 40.0;
const SHOULDER_GAP: f32 = 10.0;
const SYSTEM_WIDTH: f32 = 80.0;
const SYSTEM_HEIGHT: f32 = 40.0;
const SYSTEM_BOTTOM: f32 = 80.0;
const SYSTEM_GAP: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// Where every control sits, in viewport pixels.
///
/// Joysticks are circles. Face buttons and the D-pad are laid out inside
/// their cluster square through a [`ButtonTransform`]; shoulders and system
/// buttons are plain rectangles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub viewport: Viewport,
    pub left_stick: Circle,
    pub right_stick: Circle,
    pub face: ClusterSquare,
    pub dpad: ClusterSquare,
    pub lb: Rect,
    pub lt: Rect,
    pub rb: Rect,
    pub rt: Rect,
    pub select: Rect,
    pub start: Rect,
}

impl Default for Layout {
    fn default() -> Self {
        Self::for_viewport(1280.0, 720.0)
    }
}

impl Layout {
    /// Default arrangement for a viewport of the given size.
    pub fn for_viewport(width: f32, height: f32) -> Self {
        let stick_y = height - EDGE_MARGIN - STICK_RADIUS;
        let system_y = height - SYSTEM_BOTTOM - SYSTEM_HEIGHT;
        let centre_x = width / 2.0;
        let right_edge = width - EDGE_MARGIN;

        Self {
            viewport: Viewport { width, height },
            left_stick: Circle {
                center: Point::new(EDGE_MARGIN + STICK_RADIUS, stick_y),
                radius: STICK_RADIUS,
            },
            right_stick: Circle {
                center: Point::new(right_edge - STICK_RADIUS, stick_y),
                radius: STICK_RADIUS,
            },
            face: ClusterSquare {
                origin: Point::new(right_edge - FACE_SIZE, CLUSTER_TOP),
                size: FACE_SIZE,
            },
            dpad: ClusterSquare {
                origin: Point::new(EDGE_MARGIN, CLUSTER_TOP),
                size: DPAD_SIZE,
            },
            lb: Rect::new(EDGE_MARGIN, EDGE_MARGIN, SHOULDER_WIDTH, SHOULDER_HEIGHT),
            lt: Rect::new(
                EDGE_MARGIN + SHOULDER_WIDTH + SHOULDER_GAP,
                EDGE_MARGIN,
                SHOULDER_WIDTH,
                SHOULDER_HEIGHT,
            ),
            rt: Rect::new(
                right_edge - 2.0 * SHOULDER_WIDTH - SHOULDER_GAP,
                EDGE_MARGIN,
                SHOULDER_WIDTH,
                SHOULDER_HEIGHT,
            ),
            rb: Rect::new(
                right_edge - SHOULDER_WIDTH,
                EDGE_MARGIN,
                SHOULDER_WIDTH,
                SHOULDER_HEIGHT,
            ),
            select: Rect::new(
                centre_x - SYSTEM_GAP / 2.0 - SYSTEM_WIDTH,
                system_y,
                SYSTEM_WIDTH,
                SYSTEM_HEIGHT,
            ),
            start: Rect::new(
                centre_x + SYSTEM_GAP / 2.0,
                system_y,
                SYSTEM_WIDTH,
                SYSTEM_HEIGHT,
            ),
        }
    }

    pub fn stick(&self, side: StickSide) -> Circle {
        match side {
            StickSide::Left => self.left_stick,
            StickSide::Right => self.right_stick,
        }
    }

    /// Rendered hit region of a button, computed from the current layout.
    ///
    /// Returns `None` for ids that are not standalone buttons (stick
    /// directions and thumb clicks).
    pub fn button_region(&self, id: ControlId) -> Option<HitRegion> {
        let region = match id {
            ControlId::ButtonA => self.face_button(90.0),
            ControlId::ButtonB => self.face_button(0.0),
            ControlId::ButtonX => self.face_button(180.0),
            ControlId::ButtonY => self.face_button(270.0),
            ControlId::ButtonDpadUp => self.dpad_button(270.0),
            ControlId::ButtonDpadDown => self.dpad_button(90.0),
            ControlId::ButtonDpadLeft => self.dpad_button(180.0),
            ControlId::ButtonDpadRight => self.dpad_button(0.0),
            ControlId::ButtonLb => HitRegion::Rect(self.lb),
            ControlId::ButtonLt => HitRegion::Rect(self.lt),
            ControlId::ButtonRb => HitRegion::Rect(self.rb),
            ControlId::ButtonRt => HitRegion::Rect(self.rt),
            ControlId::ButtonSelect => HitRegion::Rect(self.select),
            ControlId::ButtonStart => HitRegion::Rect(self.start),
            _ => return None,
        };
        Some(region)
    }

    fn face_button(&self, angle: f32) -> HitRegion {
        HitRegion::Circle(ButtonTransform::at(angle).render(&self.face))
    }

    fn dpad_button(&self, angle: f32) -> HitRegion {
        HitRegion::Circle(ButtonTransform::at(angle).render(&self.dpad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::HIT_ORDER;
    use crate::controls::ControlSlot;

    fn centre_of(region: HitRegion) -> Point {
        match region {
            HitRegion::Circle(c) => c.center,
            HitRegion::Rect(r) => Point::new(r.x + r.width / 2.0, r.y + r.height / 2.0),
        }
    }

    #[test]
    fn default_sticks_sit_in_bottom_corners() {
        let layout = Layout::default();
        assert_eq!(layout.left_stick.center, Point::new(105.0, 615.0));
        assert_eq!(layout.right_stick.center, Point::new(1175.0, 615.0));
    }

    #[test]
    fn face_a_is_below_y() {
        let layout = Layout::default();
        let a = centre_of(layout.button_region(ControlId::ButtonA).unwrap());
        let y = centre_of(layout.button_region(ControlId::ButtonY).unwrap());
        assert!(a.y > y.y);
    }

    #[test]
    fn every_button_centre_hits_only_itself() {
        let layout = Layout::default();
        for slot in HIT_ORDER {
            let ControlSlot::Button(id) = slot else {
                continue;
            };
            let centre = centre_of(layout.button_region(id).unwrap());
            for other in HIT_ORDER {
                let hit = match other {
                    ControlSlot::Stick(side) => layout.stick(side).contains(centre),
                    ControlSlot::Button(o) => layout.button_region(o).unwrap().contains(centre),
                };
                assert_eq!(hit, other == slot, "{id} centre also hits {other:?}");
            }
        }
    }

    #[test]
    fn thumb_clicks_have_no_region() {
        assert!(Layout::default().button_region(ControlId::ButtonL3).is_none());
        assert!(Layout::default()
            .button_region(ControlId::JoystickLeftUp)
            .is_none());
    }

    #[test]
    fn layout_survives_toml() {
        let layout = Layout::for_viewport(1920.0, 1080.0);
        let text = toml::to_string_pretty(&layout).unwrap();
        let parsed: Layout = toml::from_str(&text).unwrap();
        assert_eq!(parsed, layout);
    }
}
