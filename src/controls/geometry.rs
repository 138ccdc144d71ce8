//! Screen-space geometry for hit-testing

use serde::{Deserialize, Serialize};

/// A point in viewport pixels (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Normalized stick vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// True when either component exceeds `epsilon` in absolute value.
    pub fn exceeds(&self, epsilon: f32) -> bool {
        self.x.abs() > epsilon || self.y.abs() > epsilon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point,
    pub radius: f32,
}

impl Circle {
    pub fn contains(&self, p: Point) -> bool {
        self.center.distance(p) <= self.radius
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// Rendered hit region of one control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitRegion {
    Circle(Circle),
    Rect(Rect),
}

impl HitRegion {
    pub fn contains(&self, p: Point) -> bool {
        match self {
            HitRegion::Circle(c) => c.contains(p),
            HitRegion::Rect(r) => r.contains(p),
        }
    }
}

/// Side length of the abstract square clusters are drawn in.
pub const CLUSTER_SPACE: f32 = 10.0;
/// Radius of the untransformed button circle, centred in the abstract square.
pub const BASE_RADIUS: f32 = 5.0;
/// Distance each button is pushed out from the cluster centre.
pub const BUTTON_OFFSET: f32 = 2.7;
/// Scale applied to each button circle.
pub const BUTTON_SCALE: f32 = 0.33;

/// Per-button transform inside a cluster:
/// `rotate(angle) translate(offset) rotate(-angle) scale(scale)` about the
/// centre of the abstract square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonTransform {
    pub angle_deg: f32,
    pub offset: f32,
    pub scale: f32,
}

impl ButtonTransform {
    pub const fn at(angle_deg: f32) -> Self {
        Self {
            angle_deg,
            offset: BUTTON_OFFSET,
            scale: BUTTON_SCALE,
        }
    }

    /// Applies the transform and maps the abstract square onto the cluster's
    /// on-screen square, giving the rendered bounding circle.
    pub fn render(&self, cluster: &ClusterSquare) -> Circle {
        let origin = CLUSTER_SPACE / 2.0;
        let theta = self.angle_deg.to_radians();
        let local_x = origin + self.offset * theta.cos();
        let local_y = origin + self.offset * theta.sin();
        let px = cluster.size / CLUSTER_SPACE;
        Circle {
            center: Point::new(cluster.origin.x + local_x * px, cluster.origin.y + local_y * px),
            radius: BASE_RADIUS * self.scale * px,
        }
    }
}

/// On-screen square a cluster is laid out into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterSquare {
    /// Top-left corner in viewport pixels
    pub origin: Point,
    /// Side length in pixels
    pub size: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn right_button_sits_right_of_centre() {
        let cluster = ClusterSquare {
            origin: Point::new(100.0, 50.0),
            size: 200.0,
        };
        let c = ButtonTransform::at(0.0).render(&cluster);
        // centre (5 + 2.7, 5) * 20px
        assert!(approx(c.center.x, 100.0 + 7.7 * 20.0));
        assert!(approx(c.center.y, 50.0 + 5.0 * 20.0));
        assert!(approx(c.radius, 5.0 * 0.33 * 20.0));
    }

    #[test]
    fn ninety_degrees_points_down_on_screen() {
        let cluster = ClusterSquare {
            origin: Point::new(0.0, 0.0),
            size: 10.0,
        };
        let c = ButtonTransform::at(90.0).render(&cluster);
        assert!(approx(c.center.x, 5.0));
        assert!(approx(c.center.y, 7.7));
    }

    #[test]
    fn rect_edges_are_inclusive() {
        let r = Rect::new(10.0, 10.0, 80.0, 40.0);
        assert!(r.contains(Point::new(10.0, 10.0)));
        assert!(r.contains(Point::new(90.0, 50.0)));
        assert!(!r.contains(Point::new(90.1, 50.0)));
    }
}
