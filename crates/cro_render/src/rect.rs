//! Axis aligned rectangles.
//!
//! Rectangles are stored as `left, bottom, width, height` with Y pointing up, matching the
//! orientation of the world and of viewport coordinates.

use glam::{Mat4, Vec2, Vec4};
use serde::{Deserialize, Serialize};

/// A rectangle with float coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatRect {
    /// Left edge.
    pub left: f32,
    /// Bottom edge.
    pub bottom: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl FloatRect {
    /// Create a rectangle.
    pub const fn new(left: f32, bottom: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            bottom,
            width,
            height,
        }
    }

    /// The smallest rectangle containing every point, or an empty rectangle at the origin if
    /// there are none.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::default();
        };
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    /// The right edge.
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    /// The top edge.
    pub fn top(&self) -> f32 {
        self.bottom + self.height
    }

    /// The four corners, counter clockwise from the bottom left.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.left, self.bottom),
            Vec2::new(self.right(), self.bottom),
            Vec2::new(self.right(), self.top()),
            Vec2::new(self.left, self.top()),
        ]
    }

    /// The bounding rectangle of this rectangle after transforming its corners.
    pub fn transform(&self, matrix: &Mat4) -> FloatRect {
        FloatRect::from_points(self.corners().map(|c| {
            let p = *matrix * Vec4::new(c.x, c.y, 0.0, 1.0);
            Vec2::new(p.x, p.y)
        }))
    }

    /// Whether the point is inside the rectangle.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.left
            && point.x < self.right()
            && point.y >= self.bottom
            && point.y < self.top()
    }

    /// Whether the two rectangles overlap.
    pub fn intersects(&self, other: &FloatRect) -> bool {
        self.left < other.right()
            && other.left < self.right()
            && self.bottom < other.top()
            && other.bottom < self.top()
    }

    /// The area of the rectangle.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// A rectangle with integer coordinates, used for viewports and scissor areas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntRect {
    /// Left edge.
    pub left: i32,
    /// Bottom edge.
    pub bottom: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

impl IntRect {
    /// Create a rectangle.
    pub const fn new(left: i32, bottom: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            bottom,
            width,
            height,
        }
    }
}
