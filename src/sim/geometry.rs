//! Containment tests used by apertures and tissue zones
//!
//! Both tests are inclusive: a point exactly on the boundary is inside.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Check if `point` lies inside (or on) the circle at `center` with `radius`
#[inline]
pub fn within_radius(point: Vec2, center: Vec2, radius: f32) -> bool {
    point.distance(center) <= radius
}

/// Axis-aligned box described by its center and half-extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vec2,
    pub half_extent: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, half_extent: Vec2) -> Self {
        Self {
            center,
            half_extent,
        }
    }

    /// Build from a full width/height
    pub fn from_size(center: Vec2, size: Vec2) -> Self {
        Self::new(center, size / 2.0)
    }

    /// Full width/height of the box
    #[inline]
    pub fn size(&self) -> Vec2 {
        self.half_extent * 2.0
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let d = (point - self.center).abs();
        d.x <= self.half_extent.x && d.y <= self.half_extent.y
    }
}
