//! Finite or infinite rays.

use crate::util::DVec3;

/// A half-line from `origin` along a unit `direction`, limited to `length`
/// (which may be `f64::INFINITY`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
    pub length: f64,
}

impl Ray {
    /// Build a ray, normalizing `direction`.
    ///
    /// A zero direction is kept as zero: such a ray intersects nothing.
    pub fn new(origin: DVec3, direction: DVec3, length: f64) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            length,
        }
    }

    /// Ray of unlimited length.
    pub fn infinite(origin: DVec3, direction: DVec3) -> Self {
        Self::new(origin, direction, f64::INFINITY)
    }

    #[inline]
    pub fn at(&self, distance: f64) -> DVec3 {
        self.origin + self.direction * distance
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.direction == DVec3::ZERO
    }
}
