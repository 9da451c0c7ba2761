//! Vector helpers and axis-aligned bounding boxes.
//!
//! Vectors are plain `glam::DVec3` values. [`VectorExt`] adds the operations
//! the transport loop needs that glam does not provide directly, in both a
//! copying and an in-place form.

pub use glam::{DQuat, DVec3, EulerRot};

use std::fmt;

/// Absolute padding applied to box tests so that flat boxes and polygons
/// lying exactly on a box face are never missed.
pub const EPS_BOX: f64 = 1e-7;

/// Directions shorter than this are treated as parallel to an axis slab.
const EPS_PARALLEL: f64 = 1e-15;

/// Rotation and frame helpers for `DVec3`.
pub trait VectorExt: Sized {
    /// Rotate about `axis` by `angle` radians (right-handed) and return the result.
    fn rotated_around(self, axis: Self, angle: f64) -> Self;

    /// Rotate in place about `axis` by `angle` radians.
    fn rotate_around(&mut self, axis: Self, angle: f64);

    /// Some unit vector orthogonal to `self`.
    fn any_perpendicular(self) -> Self;
}

impl VectorExt for DVec3 {
    #[inline]
    fn rotated_around(self, axis: DVec3, angle: f64) -> DVec3 {
        let k = axis.normalize_or_zero();
        if k == DVec3::ZERO || angle == 0.0 {
            return self;
        }
        // Rodrigues
        let (sin, cos) = angle.sin_cos();
        self * cos + k.cross(self) * sin + k * k.dot(self) * (1.0 - cos)
    }

    #[inline]
    fn rotate_around(&mut self, axis: DVec3, angle: f64) {
        *self = self.rotated_around(axis, angle);
    }

    #[inline]
    fn any_perpendicular(self) -> DVec3 {
        self.any_orthogonal_vector().normalize_or_zero()
    }
}

/// Axis-aligned bounding box made of three closed intervals.
#[derive(Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingBox {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    /// Box spanning two corners, in any order.
    #[inline]
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    #[inline]
    pub fn from_point(p: DVec3) -> Self {
        Self { min: p, max: p }
    }

    /// Minimal box enclosing all points. Empty for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = DVec3>>(points: I) -> Self {
        let mut b = Self::EMPTY;
        for p in points {
            b.expand_by_point(p);
        }
        b
    }

    /// Minimal box enclosing all boxes.
    pub fn from_boxes<'a, I: IntoIterator<Item = &'a BoundingBox>>(boxes: I) -> Self {
        let mut b = Self::EMPTY;
        for other in boxes {
            b.expand_by_box(other);
        }
        b
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn expand_by_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Union of two boxes.
    #[inline]
    pub fn union(mut self, other: &Self) -> Self {
        self.expand_by_box(other);
        self
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Surface area, `2 (w h + h d + d w)`. Zero for an empty box.
    #[inline]
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let s = self.size();
        2.0 * (s.x * s.y + s.y * s.z + s.z * s.x)
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Same box grown by `eps` on every side.
    #[inline]
    pub fn padded(&self, eps: f64) -> Self {
        Self {
            min: self.min - DVec3::splat(eps),
            max: self.max + DVec3::splat(eps),
        }
    }

    /// Same box with the lower bound on `axis` replaced.
    #[inline]
    pub fn with_min(mut self, axis: usize, value: f64) -> Self {
        self.min[axis] = value;
        self
    }

    /// Same box with the upper bound on `axis` replaced.
    #[inline]
    pub fn with_max(mut self, axis: usize, value: f64) -> Self {
        self.max[axis] = value;
        self
    }

    /// Closed containment test.
    #[inline]
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Whether `other` lies entirely inside (closed), up to `eps`.
    #[inline]
    pub fn contains_box(&self, other: &Self, eps: f64) -> bool {
        let outer = self.padded(eps);
        other.min.cmpge(outer.min).all() && other.max.cmple(outer.max).all()
    }

    /// Closed overlap test.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Volume shared by two boxes; zero when they only touch.
    pub fn overlap_volume(&self, other: &Self) -> f64 {
        let lo = self.min.max(other.min);
        let hi = self.max.min(other.max);
        let s = (hi - lo).max(DVec3::ZERO);
        s.x * s.y * s.z
    }

    /// Distance along a ray to where it enters the (padded) box.
    ///
    /// Slab test limited to `[0, max_distance]`. Returns `Some(0.0)` when the
    /// origin is already inside. `direction` need not be normalized; the
    /// returned value is in units of `direction`.
    pub fn ray_entry(&self, origin: DVec3, direction: DVec3, max_distance: f64) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let mut t_near = 0.0_f64;
        let mut t_far = max_distance;
        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            let lo = self.min[axis] - EPS_BOX;
            let hi = self.max[axis] + EPS_BOX;
            if d.abs() < EPS_PARALLEL {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (mut t0, mut t1) = ((lo - o) * inv, (hi - o) * inv);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_near = t_near.max(t0);
            t_far = t_far.min(t1);
            if t_near > t_far {
                return None;
            }
        }
        Some(t_near)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundingBox({:?} - {:?})", self.min, self.max)
    }
}
