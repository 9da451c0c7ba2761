//! Splitting convex polygons by axis-aligned planes.

use smallvec::SmallVec;

use crate::util::DVec3;

pub type Loop = SmallVec<[DVec3; 6]>;

/// Sutherland-Hodgman clip of a convex loop against the plane `p[axis] = position`.
///
/// Returns the parts on the low and high side. Vertices on the plane go to
/// both parts; new vertices are created where edges cross the plane and are
/// snapped onto it. A part with fewer than three vertices is returned empty.
pub fn split_loop(points: &[DVec3], axis: usize, position: f64) -> (Loop, Loop) {
    let mut low = Loop::new();
    let mut high = Loop::new();
    for (i, &p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        let dp = p[axis] - position;
        let dq = q[axis] - position;
        if dp <= 0.0 {
            low.push(p);
        }
        if dp >= 0.0 {
            high.push(p);
        }
        if (dp < 0.0 && dq > 0.0) || (dp > 0.0 && dq < 0.0) {
            let t = dp / (dp - dq);
            let mut x = p + (q - p) * t;
            x[axis] = position;
            low.push(x);
            high.push(x);
        }
    }
    if low.len() < 3 {
        low.clear();
    }
    if high.len() < 3 {
        high.clear();
    }
    (low, high)
}
