//! Planar polygons over a shared vertex arena.
//!
//! A polygon stores indices into its solid's vertex arena, so neighbouring
//! polygons sharing an edge always observe the same coordinates after a
//! transform. Normal, centroid and bounding box are cached and must be
//! invalidated whenever the arena moves.

use smallvec::SmallVec;
use std::sync::Arc;

use super::{Environment, Ray};
use crate::util::{BoundingBox, DVec3};

/// Barycentric slack so that rays through shared edges hit at least one side.
pub const EPS_BARYCENTRIC: f64 = 1e-12;

/// Hits closer than this to the ray origin are ignored.
pub const EPS_HIT: f64 = 1e-10;

/// Determinant below which a ray is treated as parallel to a triangle.
const EPS_DETERMINANT: f64 = 1e-14;

/// Scene-wide polygon handle, stable for the lifetime of a built scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolygonId(pub u32);

impl PolygonId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Derived geometry of a polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonGeometry {
    /// Unit normal pointing from the inside to the outside environment
    pub normal: DVec3,
    pub centroid: DVec3,
    pub bbox: BoundingBox,
}

impl PolygonGeometry {
    /// Compute geometry of an ordered loop of points.
    ///
    /// Uses Newell's method, so a degenerate leading edge does not spoil the
    /// normal. Winding is counter-clockwise seen from the outside.
    pub fn from_points(points: &[DVec3]) -> Self {
        let mut normal = DVec3::ZERO;
        let mut centroid = DVec3::ZERO;
        let mut bbox = BoundingBox::EMPTY;
        for (i, &p) in points.iter().enumerate() {
            let q = points[(i + 1) % points.len()];
            normal.x += (p.y - q.y) * (p.z + q.z);
            normal.y += (p.z - q.z) * (p.x + q.x);
            normal.z += (p.x - q.x) * (p.y + q.y);
            centroid += p;
            bbox.expand_by_point(p);
        }
        if !points.is_empty() {
            centroid /= points.len() as f64;
        }
        Self {
            normal: normal.normalize_or_zero(),
            centroid,
            bbox,
        }
    }
}

/// A triangle or quad of a solid's surface.
#[derive(Debug, Clone)]
pub struct Polygon {
    vertices: SmallVec<[u32; 4]>,
    surface: Arc<str>,
    pub inside: Environment,
    pub outside: Environment,
    cache: Option<PolygonGeometry>,
}

impl Polygon {
    pub fn new(
        vertices: impl IntoIterator<Item = u32>,
        surface: Arc<str>,
        inside: Environment,
        outside: Environment,
    ) -> Self {
        Self {
            vertices: vertices.into_iter().collect(),
            surface,
            inside,
            outside,
            cache: None,
        }
    }

    /// Indices into the owning solid's vertex arena.
    #[inline]
    pub fn vertex_indices(&self) -> &[u32] {
        &self.vertices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn surface_label(&self) -> &Arc<str> {
        &self.surface
    }

    pub fn set_surface_label(&mut self, label: Arc<str>) {
        self.surface = label;
    }

    /// Drop cached geometry; it is recomputed on demand or by [`Polygon::refresh`].
    #[inline]
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Recompute and store cached geometry.
    pub fn refresh(&mut self, arena: &[DVec3]) {
        let points: SmallVec<[DVec3; 4]> = self.vertices.iter().map(|&i| arena[i as usize]).collect();
        self.cache = Some(PolygonGeometry::from_points(&points));
    }

    #[inline]
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Bind the polygon to its vertex arena.
    #[inline]
    pub fn view<'a>(&'a self, arena: &'a [DVec3]) -> PolygonView<'a> {
        PolygonView { polygon: self, arena }
    }

    pub(crate) fn remap_vertices(&mut self, map: impl Fn(u32) -> u32) {
        for v in self.vertices.iter_mut() {
            *v = map(*v);
        }
        self.cache = None;
    }
}

/// A polygon together with the arena its indices point into.
#[derive(Clone, Copy)]
pub struct PolygonView<'a> {
    polygon: &'a Polygon,
    arena: &'a [DVec3],
}

impl<'a> PolygonView<'a> {
    #[inline]
    pub fn polygon(&self) -> &'a Polygon {
        self.polygon
    }

    #[inline]
    pub fn vertex(&self, i: usize) -> DVec3 {
        self.arena[self.polygon.vertices[i] as usize]
    }

    pub fn positions(&self) -> SmallVec<[DVec3; 4]> {
        self.polygon.vertices.iter().map(|&i| self.arena[i as usize]).collect()
    }

    /// Cached geometry, or computed on the fly when invalidated.
    pub fn geometry(&self) -> PolygonGeometry {
        match self.polygon.cache {
            Some(g) => g,
            None => PolygonGeometry::from_points(&self.positions()),
        }
    }

    #[inline]
    pub fn normal(&self) -> DVec3 {
        self.geometry().normal
    }

    #[inline]
    pub fn centroid(&self) -> DVec3 {
        self.geometry().centroid
    }

    #[inline]
    pub fn bbox(&self) -> BoundingBox {
        self.geometry().bbox
    }

    /// Distance along `ray` to this polygon, strictly inside `(EPS_HIT, ray.length)`.
    #[inline]
    pub fn intersect(&self, ray: &Ray) -> Option<f64> {
        fan_intersect(ray, &self.positions())
    }

    /// Whether `p` lies on the polygon, within `eps` of its plane.
    pub fn contains_point(&self, p: DVec3, eps: f64) -> bool {
        let points = self.positions();
        let geometry = self.geometry();
        if (p - geometry.centroid).dot(geometry.normal).abs() > eps {
            return false;
        }
        (1..points.len().saturating_sub(1))
            .any(|i| point_in_triangle(p, points[0], points[i], points[i + 1], eps))
    }
}

/// Moller-Trumbore ray/triangle test.
///
/// Returns the hit distance when it lies strictly between `EPS_HIT` and the
/// ray length.
pub fn triangle_intersect(ray: &Ray, v0: DVec3, v1: DVec3, v2: DVec3) -> Option<f64> {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let h = ray.direction.cross(e2);
    let det = e1.dot(h);
    if det.abs() < EPS_DETERMINANT {
        return None;
    }
    let inv = 1.0 / det;
    let s = ray.origin - v0;
    let u = inv * s.dot(h);
    if !(-EPS_BARYCENTRIC..=1.0 + EPS_BARYCENTRIC).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = inv * ray.direction.dot(q);
    if v < -EPS_BARYCENTRIC || u + v > 1.0 + EPS_BARYCENTRIC {
        return None;
    }
    let t = inv * e2.dot(q);
    (t > EPS_HIT && t < ray.length).then_some(t)
}

/// Closest hit over the fan triangulation of a convex polygon.
pub fn fan_intersect(ray: &Ray, points: &[DVec3]) -> Option<f64> {
    if points.len() < 3 {
        return None;
    }
    let mut best: Option<f64> = None;
    for i in 1..points.len() - 1 {
        if let Some(t) = triangle_intersect(ray, points[0], points[i], points[i + 1]) {
            if best.map_or(true, |b| t < b) {
                best = Some(t);
            }
        }
    }
    best
}

fn point_in_triangle(p: DVec3, a: DVec3, b: DVec3, c: DVec3, eps: f64) -> bool {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < EPS_DETERMINANT {
        return false;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;
    // eps is a length, barycentrics are relative
    let slack = eps / d00.max(d11).sqrt().max(eps);
    u >= -slack && v >= -slack && w >= -slack
}
