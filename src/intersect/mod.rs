//! Ray queries against a scene.
//!
//! Two finders answer the same question, the closest polygon a ray hits
//! before its length runs out:
//! - [`SimpleFinder`] tests solids in order of their box entry distance.
//! - [`FastFinder`] walks a [`SpacePartition`](crate::tree::SpacePartition)
//!   starting from the leaf that holds the ray origin.
//!
//! Both report the exact closest hit, so they are interchangeable.

mod fast;
mod simple;

pub use fast::FastFinder;
pub use simple::SimpleFinder;

use std::sync::Arc;

use crate::geom::{Environment, PolygonId, Ray};
use crate::scene::Scene;
use crate::util::DVec3;

/// Where a ray meets a polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    /// Distance from the ray origin
    pub distance: f64,
    pub position: DVec3,
    pub polygon: PolygonId,
    /// Outward unit normal of the polygon
    pub normal: DVec3,
    /// Environment on the side the normal points away from
    pub inside: Environment,
    /// Environment on the side the normal points to
    pub outside: Environment,
    pub surface: Arc<str>,
    /// Ray length remaining past the hit; infinite for infinite rays
    pub distance_left: f64,
}

impl Intersection {
    /// Assemble the record for `polygon` hit at `distance` along `ray`.
    pub fn compose(scene: &Scene, ray: &Ray, polygon: PolygonId, distance: f64) -> Self {
        let view = scene.polygon(polygon);
        let poly = view.polygon();
        Self {
            distance,
            position: ray.at(distance),
            polygon,
            normal: view.normal(),
            inside: poly.inside,
            outside: poly.outside,
            surface: poly.surface_label().clone(),
            distance_left: ray.length - distance,
        }
    }

    /// Whether travelling along `direction` crosses from outside to inside.
    #[inline]
    pub fn is_entering(&self, direction: DVec3) -> bool {
        direction.dot(self.normal) < 0.0
    }

    /// Environments before and after the crossing, for a photon moving along `direction`.
    #[inline]
    pub fn crossing(&self, direction: DVec3) -> (Environment, Environment) {
        if self.is_entering(direction) {
            (self.outside, self.inside)
        } else {
            (self.inside, self.outside)
        }
    }
}

/// Closest-hit query over a fixed scene.
///
/// Implementations are shared by reference between transport threads.
pub trait IntersectionFinder: Send + Sync {
    fn find(&self, ray: &Ray) -> Option<Intersection>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Keep the nearer of two candidate hits. Equal distances go to the lower
/// polygon id so the result does not depend on visiting order.
#[inline]
fn closer(best: &mut Option<(f64, PolygonId)>, distance: f64, polygon: PolygonId) {
    if best.map_or(true, |(d, id)| distance < d || (distance == d && polygon < id)) {
        *best = Some((distance, polygon));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Material;
    use crate::solid::{Primitive, Solid};

    #[test]
    fn test_compose() {
        let m = Material::new(3.0, 0.1, 0.9, 1.4);
        let mut scene = Scene::new(Material::VACUUM);
        scene.add(Solid::cuboid("box", DVec3::splat(2.0), DVec3::ZERO, m, Primitive::Quad).unwrap()).unwrap();

        let ray = Ray::new(DVec3::new(0.0, -5.0, 0.0), DVec3::Y, 10.0);
        let hit = SimpleFinder::new(&scene).find(&ray).unwrap();
        assert!((hit.distance - 4.0).abs() < 1e-12);
        assert!((hit.distance_left - 6.0).abs() < 1e-12);
        assert!((hit.position - DVec3::new(0.0, -1.0, 0.0)).length() < 1e-12);
        assert_eq!(&*hit.surface, "bottom");
        assert!((hit.normal - DVec3::NEG_Y).length() < 1e-12);
        assert!(hit.is_entering(ray.direction));

        let (from, to) = hit.crossing(ray.direction);
        assert!(from.is_world());
        assert_eq!(to.material, m);
    }

    #[test]
    fn test_closer_ties_go_to_lower_id() {
        for order in [[3, 1, 2], [1, 2, 3], [2, 3, 1]] {
            let mut best = None;
            for id in order {
                closer(&mut best, 1.5, PolygonId(id));
            }
            assert_eq!(best, Some((1.5, PolygonId(1))));
        }

        let mut best = None;
        closer(&mut best, 2.0, PolygonId(0));
        closer(&mut best, 1.0, PolygonId(9));
        closer(&mut best, 1.0, PolygonId(4));
        closer(&mut best, 1.5, PolygonId(1));
        assert_eq!(best, Some((1.0, PolygonId(4))));
    }
}
