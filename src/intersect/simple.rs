use super::{closer, Intersection, IntersectionFinder};
use crate::geom::Ray;
use crate::scene::Scene;

/// Brute-force finder: every polygon of every solid the ray reaches.
///
/// Solids are visited by increasing box entry distance; the search stops
/// once the next box starts beyond the best hit so far.
#[derive(Debug, Clone, Copy)]
pub struct SimpleFinder<'s> {
    scene: &'s Scene,
}

impl<'s> SimpleFinder<'s> {
    pub fn new(scene: &'s Scene) -> Self {
        Self { scene }
    }

    pub fn scene(&self) -> &'s Scene {
        self.scene
    }
}

impl IntersectionFinder for SimpleFinder<'_> {
    fn find(&self, ray: &Ray) -> Option<Intersection> {
        if ray.is_degenerate() {
            return None;
        }
        let mut candidates: Vec<(f64, usize)> = self
            .scene
            .solids()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.bbox().ray_entry(ray.origin, ray.direction, ray.length).map(|t| (t, i)))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut best = None;
        for (entry, solid) in candidates {
            if best.is_some_and(|(d, _)| entry > d) {
                break;
            }
            for id in self.scene.solid_polygon_ids(solid) {
                if let Some(t) = self.scene.polygon(id).intersect(ray) {
                    closer(&mut best, t, id);
                }
            }
        }
        best.map(|(t, id)| Intersection::compose(self.scene, ray, id, t))
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Material;
    use crate::solid::{Primitive, Solid};
    use crate::util::DVec3;

    fn row() -> Scene {
        let m = Material::new(1.0, 0.0, 0.0, 1.0);
        let mut scene = Scene::new(Material::VACUUM);
        for i in 0..3 {
            let at = DVec3::new(3.0 * i as f64, 0.0, 0.0);
            scene.add(Solid::cuboid(&format!("c{i}"), DVec3::ONE, at, m, Primitive::Triangle).unwrap()).unwrap();
        }
        scene
    }

    #[test]
    fn test_closest_hit() {
        let scene = row();
        let finder = SimpleFinder::new(&scene);

        let hit = finder.find(&Ray::infinite(DVec3::new(-5.0, 0.1, 0.2), DVec3::X)).unwrap();
        assert!((hit.distance - 4.5).abs() < 1e-12);
        assert_eq!(scene.polygon_owner(hit.polygon), 0);
        assert!(hit.distance_left.is_infinite());

        // from the far end, the last cube comes first
        let hit = finder.find(&Ray::infinite(DVec3::new(12.0, 0.1, 0.2), DVec3::NEG_X)).unwrap();
        assert_eq!(scene.polygon_owner(hit.polygon), 2);
        assert_eq!(&*hit.surface, "right");
    }

    #[test]
    fn test_misses() {
        let scene = row();
        let finder = SimpleFinder::new(&scene);
        // too short
        assert!(finder.find(&Ray::new(DVec3::new(-5.0, 0.0, 0.0), DVec3::X, 4.0)).is_none());
        // pointing away
        assert!(finder.find(&Ray::infinite(DVec3::new(-5.0, 0.0, 0.0), DVec3::NEG_X)).is_none());
        // degenerate
        assert!(finder.find(&Ray::infinite(DVec3::ZERO, DVec3::ZERO)).is_none());
        // from inside, leaving
        let hit = finder.find(&Ray::infinite(DVec3::ZERO, DVec3::Y)).unwrap();
        assert!((hit.distance - 0.5).abs() < 1e-12);
        assert!(!hit.is_entering(DVec3::Y));
    }
}
