use smallvec::SmallVec;

use super::{closer, Intersection, IntersectionFinder};
use crate::geom::{PolygonId, Ray};
use crate::scene::Scene;
use crate::tree::{NodeId, SpacePartition, TreeConfig, VisitedSet, ROOT};
use crate::util::Result;

/// Tree-accelerated finder.
///
/// The walk starts in the leaf holding the ray origin, then climbs towards
/// the root, exploring each unvisited sibling subtree whose box the ray
/// enters before the best hit so far. Leaves test the full source polygon of
/// every fragment, so distances match [`SimpleFinder`](super::SimpleFinder)
/// exactly.
#[derive(Debug, Clone)]
pub struct FastFinder<'s> {
    scene: &'s Scene,
    tree: SpacePartition,
}

impl<'s> FastFinder<'s> {
    /// Build the partition for `scene` and wrap it.
    pub fn new(scene: &'s Scene, config: &TreeConfig) -> Result<Self> {
        Ok(Self::from_tree(scene, SpacePartition::from_scene(scene, config)?))
    }

    /// Use a partition built earlier for this same scene.
    pub fn from_tree(scene: &'s Scene, tree: SpacePartition) -> Self {
        Self { scene, tree }
    }

    pub fn tree(&self) -> &SpacePartition {
        &self.tree
    }

    pub fn scene(&self) -> &'s Scene {
        self.scene
    }

    /// Closest hit, reusing `visited` as scratch space.
    pub fn find_with(&self, ray: &Ray, visited: &mut VisitedSet) -> Option<Intersection> {
        if ray.is_degenerate() {
            return None;
        }
        visited.reset(self.tree.node_count());
        let mut best = None;
        let mut current = self.tree.search_point(ray.origin).unwrap_or(ROOT);
        loop {
            self.descend(current, ray, visited, &mut best);
            match self.tree.node(current).parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        best.map(|(t, id)| Intersection::compose(self.scene, ray, id, t))
    }

    fn descend(&self, id: NodeId, ray: &Ray, visited: &mut VisitedSet, best: &mut Option<(f64, PolygonId)>) {
        if !visited.insert(id) {
            return;
        }
        let node = self.tree.node(id);
        let Some(entry) = node.bbox.ray_entry(ray.origin, ray.direction, ray.length) else {
            return;
        };
        if best.is_some_and(|(d, _)| entry > d) {
            return;
        }

        if node.is_leaf() {
            for &f in &node.fragments {
                let source = self.tree.fragment(f).source;
                if let Some(t) = self.scene.polygon(source).intersect(ray) {
                    closer(best, t, source);
                }
            }
            return;
        }

        let mut order: SmallVec<[(f64, NodeId); 2]> = node
            .children
            .iter()
            .filter(|&&c| !visited.contains(c))
            .filter_map(|&c| {
                let child = self.tree.node(c);
                child.bbox.ray_entry(ray.origin, ray.direction, ray.length).map(|t| (t, c))
            })
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (entry, child) in order {
            if best.is_some_and(|(d, _)| entry > d) {
                break;
            }
            self.descend(child, ray, visited, best);
        }
    }
}

impl IntersectionFinder for FastFinder<'_> {
    fn find(&self, ray: &Ray) -> Option<Intersection> {
        let mut visited = VisitedSet::new(self.tree.node_count());
        self.find_with(ray, &mut visited)
    }

    fn name(&self) -> &'static str {
        "fast"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Material;
    use crate::intersect::SimpleFinder;
    use crate::solid::{Primitive, Solid};
    use crate::util::DVec3;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn scene() -> Scene {
        let m = Material::new(1.0, 0.1, 0.8, 1.3);
        let mut scene = Scene::new(Material::VACUUM);
        for i in 0..3 {
            for j in 0..3 {
                let at = DVec3::new(2.0 * i as f64, 2.0 * j as f64, 0.0);
                let c = Solid::cuboid(&format!("c{i}{j}"), DVec3::ONE, at, m, Primitive::Triangle).unwrap();
                scene.add(c).unwrap();
            }
        }
        scene.add(Solid::icosphere("ball", 0.8, 2, DVec3::new(2.0, 2.0, 3.0), m).unwrap()).unwrap();
        scene
    }

    #[test]
    fn test_matches_simple_finder() {
        let scene = scene();
        let simple = SimpleFinder::new(&scene);
        let fast = FastFinder::new(&scene, &TreeConfig::default()).unwrap();
        assert!(fast.tree().node_count() > 1);

        let mut rng = Pcg64::seed_from_u64(7);
        let mut visited = VisitedSet::default();
        let mut hits = 0;
        for _ in 0..500 {
            let origin = DVec3::new(rng.gen_range(-1.0..5.0), rng.gen_range(-1.0..5.0), rng.gen_range(-1.0..4.0));
            let direction = DVec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            let length = if rng.gen_bool(0.5) { f64::INFINITY } else { rng.gen_range(0.1..3.0) };
            let ray = Ray::new(origin, direction, length);

            let a = simple.find(&ray);
            let b = fast.find_with(&ray, &mut visited);
            match (a, b) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    hits += 1;
                    assert!((a.distance - b.distance).abs() < 1e-9, "{ray:?}: {} vs {}", a.distance, b.distance);
                    assert_eq!(a.polygon, b.polygon, "{ray:?}");
                }
                (a, b) => panic!("{ray:?}: simple {a:?} fast {b:?}"),
            }
        }
        assert!(hits > 50);
    }

    #[test]
    fn test_origin_outside_tree() {
        let scene = scene();
        let fast = FastFinder::new(&scene, &TreeConfig::default()).unwrap();
        let hit = fast.find(&Ray::infinite(DVec3::new(-10.0, 0.0, 0.0), DVec3::X)).unwrap();
        assert!((hit.distance - 9.5).abs() < 1e-12);
        assert!(fast.find(&Ray::infinite(DVec3::new(-10.0, 0.0, 0.0), DVec3::NEG_X)).is_none());
    }
}
