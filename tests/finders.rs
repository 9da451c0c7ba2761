//! Closest-hit agreement between the brute-force and tree finders.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use turbid::prelude::*;

fn tissue(mu_s: f64) -> Material {
    Material::new(mu_s, 0.1, 0.8, 1.4)
}

/// Rotated boxes, a layered stack and a sphere, kept apart from each other.
fn mixed_scene() -> Scene {
    let mut scene = Scene::new(Material::VACUUM);

    let mut tilted = Solid::cuboid("tilted", DVec3::new(1.0, 2.0, 0.5), DVec3::new(-3.0, 0.0, 0.0), tissue(10.0), Primitive::Quad).unwrap();
    tilted.rotate(30.0, 15.0, 45.0);
    scene.add(tilted).unwrap();

    let base = Solid::cuboid("skin", DVec3::new(2.0, 0.2, 2.0), DVec3::new(3.0, 0.0, 0.0), tissue(20.0), Primitive::Triangle).unwrap();
    let fat = Solid::cuboid("fat", DVec3::new(2.0, 0.7, 2.0), DVec3::ZERO, tissue(5.0), Primitive::Triangle).unwrap();
    let muscle = Solid::cuboid("muscle", DVec3::new(2.0, 1.0, 2.0), DVec3::ZERO, tissue(8.0), Primitive::Triangle).unwrap();
    scene.add(base.stack(fat, "top").unwrap().stack(muscle, "top").unwrap()).unwrap();

    scene.add(Solid::icosphere("ball", 1.0, 2, DVec3::new(0.0, 0.0, 3.0), tissue(2.0)).unwrap()).unwrap();
    // nested inside the ball
    scene.add(Solid::cuboid("core", DVec3::splat(0.6), DVec3::new(0.0, 0.0, 3.0), tissue(30.0), Primitive::Quad).unwrap()).unwrap();
    scene
}

/// Thin slab with beads in its plane, so the tree has to clip the slab faces.
fn slab_scene() -> Scene {
    let mut scene = Scene::new(Material::VACUUM);
    scene.add(Solid::cuboid("slab", DVec3::new(20.0, 0.2, 20.0), DVec3::ZERO, tissue(4.0), Primitive::Quad).unwrap()).unwrap();
    for i in -3..=3 {
        let along = i as f64 * 3.0;
        for at in [
            DVec3::new(along, 0.0, -11.0),
            DVec3::new(along, 0.0, 11.0),
            DVec3::new(-11.0, 0.0, along),
            DVec3::new(11.0, 0.0, along),
        ] {
            scene.add(Solid::cuboid("bead", DVec3::splat(0.5), at, tissue(9.0), Primitive::Triangle).unwrap()).unwrap();
        }
    }
    scene
}

fn random_origin(rng: &mut Pcg64, scene: &Scene) -> DVec3 {
    let bbox = scene.bounding_box().unwrap().padded(2.0);
    DVec3::new(
        rng.gen_range(bbox.min.x..bbox.max.x),
        rng.gen_range(bbox.min.y..bbox.max.y),
        rng.gen_range(bbox.min.z..bbox.max.z),
    )
}

/// Half the rays head for a point near some polygon, the rest go anywhere.
fn random_ray(rng: &mut Pcg64, scene: &Scene) -> Ray {
    let origin = random_origin(rng, scene);
    if rng.gen_bool(0.5) {
        let id = scene.polygon_ids().nth(rng.gen_range(0..scene.polygon_count())).unwrap();
        let jitter = DVec3::new(rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3));
        let target = scene.polygon(id).centroid() + jitter;
        let length = if rng.gen_bool(0.3) { f64::INFINITY } else { origin.distance(target) * rng.gen_range(0.5..1.5) };
        return Ray::new(origin, target - origin, length);
    }
    let direction = DVec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
    let length = if rng.gen_bool(0.3) { f64::INFINITY } else { rng.gen_range(0.05..6.0) };
    Ray::new(origin, direction, length)
}

/// Both finders must report the same hit, down to the polygon.
fn assert_same_hit(ray: &Ray, a: Option<Intersection>, b: Option<Intersection>) -> bool {
    match (a, b) {
        (None, None) => false,
        (Some(a), Some(b)) => {
            assert!((a.distance - b.distance).abs() < 1e-9, "{ray:?}: {} vs {}", a.distance, b.distance);
            assert!((a.position - b.position).length() < 1e-9);
            assert_eq!(a.polygon, b.polygon, "{ray:?}");
            assert_eq!(a.normal, b.normal);
            true
        }
        (a, b) => panic!("{ray:?}: simple {a:?} fast {b:?}"),
    }
}

fn assert_agree(scene: &Scene, config: &TreeConfig, rays: usize, seed: u64) -> usize {
    let simple = SimpleFinder::new(scene);
    let fast = FastFinder::new(scene, config).unwrap();
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut hits = 0;
    for _ in 0..rays {
        let ray = random_ray(&mut rng, scene);
        if assert_same_hit(&ray, simple.find(&ray), fast.find(&ray)) {
            hits += 1;
        }
    }
    hits
}

#[test]
fn test_default_tree_agrees() {
    let scene = mixed_scene();
    let hits = assert_agree(&scene, &TreeConfig::default(), 2000, 1);
    assert!(hits > 300, "only {hits} hits");
}

#[test]
fn test_tree_shapes_agree() {
    let scene = mixed_scene();
    let configs = [
        TreeConfig { max_depth: 0, ..Default::default() },
        TreeConfig { max_depth: 1, ..Default::default() },
        TreeConfig { max_depth: 24, min_leaf_size: 1, split_planes: 3, ..Default::default() },
        TreeConfig { traversal_cost: 0.1, empty_side_discount: 0.2, ..Default::default() },
    ];
    for (i, config) in configs.iter().enumerate() {
        assert_agree(&scene, config, 500, 10 + i as u64);
    }
}

#[test]
fn test_rays_from_surfaces_agree() {
    // rays starting on polygons, as photons do after a boundary event
    let scene = mixed_scene();
    let simple = SimpleFinder::new(&scene);
    let fast = FastFinder::new(&scene, &TreeConfig::default()).unwrap();
    let mut rng = Pcg64::seed_from_u64(99);
    for id in scene.polygon_ids() {
        let view = scene.polygon(id);
        let normal = view.normal();
        let origin = view.centroid() - normal * 1e-7;
        let direction = (-normal + DVec3::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5))).normalize();
        let ray = Ray::infinite(origin, direction);
        assert_same_hit(&ray, simple.find(&ray), fast.find(&ray));
    }
}

#[test]
fn test_rays_through_vertices_agree() {
    // corners and edges are shared by several polygons at the same distance
    let scene = mixed_scene();
    let simple = SimpleFinder::new(&scene);
    let fast = FastFinder::new(&scene, &TreeConfig::default()).unwrap();
    let mut rng = Pcg64::seed_from_u64(7);
    let mut hits = 0;
    for id in scene.polygon_ids() {
        let view = scene.polygon(id);
        let n = view.polygon().len();
        for i in 0..n {
            let corner = view.vertex(i);
            let midpoint = corner.lerp(view.vertex((i + 1) % n), 0.5);
            for target in [corner, midpoint] {
                let origin = random_origin(&mut rng, &scene);
                let ray = Ray::infinite(origin, target - origin);
                if assert_same_hit(&ray, simple.find(&ray), fast.find(&ray)) {
                    hits += 1;
                }
            }
        }
    }
    assert!(hits > scene.polygon_count());
}

#[test]
fn test_clipped_slab_agrees() {
    let scene = slab_scene();
    let tree = SpacePartition::from_scene(&scene, &TreeConfig::default()).unwrap();
    assert!(tree.fragments().len() > scene.polygon_count());

    let hits = assert_agree(&scene, &TreeConfig::default(), 2000, 3);
    assert!(hits > 300, "only {hits} hits");
}

#[test]
fn test_tree_covers_scene() {
    let scene = mixed_scene();
    let tree = SpacePartition::from_scene(&scene, &TreeConfig::default()).unwrap();
    assert_eq!(tree.covered_polygons().len(), scene.polygon_count());
    assert!(tree.depth() <= TreeConfig::default().max_depth);
}
