//! The photon state machine.
//!
//! A photon alternates between free flight and events. Each [`Transport::step`]
//! samples a free path (unless one is pending), asks the finder for the first
//! boundary on it, and then either scatters at the end of the path or
//! interacts with the boundary. The step returns the path length still owed,
//! with `0.0` meaning none: the next step samples a fresh one.

use rand::Rng;

use super::fresnel::{Fresnel, InterfaceModel};
use super::logger::{InteractionKey, InteractionLogger};
use super::photon::{Fate, Photon};
use super::TransportConfig;
use crate::geom::Ray;
use crate::intersect::{Intersection, IntersectionFinder};
use crate::scene::Scene;
use crate::util::{DVec3, Error, Result, VectorExt};

/// Distance a photon is pushed off a surface after interacting with it.
pub const NUDGE: f64 = 1e-7;

static FRESNEL: Fresnel = Fresnel;

/// Remaining path after crossing from attenuation `mu_t_old` into `mu_t_new`,
/// keeping the optical depth left unchanged.
///
/// Leaving vacuum gives `0.0` (sample afresh); entering vacuum gives infinity.
pub fn rescale_distance(distance_left: f64, mu_t_old: f64, mu_t_new: f64) -> f64 {
    if mu_t_old == 0.0 {
        0.0
    } else if mu_t_new == 0.0 {
        f64::INFINITY
    } else {
        distance_left * mu_t_old / mu_t_new
    }
}

/// Propagates photons through one scene.
///
/// Holds only shared references, so one instance serves every worker thread.
#[derive(Clone, Copy)]
pub struct Transport<'s> {
    scene: &'s Scene,
    finder: Option<&'s dyn IntersectionFinder>,
    interface: &'s dyn InterfaceModel,
    config: TransportConfig,
}

impl<'s> Transport<'s> {
    /// Transport without a finder; bind one with [`Transport::with_finder`].
    pub fn new(scene: &'s Scene, config: TransportConfig) -> Self {
        Self {
            scene,
            finder: None,
            interface: &FRESNEL,
            config,
        }
    }

    pub fn with_finder(mut self, finder: &'s dyn IntersectionFinder) -> Self {
        self.finder = Some(finder);
        self
    }

    /// Replace the Fresnel model.
    pub fn with_interface(mut self, interface: &'s dyn InterfaceModel) -> Self {
        self.interface = interface;
        self
    }

    #[inline]
    pub fn scene(&self) -> &'s Scene {
        self.scene
    }

    #[inline]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// New photon in whatever environment surrounds `position`.
    pub fn launch(&self, position: DVec3, direction: DVec3) -> Photon {
        Photon::new(position, direction, self.scene.environment_at(position))
    }

    fn finder(&self) -> Result<&'s dyn IntersectionFinder> {
        self.finder.ok_or(Error::MissingIntersectionFinder)
    }

    /// Step until the photon dies.
    pub fn propagate<R, L>(&self, photon: &mut Photon, rng: &mut R, logger: &mut L) -> Result<()>
    where
        R: Rng + ?Sized,
        L: InteractionLogger + ?Sized,
    {
        self.finder()?;
        if !photon.is_alive() {
            return Err(Error::DeadPhoton);
        }
        let mut distance = 0.0;
        while photon.is_alive() {
            distance = self.step(photon, distance, rng, logger)?;
        }
        Ok(())
    }

    /// One flight: sample (or continue) a free path, then scatter or cross a boundary.
    ///
    /// Returns the path length still owed, `0.0` when none.
    pub fn step<R, L>(&self, photon: &mut Photon, distance: f64, rng: &mut R, logger: &mut L) -> Result<f64>
    where
        R: Rng + ?Sized,
        L: InteractionLogger + ?Sized,
    {
        let finder = self.finder()?;
        if !photon.is_alive() {
            return Err(Error::DeadPhoton);
        }
        let distance = if distance == 0.0 {
            photon.environment.material.sample_distance(rng)
        } else {
            distance
        };

        let ray = Ray::new(photon.position, photon.direction, distance);
        let start = photon.position;
        match finder.find(&ray) {
            Some(hit) => {
                photon.position = hit.position;
                if self.config.log_segments {
                    logger.log_segment(start, photon.position);
                }
                Ok(self.cross(photon, &hit, rng, logger))
            }
            None if distance.is_infinite() => {
                photon.kill(Fate::Escaped);
                Ok(0.0)
            }
            None => {
                photon.move_by(distance);
                if self.config.log_segments {
                    logger.log_segment(start, photon.position);
                }
                self.scatter(photon, rng, logger);
                self.interact(photon, rng);
                Ok(0.0)
            }
        }
    }

    /// Boundary event: flux records, Fresnel outcome, path rescaling.
    fn cross<R, L>(&self, photon: &mut Photon, hit: &Intersection, rng: &mut R, logger: &mut L) -> f64
    where
        R: Rng + ?Sized,
        L: InteractionLogger + ?Sized,
    {
        let (from, to) = hit.crossing(photon.direction);
        let weight = photon.weight;
        let entering = InteractionKey::new(self.scene.environment_label(&to).clone(), Some(hit.surface.clone()));
        let exiting = InteractionKey::new(self.scene.environment_label(&from).clone(), Some(hit.surface.clone()));
        logger.log_point(weight, hit.position, &entering);
        logger.log_point(-weight, hit.position, &exiting);

        let outcome = self.interface.interact(photon.direction, hit, rng.gen::<f64>());
        photon.direction = outcome.redirect(photon.direction).normalize();
        photon.er = (photon.er - photon.direction * photon.er.dot(photon.direction)).normalize_or_zero();
        if photon.er == DVec3::ZERO {
            photon.er = photon.direction.any_perpendicular();
        }

        let mut distance_left = hit.distance_left;
        if !outcome.reflected {
            let mu_t_old = photon.environment.material.mu_t();
            let mu_t_new = outcome.next.material.mu_t();
            distance_left = rescale_distance(distance_left, mu_t_old, mu_t_new);
            photon.environment = outcome.next;
        }

        let side = if photon.direction.dot(hit.normal) < 0.0 { -1.0 } else { 1.0 };
        photon.position += hit.normal * (side * NUDGE);
        distance_left
    }

    /// Scattering event at the current position.
    ///
    /// The absorbed fraction `weight * (1 - albedo)` is deducted and logged
    /// under the current solid, then the direction is redrawn.
    pub fn scatter<R, L>(&self, photon: &mut Photon, rng: &mut R, logger: &mut L)
    where
        R: Rng + ?Sized,
        L: InteractionLogger + ?Sized,
    {
        let material = photon.environment.material;
        let (theta, phi) = material.sample_angles(rng);
        photon.scatter_by(theta, phi);

        let loss = photon.weight * (1.0 - material.albedo());
        photon.weight -= loss;
        photon.scatter_count += 1;
        let key = InteractionKey::volume(self.scene.environment_label(&photon.environment).clone());
        logger.log_point(loss, photon.position, &key);
    }

    /// Weight check: photons at or below the threshold die, or face roulette.
    ///
    /// The smallest positive weight always counts as spent.
    pub fn interact<R: Rng + ?Sized>(&self, photon: &mut Photon, rng: &mut R) {
        if photon.weight > self.config.weight_threshold.max(f64::MIN_POSITIVE) {
            return;
        }
        match self.config.roulette {
            Some(roulette) if photon.weight > 0.0 => {
                if rng.gen::<f64>() < roulette.chance {
                    photon.weight /= roulette.chance;
                } else {
                    photon.weight = 0.0;
                    photon.kill(Fate::Terminated);
                }
            }
            _ => photon.kill(Fate::Absorbed),
        }
    }
}

impl std::fmt::Debug for Transport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("finder", &self.finder.map(|finder| finder.name()))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Material;
    use crate::intersect::SimpleFinder;
    use crate::scene::WORLD_LABEL;
    use crate::solid::{Primitive, Solid};
    use crate::transport::{FresnelOutcome, Logger, NullLogger, RouletteConfig};
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use std::sync::Arc;

    /// Always refracts straight through, or always mirrors.
    struct Forced {
        reflect: bool,
    }

    impl InterfaceModel for Forced {
        fn interact(&self, direction: DVec3, hit: &Intersection, _draw: f64) -> FresnelOutcome {
            let (from, to) = hit.crossing(direction);
            let axis = direction.any_perpendicular();
            if self.reflect {
                FresnelOutcome { reflected: true, axis, deflection: std::f64::consts::PI, next: from }
            } else {
                FresnelOutcome { reflected: false, axis, deflection: 0.0, next: to }
            }
        }
    }

    fn cube_scene(material: Material) -> Scene {
        let mut scene = Scene::new(Material::VACUUM);
        let cube = Solid::cuboid("cube", DVec3::splat(2.0), DVec3::ZERO, material, Primitive::Quad).unwrap();
        scene.add(cube).unwrap();
        scene
    }

    #[test]
    fn test_missing_finder_and_dead_photon() {
        let scene = cube_scene(Material::new(1.0, 1.0, 0.0, 1.0));
        let transport = Transport::new(&scene, TransportConfig::default());
        let mut rng = Pcg64::seed_from_u64(1);
        let mut photon = transport.launch(DVec3::ZERO, DVec3::X);
        assert!(matches!(
            transport.propagate(&mut photon, &mut rng, &mut NullLogger),
            Err(Error::MissingIntersectionFinder)
        ));

        let finder = SimpleFinder::new(&scene);
        let transport = transport.with_finder(&finder);
        photon.kill(Fate::Absorbed);
        assert!(matches!(
            transport.step(&mut photon, 0.0, &mut rng, &mut NullLogger),
            Err(Error::DeadPhoton)
        ));
        assert!(matches!(
            transport.propagate(&mut photon, &mut rng, &mut NullLogger),
            Err(Error::DeadPhoton)
        ));
    }

    #[test]
    fn test_escape_through_vacuum() {
        let scene = Scene::new(Material::VACUUM);
        let finder = SimpleFinder::new(&scene);
        let transport = Transport::new(&scene, TransportConfig::default()).with_finder(&finder);
        let mut rng = Pcg64::seed_from_u64(1);
        let mut photon = transport.launch(DVec3::ZERO, DVec3::Z);

        let left = transport.step(&mut photon, 0.0, &mut rng, &mut NullLogger).unwrap();
        assert_eq!(left, 0.0);
        assert_eq!(photon.fate(), Some(Fate::Escaped));
        assert_eq!(photon.weight, 1.0);
    }

    #[test]
    fn test_scatter_loss_logged() {
        let world = Material::new(3.0, 1.0, 0.8, 1.0);
        let scene = Scene::new(world);
        let finder = SimpleFinder::new(&scene);
        let transport = Transport::new(&scene, TransportConfig::default()).with_finder(&finder);
        let mut rng = Pcg64::seed_from_u64(3);
        let mut logger = Logger::new();
        let mut photon = transport.launch(DVec3::ZERO, DVec3::Z);

        let left = transport.step(&mut photon, 0.5, &mut rng, &mut logger).unwrap();
        assert_eq!(left, 0.0);
        assert!((photon.position - DVec3::new(0.0, 0.0, 0.5)).length() < 1e-12);
        assert!((photon.weight - 0.75).abs() < 1e-12);
        assert_eq!(photon.scatter_count(), 1);
        let key = InteractionKey::volume(Arc::from(WORLD_LABEL));
        assert_eq!(logger.points(&key).len(), 1);
        assert!((logger.weight(&key) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_lossless_scattering() {
        let scene = Scene::new(Material::new(5.0, 0.0, 0.5, 1.0));
        let finder = SimpleFinder::new(&scene);
        let transport = Transport::new(&scene, TransportConfig::default()).with_finder(&finder);
        let mut rng = Pcg64::seed_from_u64(9);
        let mut logger = Logger::new();
        let mut photon = transport.launch(DVec3::ZERO, DVec3::X);
        for _ in 0..50 {
            transport.step(&mut photon, 0.0, &mut rng, &mut logger).unwrap();
        }
        assert_eq!(photon.weight, 1.0);
        assert!(photon.is_alive());
        assert_eq!(logger.total_weight(), 0.0);
    }

    #[test]
    fn test_boundary_records_and_entry_from_vacuum() {
        let tissue = Material::new(2.0, 0.5, 0.8, 1.0);
        let scene = cube_scene(tissue);
        let finder = SimpleFinder::new(&scene);
        let forced = Forced { reflect: false };
        let transport = Transport::new(&scene, TransportConfig::default())
            .with_finder(&finder)
            .with_interface(&forced);
        let mut rng = Pcg64::seed_from_u64(1);
        let mut logger = Logger::new();
        let mut photon = transport.launch(DVec3::new(-5.0, 0.0, 0.0), DVec3::X);
        assert!(photon.environment.is_world());

        let left = transport.step(&mut photon, 0.0, &mut rng, &mut logger).unwrap();
        // leaving vacuum restarts sampling
        assert_eq!(left, 0.0);
        assert_eq!(photon.environment.material, tissue);
        assert!(photon.position.x > -1.0 && photon.position.x < -1.0 + 1e-6);

        let into_cube = InteractionKey::new(Arc::from("cube"), Some(Arc::from("left")));
        let out_of_world = InteractionKey::new(Arc::from(WORLD_LABEL), Some(Arc::from("left")));
        assert_eq!(logger.weight(&into_cube), 1.0);
        assert_eq!(logger.weight(&out_of_world), -1.0);
        assert_eq!(logger.total_weight(), 0.0);
    }

    #[test]
    fn test_reflection_keeps_environment_and_distance() {
        let tissue = Material::new(2.0, 0.5, 0.8, 1.4);
        let scene = cube_scene(tissue);
        let finder = SimpleFinder::new(&scene);
        let forced = Forced { reflect: true };
        let transport = Transport::new(&scene, TransportConfig::default())
            .with_finder(&finder)
            .with_interface(&forced);
        let mut rng = Pcg64::seed_from_u64(1);
        let mut photon = transport.launch(DVec3::ZERO, DVec3::X);
        let env = photon.environment;

        let left = transport.step(&mut photon, 3.0, &mut rng, &mut NullLogger).unwrap();
        assert!((left - 2.0).abs() < 1e-12);
        assert_eq!(photon.environment, env);
        assert!((photon.direction - DVec3::NEG_X).length() < 1e-12);
        // pushed back inside
        assert!(photon.position.x < 1.0);
    }

    #[test]
    fn test_refraction_rescales_distance() {
        assert!((rescale_distance(2.0, 4.0, 1.0) - 8.0).abs() < 1e-12);
        assert_eq!(rescale_distance(2.0, 0.0, 3.0), 0.0);
        assert_eq!(rescale_distance(2.0, 3.0, 0.0), f64::INFINITY);
        let there = rescale_distance(1.25, 3.0, 7.0);
        let back = rescale_distance(there, 7.0, 3.0);
        assert!((back - 1.25).abs() < 1e-12);

        // leaving a scattering cube into vacuum
        let scene = cube_scene(Material::new(2.0, 0.5, 0.8, 1.0));
        let finder = SimpleFinder::new(&scene);
        let forced = Forced { reflect: false };
        let transport = Transport::new(&scene, TransportConfig::default())
            .with_finder(&finder)
            .with_interface(&forced);
        let mut rng = Pcg64::seed_from_u64(1);
        let mut photon = transport.launch(DVec3::ZERO, DVec3::Y);
        let left = transport.step(&mut photon, 3.0, &mut rng, &mut NullLogger).unwrap();
        assert_eq!(left, f64::INFINITY);
        assert!(photon.environment.is_world());
        let left = transport.step(&mut photon, left, &mut rng, &mut NullLogger).unwrap();
        assert_eq!(left, 0.0);
        assert_eq!(photon.fate(), Some(Fate::Escaped));
    }

    #[test]
    fn test_weight_floor() {
        let scene = Scene::new(Material::new(1.0, 0.0, 0.0, 1.0));
        let config = TransportConfig { weight_threshold: 0.0, ..Default::default() };
        let transport = Transport::new(&scene, config);
        let mut rng = Pcg64::seed_from_u64(1);

        let mut photon = transport.launch(DVec3::ZERO, DVec3::X);
        photon.weight = f64::MIN_POSITIVE;
        assert!(photon.is_alive());
        transport.interact(&mut photon, &mut rng);
        assert_eq!(photon.fate(), Some(Fate::Absorbed));

        let mut photon = transport.launch(DVec3::ZERO, DVec3::X);
        photon.weight = 1e-200;
        transport.interact(&mut photon, &mut rng);
        assert!(photon.is_alive());
    }

    #[test]
    fn test_roulette() {
        let scene = Scene::new(Material::new(1.0, 0.0, 0.0, 1.0));
        let config = TransportConfig {
            roulette: Some(RouletteConfig { chance: 0.5 }),
            ..Default::default()
        };
        let transport = Transport::new(&scene, config);
        let mut rng = Pcg64::seed_from_u64(11);
        let (mut survived, mut terminated) = (0, 0);
        for _ in 0..200 {
            let mut photon = transport.launch(DVec3::ZERO, DVec3::X);
            photon.weight = 5e-5;
            transport.interact(&mut photon, &mut rng);
            match photon.fate() {
                None => {
                    survived += 1;
                    assert!((photon.weight - 1e-4).abs() < 1e-18);
                }
                Some(Fate::Terminated) => {
                    terminated += 1;
                    assert_eq!(photon.weight, 0.0);
                }
                other => panic!("unexpected fate {other:?}"),
            }
        }
        assert!(survived > 50 && terminated > 50);
    }

    #[test]
    fn test_full_propagation_conserves_weight() {
        let scene = cube_scene(Material::new(10.0, 1.0, 0.9, 1.4));
        let finder = SimpleFinder::new(&scene);
        let transport = Transport::new(&scene, TransportConfig::default()).with_finder(&finder);
        let mut rng = Pcg64::seed_from_u64(5);
        let mut logger = Logger::new();
        let mut leaked = 0.0;
        for _ in 0..20 {
            let mut photon = transport.launch(DVec3::ZERO, DVec3::Z);
            transport.propagate(&mut photon, &mut rng, &mut logger).unwrap();
            assert!(!photon.is_alive());
            leaked += photon.weight;
        }
        assert!((logger.total_weight() - (20.0 - leaked)).abs() < 1e-9);
    }
}
