//! Photon sources.
//!
//! A source only decides where each photon starts and where it heads; the
//! environment is resolved by the transport from the scene.

use rand::Rng;
use std::f64::consts::TAU;

use crate::util::{DVec3, VectorExt};

/// Initial position and direction of one photon.
pub type Packet = (DVec3, DVec3);

/// Generates launch packets.
///
/// `packet` may be called in any order and from several threads; randomness
/// comes only from the generator passed in.
pub trait Source: Send + Sync {
    fn photon_count(&self) -> usize;

    fn packet(&self, index: usize, rng: &mut dyn rand::RngCore) -> Packet;

    /// All packets in index order.
    fn packets(&self, rng: &mut dyn rand::RngCore) -> Vec<Packet> {
        (0..self.photon_count()).map(|i| self.packet(i, rng)).collect()
    }
}

/// Every photon at the same point with the same direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PencilSource {
    pub position: DVec3,
    pub direction: DVec3,
    pub count: usize,
}

impl PencilSource {
    pub fn new(position: DVec3, direction: DVec3, count: usize) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
            count,
        }
    }
}

impl Source for PencilSource {
    fn photon_count(&self) -> usize {
        self.count
    }

    fn packet(&self, _index: usize, _rng: &mut dyn rand::RngCore) -> Packet {
        (self.position, self.direction)
    }
}

/// Uniformly distributed directions from one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicPointSource {
    pub position: DVec3,
    pub count: usize,
}

impl IsotropicPointSource {
    pub fn new(position: DVec3, count: usize) -> Self {
        Self { position, count }
    }
}

impl Source for IsotropicPointSource {
    fn photon_count(&self) -> usize {
        self.count
    }

    fn packet(&self, _index: usize, rng: &mut dyn rand::RngCore) -> Packet {
        (self.position, uniform_sphere(rng))
    }
}

/// Parallel beam filling a disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalSource {
    pub position: DVec3,
    pub direction: DVec3,
    pub diameter: f64,
    pub count: usize,
}

impl DirectionalSource {
    pub fn new(position: DVec3, direction: DVec3, diameter: f64, count: usize) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
            diameter,
            count,
        }
    }
}

impl Source for DirectionalSource {
    fn photon_count(&self) -> usize {
        self.count
    }

    fn packet(&self, _index: usize, rng: &mut dyn rand::RngCore) -> Packet {
        let origin = self.position + disk_offset(self.direction, self.diameter * 0.5, rng);
        (origin, self.direction)
    }
}

/// Disk of origins with directions spread in a cone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergentSource {
    pub position: DVec3,
    pub direction: DVec3,
    pub diameter: f64,
    /// Full opening angle of the cone, radians
    pub divergence: f64,
    pub count: usize,
}

impl DivergentSource {
    pub fn new(position: DVec3, direction: DVec3, diameter: f64, divergence: f64, count: usize) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
            diameter,
            divergence,
            count,
        }
    }
}

impl Source for DivergentSource {
    fn photon_count(&self) -> usize {
        self.count
    }

    fn packet(&self, _index: usize, rng: &mut dyn rand::RngCore) -> Packet {
        let origin = self.position + disk_offset(self.direction, self.diameter * 0.5, rng);
        let tilt = rng.gen::<f64>() * self.divergence * 0.5;
        let phi = rng.gen::<f64>() * TAU;
        let axis = self.direction.any_perpendicular().rotated_around(self.direction, phi);
        (origin, self.direction.rotated_around(axis, tilt))
    }
}

/// Uniform point on the unit sphere.
fn uniform_sphere(rng: &mut dyn rand::RngCore) -> DVec3 {
    let z = 2.0 * rng.gen::<f64>() - 1.0;
    let phi = TAU * rng.gen::<f64>();
    let r = (1.0 - z * z).max(0.0).sqrt();
    DVec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Uniform point of a disk of `radius` perpendicular to `normal`, around the origin.
fn disk_offset(normal: DVec3, radius: f64, rng: &mut dyn rand::RngCore) -> DVec3 {
    let u = normal.any_perpendicular();
    let v = normal.cross(u);
    let r = radius * rng.gen::<f64>().sqrt();
    let phi = TAU * rng.gen::<f64>();
    u * (r * phi.cos()) + v * (r * phi.sin())
}
