//! Photon packets.

use crate::geom::Environment;
use crate::util::{DVec3, VectorExt};

/// Why a photon stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fate {
    /// Left the scene through a non-scattering medium
    Escaped,
    /// Weight fell to the threshold
    Absorbed,
    /// Lost at Russian roulette
    Terminated,
}

/// An energy packet travelling through the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Photon {
    pub position: DVec3,
    /// Unit direction of travel
    pub direction: DVec3,
    /// Unit vector orthogonal to `direction`; fixes the scattering plane
    pub er: DVec3,
    pub weight: f64,
    pub environment: Environment,
    pub(crate) fate: Option<Fate>,
    pub(crate) scatter_count: u32,
}

impl Photon {
    /// Full-weight photon at `position` heading along `direction`.
    pub fn new(position: DVec3, direction: DVec3, environment: Environment) -> Self {
        let direction = direction.normalize_or_zero();
        Self {
            position,
            direction,
            er: direction.any_perpendicular(),
            weight: 1.0,
            environment,
            fate: None,
            scatter_count: 0,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.fate.is_none()
    }

    #[inline]
    pub fn fate(&self) -> Option<Fate> {
        self.fate
    }

    /// Scattering events so far.
    #[inline]
    pub fn scatter_count(&self) -> u32 {
        self.scatter_count
    }

    #[inline]
    pub fn move_by(&mut self, distance: f64) {
        self.position += self.direction * distance;
    }

    /// Deflect by polar angle `theta` about an azimuth `phi` around the direction.
    pub fn scatter_by(&mut self, theta: f64, phi: f64) {
        self.er.rotate_around(self.direction, phi);
        self.direction.rotate_around(self.er, theta);
        // keep the frame orthonormal over long walks
        self.direction = self.direction.normalize();
        self.er = (self.er - self.direction * self.er.dot(self.direction)).normalize_or_zero();
        if self.er == DVec3::ZERO {
            self.er = self.direction.any_perpendicular();
        }
    }

    pub(crate) fn kill(&mut self, fate: Fate) {
        self.fate = Some(fate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Material;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_new_photon() {
        let p = Photon::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 2.0), Environment::world(Material::VACUUM));
        assert!(p.is_alive());
        assert_eq!(p.weight, 1.0);
        assert_eq!(p.direction, DVec3::Z);
        assert!(p.er.dot(p.direction).abs() < 1e-12);
        assert!((p.er.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scatter_by() {
        let mut p = Photon::new(DVec3::ZERO, DVec3::Z, Environment::default());
        p.er = DVec3::X;
        p.scatter_by(FRAC_PI_2, 0.0);
        // rotated a right angle about er
        assert!(p.direction.dot(DVec3::Z).abs() < 1e-12);
        assert!((p.direction.length() - 1.0).abs() < 1e-12);

        let before = p.direction;
        p.scatter_by(0.3, 1.1);
        assert!((p.direction.dot(before) - 0.3f64.cos()).abs() < 1e-12);
        assert!(p.er.dot(p.direction).abs() < 1e-12);
    }
}
