//! Scattering materials and the sampling laws they define.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::util::{Error, Result};

/// Optical properties of a homogeneous turbid medium.
///
/// Coefficients are in inverse length units of the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Scattering coefficient
    pub mu_s: f64,
    /// Absorption coefficient
    pub mu_a: f64,
    /// Henyey-Greenstein anisotropy in [-1, 1]
    pub g: f64,
    /// Refractive index
    pub n: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self::VACUUM
    }
}

impl Material {
    /// Perfect vacuum: no scattering, no absorption, index 1.
    pub const VACUUM: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(mu_s: f64, mu_a: f64, g: f64, n: f64) -> Self {
        Self { mu_s, mu_a, g, n }
    }

    /// Check coefficient ranges.
    pub fn validate(&self) -> Result<()> {
        let finite = [self.mu_s, self.mu_a, self.g, self.n].iter().all(|v| v.is_finite());
        if !finite {
            return Err(Error::InvalidMaterial(format!("non-finite coefficient in {self:?}")));
        }
        if self.mu_s < 0.0 || self.mu_a < 0.0 {
            return Err(Error::InvalidMaterial(format!(
                "negative coefficient (mu_s={}, mu_a={})",
                self.mu_s, self.mu_a
            )));
        }
        if !(-1.0..=1.0).contains(&self.g) {
            return Err(Error::InvalidMaterial(format!("anisotropy g={} outside [-1, 1]", self.g)));
        }
        if self.n <= 0.0 {
            return Err(Error::InvalidMaterial(format!("refractive index n={} must be positive", self.n)));
        }
        Ok(())
    }

    /// Total attenuation coefficient.
    #[inline]
    pub fn mu_t(&self) -> f64 {
        self.mu_s + self.mu_a
    }

    /// Scattering probability per interaction; zero for vacuum.
    #[inline]
    pub fn albedo(&self) -> f64 {
        let mu_t = self.mu_t();
        if mu_t == 0.0 {
            0.0
        } else {
            self.mu_s / mu_t
        }
    }

    #[inline]
    pub fn is_vacuum(&self) -> bool {
        self.mu_t() == 0.0
    }

    /// Free path length, exponential with rate `mu_t`; infinite in vacuum.
    pub fn sample_distance<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let mu_t = self.mu_t();
        if mu_t == 0.0 {
            return f64::INFINITY;
        }
        // (0, 1] keeps the log finite
        let xi = 1.0 - rng.gen::<f64>();
        -xi.ln() / mu_t
    }

    /// Scattering angles `(theta, phi)`: Henyey-Greenstein polar angle and
    /// uniform azimuth in `[0, 2pi)`.
    pub fn sample_angles<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let g = self.g;
        let xi = rng.gen::<f64>();
        let cos_theta = if g == 0.0 {
            2.0 * xi - 1.0
        } else {
            let ratio = (1.0 - g * g) / (1.0 - g + 2.0 * g * xi);
            (1.0 + g * g - ratio * ratio) / (2.0 * g)
        };
        let theta = cos_theta.clamp(-1.0, 1.0).acos();
        let phi = TAU * rng.gen::<f64>();
        (theta, phi)
    }
}
