//! Reflection and refraction at material interfaces.

use crate::geom::Environment;
use crate::intersect::Intersection;
use crate::util::{DVec3, VectorExt};

/// Cross products shorter than this mean normal incidence.
const EPS_NORMAL_INCIDENCE: f64 = 1e-7;

/// What happens to a photon meeting an interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FresnelOutcome {
    pub reflected: bool,
    /// Unit axis of the plane of incidence
    pub axis: DVec3,
    /// Rotation of the direction about `axis`, in radians
    pub deflection: f64,
    /// Environment the photon ends up in
    pub next: Environment,
}

impl FresnelOutcome {
    /// New direction after the interaction.
    #[inline]
    pub fn redirect(&self, direction: DVec3) -> DVec3 {
        direction.rotated_around(self.axis, self.deflection)
    }
}

/// Decides between reflection and refraction.
///
/// `draw` is a uniform number in `[0, 1)` supplied by the transport loop, so
/// implementations stay deterministic.
pub trait InterfaceModel: Send + Sync {
    fn interact(&self, direction: DVec3, hit: &Intersection, draw: f64) -> FresnelOutcome;
}

/// Unpolarized Fresnel equations with a stochastic reflect/refract choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fresnel;

impl InterfaceModel for Fresnel {
    fn interact(&self, direction: DVec3, hit: &Intersection, draw: f64) -> FresnelOutcome {
        let (from, to) = hit.crossing(direction);
        let (n1, n2) = (from.material.n, to.material.n);
        let geometry = IncidenceGeometry::new(direction, hit.normal);

        let reflected = draw < reflection_coefficient(n1, n2, geometry.theta);
        if reflected {
            FresnelOutcome {
                reflected,
                axis: geometry.axis,
                deflection: reflection_deflection(geometry.theta),
                next: from,
            }
        } else {
            FresnelOutcome {
                reflected,
                axis: geometry.axis,
                deflection: refraction_deflection(n1, n2, geometry.theta),
                next: to,
            }
        }
    }
}

/// Plane and angle of incidence.
#[derive(Debug, Clone, Copy)]
pub struct IncidenceGeometry {
    pub axis: DVec3,
    /// Angle between the direction and the normal on its far side, `[0, pi/2]`
    pub theta: f64,
}

impl IncidenceGeometry {
    pub fn new(direction: DVec3, normal: DVec3) -> Self {
        // normal flipped to point along the direction of travel
        let normal = if direction.dot(normal) < 0.0 { -normal } else { normal };
        let cross = direction.cross(normal);
        let axis = if cross.length() < EPS_NORMAL_INCIDENCE {
            direction.any_perpendicular()
        } else {
            cross.normalize()
        };
        let theta = direction.dot(normal).clamp(-1.0, 1.0).acos();
        Self { axis, theta }
    }
}

/// Probability of reflection for light going from index `n1` into `n2`.
pub fn reflection_coefficient(n1: f64, n2: f64, theta: f64) -> f64 {
    if n1 == n2 {
        return 0.0;
    }
    if theta == 0.0 {
        let r = (n2 - n1) / (n2 + n1);
        return r * r;
    }
    let sa1 = theta.sin();
    let sa2 = sa1 * n1 / n2;
    if sa2 > 1.0 {
        return 1.0;
    }
    let ca1 = (1.0 - sa1 * sa1).sqrt();
    let ca2 = (1.0 - sa2 * sa2).sqrt();

    let cap = ca1 * ca2 - sa1 * sa2;
    let cam = ca1 * ca2 + sa1 * sa2;
    let sap = sa1 * ca2 + ca1 * sa2;
    let sam = sa1 * ca2 - ca1 * sa2;
    0.5 * sam * sam * (cap * cap + cam * cam) / (sap * sap * cam * cam)
}

#[inline]
pub fn reflection_deflection(theta: f64) -> f64 {
    2.0 * theta - std::f64::consts::PI
}

#[inline]
pub fn refraction_deflection(n1: f64, n2: f64, theta: f64) -> f64 {
    let sin_out = (n1 / n2 * theta.sin()).clamp(-1.0, 1.0);
    theta - sin_out.asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Material, PolygonId, SolidId};
    use std::f64::consts::FRAC_PI_4;
    use std::sync::Arc;

    fn interface(n_inside: f64, n_outside: f64) -> Intersection {
        Intersection {
            distance: 1.0,
            position: DVec3::ZERO,
            polygon: PolygonId(0),
            normal: DVec3::Z,
            inside: Environment::new(Material::new(1.0, 0.0, 0.0, n_inside), Some(SolidId(0))),
            outside: Environment::world(Material::new(0.0, 0.0, 0.0, n_outside)),
            surface: Arc::from("top"),
            distance_left: 1.0,
        }
    }

    #[test]
    fn test_coefficient_limits() {
        assert_eq!(reflection_coefficient(1.4, 1.4, 0.3), 0.0);
        let r = reflection_coefficient(1.0, 1.5, 0.0);
        assert!((r - 0.04).abs() < 1e-12);
        // total internal reflection past the critical angle
        assert_eq!(reflection_coefficient(1.5, 1.0, 1.2), 1.0);
        let grazing = reflection_coefficient(1.0, 1.5, 1.55);
        assert!(grazing > 0.8 && grazing < 1.0);
    }

    #[test]
    fn test_refraction_follows_snell() {
        let hit = interface(1.5, 1.0);
        let direction = DVec3::new(FRAC_PI_4.sin(), 0.0, -FRAC_PI_4.cos());
        let outcome = Fresnel.interact(direction, &hit, 0.999);
        assert!(!outcome.reflected);
        assert_eq!(outcome.next, hit.inside);

        let out = outcome.redirect(direction);
        let sin_out = out.cross(DVec3::NEG_Z).length();
        assert!((sin_out - FRAC_PI_4.sin() / 1.5).abs() < 1e-12);
        assert!(out.z < 0.0);
        assert!((out.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reflection_mirrors() {
        let hit = interface(1.5, 1.0);
        let direction = DVec3::new(0.6, 0.0, -0.8);
        let outcome = Fresnel.interact(direction, &hit, 0.0);
        assert!(outcome.reflected);
        assert_eq!(outcome.next, hit.outside);
        let out = outcome.redirect(direction);
        assert!((out - DVec3::new(0.6, 0.0, 0.8)).length() < 1e-12);
    }

    #[test]
    fn test_normal_incidence_passes_straight() {
        let hit = interface(1.0, 1.0);
        let outcome = Fresnel.interact(DVec3::Z, &hit, 0.5);
        assert!(!outcome.reflected);
        assert!((outcome.redirect(DVec3::Z) - DVec3::Z).length() < 1e-12);
    }
}
