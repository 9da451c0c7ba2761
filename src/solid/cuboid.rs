//! Axis-aligned box solids.

use serde::{Deserialize, Serialize};

use super::Solid;
use crate::geom::Material;
use crate::util::{DVec3, Result};

/// Polygon kind used to tessellate flat faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Primitive {
    #[default]
    Triangle,
    Quad,
}

/// Face loops over the eight corners, wound counter-clockwise seen from outside.
const FACES: [(&str, [u32; 4]); 6] = [
    ("left", [7, 3, 0, 4]),
    ("right", [2, 6, 5, 1]),
    ("bottom", [0, 1, 5, 4]),
    ("top", [7, 6, 2, 3]),
    ("front", [3, 2, 1, 0]),
    ("back", [6, 7, 4, 5]),
];

/// Corners 0-3 lie on the front (-z) face counter-clockwise from (-,-), 4-7
/// repeat them on the back (+z) face.
fn corner(i: usize, half: DVec3) -> DVec3 {
    let sx = if matches!(i % 4, 1 | 2) { 1.0 } else { -1.0 };
    let sy = if matches!(i % 4, 2 | 3) { 1.0 } else { -1.0 };
    let sz = if i >= 4 { 1.0 } else { -1.0 };
    DVec3::new(sx, sy, sz) * half
}

impl Solid {
    /// Axis-aligned cuboid of extents `size` centred on `position`.
    ///
    /// Surfaces are labelled `left right bottom top front back` (-x +x -y +y -z +z).
    pub fn cuboid(
        label: &str,
        size: DVec3,
        position: DVec3,
        material: Material,
        primitive: Primitive,
    ) -> Result<Solid> {
        let half = size * 0.5;
        let vertices: Vec<DVec3> = (0..8).map(|i| position + corner(i, half)).collect();
        let faces: Vec<(&str, Vec<Vec<u32>>)> = FACES
            .iter()
            .map(|&(name, [a, b, c, d])| {
                let loops = match primitive {
                    Primitive::Quad => vec![vec![a, b, c, d]],
                    Primitive::Triangle => vec![vec![a, b, c], vec![a, c, d]],
                };
                (name, loops)
            })
            .collect();

        let mut solid = Solid::new(label, material, vertices, faces)?;
        solid.position = position;
        solid.shape = Some(size);
        Ok(solid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::is_interface;

    fn cube(primitive: Primitive) -> Solid {
        let material = Material::new(1.0, 0.1, 0.9, 1.4);
        Solid::cuboid("cube", DVec3::new(2.0, 4.0, 6.0), DVec3::ONE, material, primitive).unwrap()
    }

    #[test]
    fn test_cuboid_layout() {
        let c = cube(Primitive::Quad);
        assert_eq!(c.vertices().len(), 8);
        assert_eq!(c.polygons().len(), 6);
        assert_eq!(c.surfaces().len(), 6);
        assert_eq!(c.bbox().min, DVec3::new(0.0, -1.0, -2.0));
        assert_eq!(c.bbox().max, DVec3::new(2.0, 3.0, 4.0));
        assert_eq!(c.shape(), Some(DVec3::new(2.0, 4.0, 6.0)));
        assert!(c.surfaces().labels().all(|l| !is_interface(l)));

        let t = cube(Primitive::Triangle);
        assert_eq!(t.polygons().len(), 12);
        assert_eq!(t.vertices().len(), 8);
    }

    #[test]
    fn test_cuboid_normals_outward() {
        for primitive in [Primitive::Quad, Primitive::Triangle] {
            let c = cube(primitive);
            for i in 0..c.polygons().len() {
                let view = c.polygon_view(i);
                let outward = (view.centroid() - c.position()).normalize();
                assert!(view.normal().dot(outward) > 0.0, "{:?} polygon {i}", primitive);
            }
        }
    }

    #[test]
    fn test_surface_directions() {
        let c = cube(Primitive::Quad);
        let expect = [
            ("left", -DVec3::X),
            ("right", DVec3::X),
            ("bottom", -DVec3::Y),
            ("top", DVec3::Y),
            ("front", -DVec3::Z),
            ("back", DVec3::Z),
        ];
        for (label, normal) in expect {
            let idx = c.surfaces().surface_indices(label).unwrap()[0] as usize;
            assert!((c.polygon_view(idx).normal() - normal).length() < 1e-12, "{label}");
        }
    }

    #[test]
    fn test_cuboid_contains() {
        let c = cube(Primitive::Triangle);
        assert!(c.contains(DVec3::new(1.0, 1.0, 1.0)));
        assert!(c.contains(DVec3::new(0.0, 0.5, 0.5)));
        assert!(c.contains(DVec3::new(1.999, 2.999, 3.999)));
        assert!(!c.contains(DVec3::new(2.001, 1.0, 1.0)));
    }
}
