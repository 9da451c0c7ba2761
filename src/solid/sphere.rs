//! Triangulated spheres.

use std::collections::HashMap;

use super::Solid;
use crate::geom::Material;
use crate::util::{DVec3, Result};

impl Solid {
    /// Icosphere: an icosahedron subdivided `order` times, projected onto a
    /// sphere of `radius` around `position`. Single surface `sphere`.
    pub fn icosphere(
        label: &str,
        radius: f64,
        order: u32,
        position: DVec3,
        material: Material,
    ) -> Result<Solid> {
        let (mut points, mut faces) = icosahedron();
        for _ in 0..order {
            faces = subdivide(&mut points, &faces);
        }

        let vertices: Vec<DVec3> = points.iter().map(|p| position + p.normalize() * radius).collect();
        let loops: Vec<Vec<u32>> = faces
            .into_iter()
            .map(|[a, b, c]| {
                let (pa, pb, pc) = (points[a as usize], points[b as usize], points[c as usize]);
                let outward = (pb - pa).cross(pc - pa).dot(pa + pb + pc) > 0.0;
                if outward {
                    vec![a, b, c]
                } else {
                    vec![a, c, b]
                }
            })
            .collect();

        let mut solid = Solid::new(label, material, vertices, vec![("sphere", loops)])?;
        solid.position = position;
        Ok(solid)
    }
}

fn icosahedron() -> (Vec<DVec3>, Vec<[u32; 3]>) {
    let t = (1.0 + 5f64.sqrt()) / 2.0;
    let points = vec![
        DVec3::new(-1.0, t, 0.0),
        DVec3::new(1.0, t, 0.0),
        DVec3::new(-1.0, -t, 0.0),
        DVec3::new(1.0, -t, 0.0),
        DVec3::new(0.0, -1.0, t),
        DVec3::new(0.0, 1.0, t),
        DVec3::new(0.0, -1.0, -t),
        DVec3::new(0.0, 1.0, -t),
        DVec3::new(t, 0.0, -1.0),
        DVec3::new(t, 0.0, 1.0),
        DVec3::new(-t, 0.0, -1.0),
        DVec3::new(-t, 0.0, 1.0),
    ];
    let faces = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];
    (points, faces)
}

/// Split every triangle in four; edge midpoints are shared between neighbours.
fn subdivide(points: &mut Vec<DVec3>, faces: &[[u32; 3]]) -> Vec<[u32; 3]> {
    let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
    let mut midpoint = |a: u32, b: u32, points: &mut Vec<DVec3>| -> u32 {
        let key = (a.min(b), a.max(b));
        *midpoints.entry(key).or_insert_with(|| {
            let p = (points[a as usize] + points[b as usize]) * 0.5;
            points.push(p.normalize());
            (points.len() - 1) as u32
        })
    };

    let mut out = Vec::with_capacity(faces.len() * 4);
    for &[a, b, c] in faces {
        let ab = midpoint(a, b, points);
        let bc = midpoint(b, c, points);
        let ca = midpoint(c, a, points);
        out.push([a, ab, ca]);
        out.push([b, bc, ab]);
        out.push([c, ca, bc]);
        out.push([ab, bc, ca]);
    }
    out
}
