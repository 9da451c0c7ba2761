//! Stacking cuboids into layered solids.

use std::sync::Arc;

use super::{Layer, Solid};
use crate::geom::{is_interface, Polygon, SurfaceCollection, INTERFACE_PREFIX};
use crate::util::{BoundingBox, DQuat, DVec3, Error, Result};

/// Coordinates closer than this are welded into one vertex.
const EPS_WELD: f64 = 1e-9;

const EXTERIOR: [&str; 6] = ["left", "right", "bottom", "top", "front", "back"];

/// Axis, facing sign and opposite label of a cuboid surface.
fn face_axis(surface: &str) -> Option<(usize, f64, &'static str)> {
    match surface {
        "left" => Some((0, -1.0, "right")),
        "right" => Some((0, 1.0, "left")),
        "bottom" => Some((1, -1.0, "top")),
        "top" => Some((1, 1.0, "bottom")),
        "front" => Some((2, -1.0, "back")),
        "back" => Some((2, 1.0, "front")),
        _ => None,
    }
}

fn cloned(surfaces: &SurfaceCollection, label: &str) -> Result<Vec<Polygon>> {
    Ok(surfaces.surface(label)?.cloned().collect())
}

fn shift(polygons: &mut [Polygon], by: u32) {
    for p in polygons {
        p.remap_vertices(|v| v + by);
    }
}

impl Solid {
    /// Place `other` flush against `on_surface` of this cuboid and merge both
    /// into one layered solid.
    ///
    /// `on_surface` becomes an internal interface whose inside is this solid's
    /// layer and whose outside is the layer of `other` touching it. The two
    /// cuboids must share their cross-section across the interface.
    pub fn stack(self, other: Solid, on_surface: &str) -> Result<Solid> {
        let (axis, sign, opposite) =
            face_axis(on_surface).ok_or_else(|| Error::SurfaceNotFound(on_surface.to_string()))?;
        let mismatch = || Error::MismatchedStack {
            on: self.label.clone(),
            other: other.label.clone(),
            surface: on_surface.to_string(),
        };

        let (Some(on_shape), Some(other_shape)) = (self.shape, other.shape) else {
            return Err(Error::Unsupported("only cuboids can be stacked".into()));
        };
        if self.orientation != DQuat::IDENTITY || other.orientation != DQuat::IDENTITY {
            return Err(Error::Unsupported("stacking rotated cuboids".into()));
        }
        if self.bound || other.bound {
            return Err(Error::Unsupported("stacking solids already placed in a scene".into()));
        }
        for fixed in (0..3).filter(|&a| a != axis) {
            if (on_shape[fixed] - other_shape[fixed]).abs() > EPS_WELD {
                return Err(mismatch());
            }
        }
        // validates both labels exist and that other's touching face is one layer
        self.surfaces.surface_indices(on_surface)?;
        let layer_offset = self.layers.len() as u32;
        let touching = other.surfaces.inside_environment(opposite)?.rebased(layer_offset);

        let mut other = other;
        let mut target = self.position;
        target[axis] += sign * (on_shape[axis] + other_shape[axis]) * 0.5;
        other.translate_to(target);
        other.surfaces.rebase_environments(layer_offset);

        let vertex_offset = self.vertices.len() as u32;
        let mut shape = on_shape;
        shape[axis] += other_shape[axis];

        let mut surfaces = SurfaceCollection::new();
        for label in EXTERIOR {
            let mut polygons = Vec::new();
            if label != on_surface {
                polygons.extend(cloned(&self.surfaces, label)?);
            }
            if label != opposite {
                let mut theirs = cloned(&other.surfaces, label)?;
                shift(&mut theirs, vertex_offset);
                polygons.extend(theirs);
            }
            surfaces.add(label, polygons);
        }

        let mut next_interface = 0usize;
        for label in self.surfaces.labels().filter(|l| is_interface(l)) {
            surfaces.add(&format!("{INTERFACE_PREFIX}{next_interface}"), cloned(&self.surfaces, label)?);
            next_interface += 1;
        }
        for label in other.surfaces.labels().filter(|l| is_interface(l)) {
            let mut theirs = cloned(&other.surfaces, label)?;
            shift(&mut theirs, vertex_offset);
            surfaces.add(&format!("{INTERFACE_PREFIX}{next_interface}"), theirs);
            next_interface += 1;
        }
        let mut interface = cloned(&self.surfaces, on_surface)?;
        for p in &mut interface {
            p.outside = touching;
        }
        let interface_label = format!("{INTERFACE_PREFIX}{next_interface}");
        surfaces.add(&interface_label, interface);
        tracing::debug!(on = %self.label, other = %other.label, surface = on_surface, interface = %interface_label, "stacked");

        let mut vertices = self.vertices;
        vertices.extend_from_slice(&other.vertices);
        let vertices = weld(vertices, &mut surfaces);

        let mut layers: Vec<Layer> = self.layers;
        layers.extend(other.layers);

        let bbox = BoundingBox::from_points(vertices.iter().copied());
        let mut stacked = Solid {
            label: format!("{}+{}", self.label, other.label),
            vertices,
            surfaces,
            layers,
            position: bbox.center(),
            orientation: DQuat::IDENTITY,
            bbox,
            shape: Some(shape),
            id_offset: 0,
            bound: false,
        };
        stacked.surfaces.reset_geometry(&stacked.vertices);
        Ok(stacked)
    }

    /// Surface label of the most recent interface, if this is a stack.
    pub fn last_interface(&self) -> Option<Arc<str>> {
        self.surfaces.labels().filter(|l| is_interface(l)).last().cloned()
    }
}

/// Merge coincident vertices and drop the ones no polygon references.
fn weld(vertices: Vec<DVec3>, surfaces: &mut SurfaceCollection) -> Vec<DVec3> {
    let mut canonical: Vec<u32> = (0..vertices.len() as u32).collect();
    for i in 0..vertices.len() {
        if let Some(j) = (0..i).find(|&j| canonical[j] == j as u32 && (vertices[i] - vertices[j]).length() < EPS_WELD) {
            canonical[i] = j as u32;
        }
    }
    surfaces.remap_vertices(|v| canonical[v as usize]);

    let mut used = vec![false; vertices.len()];
    for p in surfaces.polygons() {
        for &v in p.vertex_indices() {
            used[v as usize] = true;
        }
    }
    let mut compact = vec![u32::MAX; vertices.len()];
    let mut kept = Vec::with_capacity(vertices.len());
    for (i, v) in vertices.into_iter().enumerate() {
        if used[i] {
            compact[i] = kept.len() as u32;
            kept.push(v);
        }
    }
    surfaces.remap_vertices(|v| compact[v as usize]);
    kept
}
