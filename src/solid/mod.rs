//! Closed polyhedral solids.
//!
//! A [`Solid`] owns a vertex arena and a [`SurfaceCollection`] whose polygons
//! index into it. A solid has one or more layers: a plain solid has exactly
//! one, a stack built with [`Solid::stack`] has one per stacked cuboid. Layers
//! are what environments point at, so a photon inside a stack always knows
//! which layer it is in.

mod cuboid;
mod sphere;
mod stack;

pub use cuboid::Primitive;

use std::sync::Arc;

use crate::geom::{
    is_interface, Environment, Material, Polygon, PolygonView, Ray, SolidId, SurfaceCollection,
};
use crate::util::{BoundingBox, DQuat, DVec3, Error, Result};

/// Distance under which a point counts as lying on a surface.
pub const EPS_SURFACE: f64 = 1e-9;

/// Direction of the parity ray used by containment tests. Deliberately not
/// aligned with any axis or face diagonal.
const PARITY_DIRECTION: DVec3 = DVec3::new(0.573_462_3, 0.577_215_7, 0.581_976_7);

/// One homogeneous region of a solid.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub label: Arc<str>,
    pub material: Material,
}

/// A closed mesh with an inside material.
#[derive(Debug, Clone)]
pub struct Solid {
    label: String,
    vertices: Vec<DVec3>,
    surfaces: SurfaceCollection,
    layers: Vec<Layer>,
    position: DVec3,
    orientation: DQuat,
    bbox: BoundingBox,
    /// Extents of an axis-aligned cuboid (or cuboid stack)
    shape: Option<DVec3>,
    id_offset: u32,
    bound: bool,
}

impl Solid {
    /// Build a solid from a vertex arena and labelled faces.
    ///
    /// Faces are index loops wound counter-clockwise seen from outside.
    pub fn new<S: AsRef<str>>(
        label: &str,
        material: Material,
        vertices: Vec<DVec3>,
        faces: Vec<(S, Vec<Vec<u32>>)>,
    ) -> Result<Self> {
        material.validate()?;
        let inside = Environment::new(material, Some(SolidId(0)));
        let outside = Environment::world(Material::VACUUM);

        let mut surfaces = SurfaceCollection::new();
        for (surface, loops) in faces {
            let mut polygons = Vec::with_capacity(loops.len());
            for face in loops {
                if face.len() < 3 {
                    return Err(Error::invalid(format!(
                        "face of surface '{}' has {} vertices",
                        surface.as_ref(),
                        face.len()
                    )));
                }
                if let Some(&bad) = face.iter().find(|&&i| i as usize >= vertices.len()) {
                    return Err(Error::invalid(format!("vertex index {bad} out of range")));
                }
                polygons.push(Polygon::new(face, Arc::from(""), inside, outside));
            }
            surfaces.add(surface.as_ref(), polygons);
        }
        if surfaces.is_empty() {
            return Err(Error::invalid(format!("solid '{label}' has no surfaces")));
        }

        let bbox = BoundingBox::from_points(vertices.iter().copied());
        let mut solid = Self {
            label: label.to_string(),
            vertices,
            surfaces,
            layers: vec![Layer {
                label: Arc::from(label),
                material,
            }],
            position: bbox.center(),
            orientation: DQuat::IDENTITY,
            bbox,
            shape: None,
            id_offset: 0,
            bound: false,
        };
        solid.surfaces.reset_geometry(&solid.vertices);
        Ok(solid)
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn is_stack(&self) -> bool {
        self.layers.len() > 1
    }

    /// Material of the first layer (the only one for plain solids).
    #[inline]
    pub fn material(&self) -> Material {
        self.layers[0].material
    }

    #[inline]
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    #[inline]
    pub fn surfaces(&self) -> &SurfaceCollection {
        &self.surfaces
    }

    #[inline]
    pub fn polygons(&self) -> &[Polygon] {
        self.surfaces.polygons()
    }

    #[inline]
    pub fn polygon_view(&self, index: usize) -> PolygonView<'_> {
        self.surfaces.polygons()[index].view(&self.vertices)
    }

    #[inline]
    pub fn position(&self) -> DVec3 {
        self.position
    }

    #[inline]
    pub fn orientation(&self) -> DQuat {
        self.orientation
    }

    #[inline]
    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Cuboid extents, `None` for non-cuboid meshes.
    #[inline]
    pub fn shape(&self) -> Option<DVec3> {
        self.shape
    }

    /// Handle of layer `k` (local before insertion into a scene).
    #[inline]
    pub fn layer_id(&self, k: usize) -> SolidId {
        SolidId(self.id_offset + k as u32)
    }

    pub fn layer_environment(&self, k: usize) -> Environment {
        Environment::new(self.layers[k].material, Some(self.layer_id(k)))
    }

    /// Environment of the first layer.
    pub fn environment(&self) -> Environment {
        self.layer_environment(0)
    }

    /// Inside environment of one surface.
    pub fn surface_environment(&self, surface: &str) -> Result<Environment> {
        self.surfaces.inside_environment(surface)
    }

    /// Outside environment of all exterior (non-interface) surfaces.
    pub fn set_outside_environment(&mut self, env: Environment) {
        // None targets every exterior surface and cannot fail
        let _ = self.surfaces.set_outside_environment(env, None);
    }

    pub fn translate_to(&mut self, position: DVec3) {
        let delta = position - self.position;
        self.translate_by(delta);
    }

    pub fn translate_by(&mut self, delta: DVec3) {
        if delta == DVec3::ZERO {
            return;
        }
        for v in &mut self.vertices {
            *v += delta;
        }
        self.position += delta;
        self.refresh_geometry();
    }

    /// Rotate about the solid position by angles in degrees, x first, then y, then z.
    pub fn rotate(&mut self, x_degrees: f64, y_degrees: f64, z_degrees: f64) {
        let rotation = DQuat::from_rotation_z(z_degrees.to_radians())
            * DQuat::from_rotation_y(y_degrees.to_radians())
            * DQuat::from_rotation_x(x_degrees.to_radians());
        if rotation == DQuat::IDENTITY {
            return;
        }
        let center = self.position;
        for v in &mut self.vertices {
            *v = center + rotation * (*v - center);
        }
        self.orientation = (rotation * self.orientation).normalize();
        self.refresh_geometry();
    }

    fn refresh_geometry(&mut self) {
        self.surfaces.invalidate_geometry();
        self.surfaces.reset_geometry(&self.vertices);
        self.bbox = BoundingBox::from_points(self.vertices.iter().copied());
    }

    /// Whether `p` is inside the solid or on its boundary.
    pub fn contains(&self, p: DVec3) -> bool {
        if !self.bbox.padded(EPS_SURFACE).contains_point(p) {
            return false;
        }
        self.parity_contains(p, |poly| !is_interface(poly.surface_label()))
    }

    /// Whether every point is inside the solid or on its boundary.
    pub fn contains_all(&self, points: &[DVec3]) -> bool {
        points.iter().all(|&p| self.contains(p))
    }

    /// Environment at `p`, or `None` when `p` is outside.
    ///
    /// Inside a stack this is the layer's environment; a point lying on an
    /// interface belongs to the layer on the interface's inside.
    pub fn environment_at(&self, p: DVec3) -> Option<Environment> {
        if !self.contains(p) {
            return None;
        }
        if !self.is_stack() {
            return Some(self.environment());
        }
        let on_interface = self
            .polygons()
            .iter()
            .filter(|poly| is_interface(poly.surface_label()))
            .find(|poly| poly.view(&self.vertices).contains_point(p, EPS_SURFACE));
        if let Some(poly) = on_interface {
            return Some(poly.inside);
        }
        (0..self.layers.len())
            .find(|&k| self.layer_contains(k, p))
            .map(|k| self.layer_environment(k))
            .or_else(|| Some(self.environment()))
    }

    fn layer_contains(&self, k: usize, p: DVec3) -> bool {
        let id = Some(self.layer_id(k));
        self.parity_contains(p, |poly| {
            poly.inside.solid == id || (is_interface(poly.surface_label()) && poly.outside.solid == id)
        })
    }

    /// Ray-parity containment over the polygons selected by `filter`.
    fn parity_contains(&self, p: DVec3, filter: impl Fn(&Polygon) -> bool) -> bool {
        let ray = Ray::infinite(p, PARITY_DIRECTION);
        let mut crossings = 0usize;
        for poly in self.polygons().iter().filter(|&poly| filter(poly)) {
            let view = poly.view(&self.vertices);
            if view.contains_point(p, EPS_SURFACE) {
                return true;
            }
            if view.intersect(&ray).is_some() {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }

    pub(crate) fn relabel(&mut self, label: &str) {
        self.label = label.to_string();
        if self.layers.len() == 1 {
            self.layers[0].label = Arc::from(label);
        }
    }

    pub(crate) fn relabel_layer(&mut self, k: usize, label: Arc<str>) {
        self.layers[k].label = label;
    }

    #[inline]
    pub(crate) fn is_bound(&self) -> bool {
        self.bound
    }

    /// Rebase layer handles onto a scene solid table starting at `base`.
    pub(crate) fn bind(&mut self, base: u32) -> Result<()> {
        if self.bound {
            return Err(Error::invalid(format!("solid '{}' already belongs to a scene", self.label)));
        }
        self.surfaces.rebase_environments(base);
        self.id_offset = base;
        self.bound = true;
        Ok(())
    }
}
