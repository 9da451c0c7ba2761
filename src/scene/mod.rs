//! Scenes: solids placed in a world medium.
//!
//! A [`Scene`] is built once and is read-only during transport, so it can be
//! shared by reference across worker threads. It owns:
//! - the solids, each bound to a range of the solid table;
//! - the solid table, one entry per layer, which [`SolidId`]s index;
//! - a flat polygon index that gives every polygon a scene-wide [`PolygonId`].
//!
//! On every insertion the outside environment of each solid is recomputed as
//! the environment of the smallest solid containing it, or the world.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::geom::{Environment, Material, Polygon, PolygonId, PolygonView, SolidId};
use crate::solid::Solid;
use crate::util::{BoundingBox, DVec3, Error, Result};

/// Label used for records and lookups that fall in the world medium.
pub const WORLD_LABEL: &str = "world";

/// Overlap volumes below this are treated as touching.
const EPS_OVERLAP: f64 = 1e-12;

/// Scene construction options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneOptions {
    /// Reject solids that partially overlap another one
    pub check_overlaps: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self { check_overlaps: true }
    }
}

/// One entry of the solid table.
#[derive(Debug, Clone)]
pub struct SolidEntry {
    pub label: Arc<str>,
    pub material: Material,
    /// Index of the owning solid in [`Scene::solids`]
    pub owner: usize,
    /// Layer within the owning solid
    pub layer: usize,
}

#[derive(Debug, Clone, Copy)]
struct PolygonLoc {
    solid: u32,
    local: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Disjoint,
    FirstInsideSecond,
    SecondInsideFirst,
    Partial,
}

/// Solids in a world medium.
#[derive(Debug, Clone)]
pub struct Scene {
    world: Material,
    options: SceneOptions,
    solids: Vec<Solid>,
    table: Vec<SolidEntry>,
    /// `containers[i]` lists the solids that fully contain solid `i`
    containers: Vec<Vec<usize>>,
    polygons: Vec<PolygonLoc>,
    /// First scene-wide polygon index of each solid
    polygon_start: Vec<u32>,
    world_label: Arc<str>,
}

impl Scene {
    /// Empty scene filled with `world`.
    pub fn new(world: Material) -> Self {
        Self::with_options(world, SceneOptions::default())
    }

    pub fn with_options(world: Material, options: SceneOptions) -> Self {
        Self {
            world,
            options,
            solids: Vec::new(),
            table: Vec::new(),
            containers: Vec::new(),
            polygons: Vec::new(),
            polygon_start: Vec::new(),
            world_label: Arc::from(WORLD_LABEL),
        }
    }

    /// Build a scene from solids in one go.
    pub fn from_solids(solids: Vec<Solid>, world: Material, options: SceneOptions) -> Result<Self> {
        let mut scene = Self::with_options(world, options);
        for solid in solids {
            scene.add(solid)?;
        }
        Ok(scene)
    }

    /// Insert a solid and return its index.
    #[tracing::instrument(skip_all, fields(label = solid.label()))]
    pub fn add(&mut self, mut solid: Solid) -> Result<usize> {
        self.world.validate()?;
        if solid.is_bound() {
            return Err(Error::invalid(format!("solid '{}' already belongs to a scene", solid.label())));
        }

        let label = self.unique_solid_label(solid.label());
        if label != solid.label() {
            tracing::debug!(from = solid.label(), to = %label, "solid label disambiguated");
            solid.relabel(&label);
        }

        let index = self.solids.len();
        let mut own_containers = Vec::new();
        let mut contained = Vec::new();
        for (i, other) in self.solids.iter().enumerate() {
            match relation(&solid, other) {
                Relation::Disjoint => {}
                Relation::FirstInsideSecond => {
                    if other.is_stack() {
                        return Err(Error::Unsupported(format!(
                            "placing '{}' inside stack '{}'",
                            solid.label(),
                            other.label()
                        )));
                    }
                    own_containers.push(i);
                }
                Relation::SecondInsideFirst => contained.push(i),
                Relation::Partial => {
                    if self.options.check_overlaps {
                        return Err(Error::PartialOverlap {
                            first: solid.label().to_string(),
                            second: other.label().to_string(),
                        });
                    }
                    tracing::warn!(first = solid.label(), second = other.label(), "partial overlap accepted");
                }
            }
        }
        if solid.is_stack() && !contained.is_empty() {
            return Err(Error::Unsupported(format!("placing solids inside stack '{}'", solid.label())));
        }

        let base = self.table.len() as u32;
        for k in 0..solid.layers().len() {
            let layer_label = if solid.layers().len() == 1 {
                Arc::from(solid.label())
            } else {
                self.unique_table_label(&solid.layers()[k].label)
            };
            solid.relabel_layer(k, layer_label.clone());
            self.table.push(SolidEntry {
                label: layer_label,
                material: solid.layers()[k].material,
                owner: index,
                layer: k,
            });
        }
        solid.bind(base)?;

        self.polygon_start.push(self.polygons.len() as u32);
        for local in 0..solid.polygons().len() as u32 {
            self.polygons.push(PolygonLoc { solid: index as u32, local });
        }
        for &i in &contained {
            self.containers[i].push(index);
        }
        self.containers.push(own_containers);
        self.solids.push(solid);
        self.reset_outside_environments();
        Ok(index)
    }

    fn unique_solid_label(&self, label: &str) -> String {
        let taken = |l: &str| self.solids.iter().any(|s| s.label() == l) || self.table.iter().any(|e| &*e.label == l);
        if !taken(label) {
            return label.to_string();
        }
        (0..)
            .map(|i| format!("{label}_{i}"))
            .find(|candidate| !taken(candidate.as_str()))
            .unwrap_or_else(|| label.to_string())
    }

    fn unique_table_label(&self, label: &str) -> Arc<str> {
        Arc::from(self.unique_solid_label(label))
    }

    /// Recompute every solid's outside environment from the containment graph.
    fn reset_outside_environments(&mut self) {
        for i in 0..self.solids.len() {
            let env = self.containers[i]
                .iter()
                .copied()
                .min_by(|&a, &b| {
                    let va = self.solids[a].bbox().volume();
                    let vb = self.solids[b].bbox().volume();
                    va.total_cmp(&vb)
                })
                .map(|c| self.solids[c].environment())
                .unwrap_or_else(|| self.world_environment());
            self.solids[i].set_outside_environment(env);
        }
    }

    #[inline]
    pub fn world(&self) -> Material {
        self.world
    }

    #[inline]
    pub fn world_environment(&self) -> Environment {
        Environment::world(self.world)
    }

    #[inline]
    pub fn options(&self) -> SceneOptions {
        self.options
    }

    #[inline]
    pub fn solids(&self) -> &[Solid] {
        &self.solids
    }

    #[inline]
    pub fn solid(&self, index: usize) -> &Solid {
        &self.solids[index]
    }

    /// Find a solid by label.
    pub fn solid_by_label(&self, label: &str) -> Option<&Solid> {
        self.solids.iter().find(|s| s.label() == label)
    }

    #[inline]
    pub fn solid_table(&self) -> &[SolidEntry] {
        &self.table
    }

    /// Label of a solid table entry.
    #[inline]
    pub fn label(&self, id: SolidId) -> &Arc<str> {
        &self.table[id.index()].label
    }

    /// Label of the solid an environment belongs to, or [`WORLD_LABEL`].
    pub fn environment_label(&self, env: &Environment) -> &Arc<str> {
        match env.solid {
            Some(id) => self.label(id),
            None => &self.world_label,
        }
    }

    /// Union of all solid boxes, `None` for an empty scene.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        if self.solids.is_empty() {
            return None;
        }
        let mut bbox = BoundingBox::EMPTY;
        for solid in &self.solids {
            bbox.expand_by_box(&solid.bbox());
        }
        Some(bbox)
    }

    /// Environment at `p`: the innermost solid containing it, else the world.
    pub fn environment_at(&self, p: DVec3) -> Environment {
        self.solids
            .iter()
            .filter(|s| s.bbox().padded(crate::solid::EPS_SURFACE).contains_point(p))
            .filter_map(|s| s.environment_at(p).map(|env| (s.bbox().volume(), env)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, env)| env)
            .unwrap_or_else(|| self.world_environment())
    }

    /// Number of polygons across all solids.
    #[inline]
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn polygon_ids(&self) -> impl Iterator<Item = PolygonId> {
        (0..self.polygons.len() as u32).map(PolygonId)
    }

    /// Polygon and the arena its vertices live in.
    #[inline]
    pub fn polygon(&self, id: PolygonId) -> PolygonView<'_> {
        let loc = self.polygons[id.index()];
        self.solids[loc.solid as usize].polygon_view(loc.local as usize)
    }

    /// Index of the solid owning a polygon.
    #[inline]
    pub fn polygon_owner(&self, id: PolygonId) -> usize {
        self.polygons[id.index()].solid as usize
    }

    /// Scene-wide ids of one solid's polygons.
    pub fn solid_polygon_ids(&self, index: usize) -> impl Iterator<Item = PolygonId> {
        let start = self.polygon_start.get(index).copied().unwrap_or(0);
        let count = self.solids.get(index).map_or(0, |s| s.polygons().len() as u32);
        (start..start + count).map(PolygonId)
    }

    /// All polygons with their ids.
    pub fn polygons(&self) -> impl Iterator<Item = (PolygonId, &Polygon, PolygonView<'_>)> + '_ {
        self.polygon_ids().map(move |id| {
            let view = self.polygon(id);
            (id, view.polygon(), view)
        })
    }
}

/// Containment relation between a new solid and an existing one.
fn relation(first: &Solid, second: &Solid) -> Relation {
    let (a, b) = (first.bbox(), second.bbox());
    if !a.intersects(&b) || a.overlap_volume(&b) <= EPS_OVERLAP {
        return Relation::Disjoint;
    }
    if b.contains_box(&a, crate::solid::EPS_SURFACE) && second.contains_all(first.vertices()) {
        return Relation::FirstInsideSecond;
    }
    if a.contains_box(&b, crate::solid::EPS_SURFACE) && first.contains_all(second.vertices()) {
        return Relation::SecondInsideFirst;
    }
    Relation::Partial
}
