//! Labelled surface groups of a solid.

use std::sync::Arc;

use super::{Environment, Polygon};
use crate::util::{DVec3, Error, Result};

/// Surfaces whose label starts with this prefix separate two layers of a stack
/// and keep their own outside environment.
pub const INTERFACE_PREFIX: &str = "interface";

#[derive(Debug, Clone)]
struct SurfaceGroup {
    label: Arc<str>,
    polygons: Vec<u32>,
}

/// Ordered mapping from unique surface label to the polygons of that surface.
///
/// Polygons live in one arena; groups hold indices into it, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SurfaceCollection {
    polygons: Vec<Polygon>,
    groups: Vec<SurfaceGroup>,
}

/// Whether `label` names an internal stack interface.
#[inline]
pub fn is_interface(label: &str) -> bool {
    label.starts_with(INTERFACE_PREFIX)
}

impl SurfaceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of surfaces.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &Arc<str>> + '_ {
        self.groups.iter().map(|g| &g.label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.group(label).is_some()
    }

    /// Add a surface. A label already in use gets the first free `label_{i}`.
    ///
    /// Returns the label actually used.
    pub fn add(&mut self, label: &str, polygons: Vec<Polygon>) -> Arc<str> {
        let label = self.unique_label(label);
        let start = self.polygons.len() as u32;
        let count = polygons.len() as u32;
        self.polygons.extend(polygons.into_iter().map(|mut p| {
            p.set_surface_label(label.clone());
            p
        }));
        self.groups.push(SurfaceGroup {
            label: label.clone(),
            polygons: (start..start + count).collect(),
        });
        label
    }

    fn unique_label(&self, label: &str) -> Arc<str> {
        if !self.contains(label) {
            return Arc::from(label);
        }
        let mut idx = 0usize;
        loop {
            let candidate = format!("{label}_{idx}");
            if !self.contains(&candidate) {
                tracing::debug!(from = label, to = %candidate, "surface label disambiguated");
                return Arc::from(candidate);
            }
            idx += 1;
        }
    }

    fn group(&self, label: &str) -> Option<&SurfaceGroup> {
        self.groups.iter().find(|g| &*g.label == label)
    }

    fn group_or_err(&self, label: &str) -> Result<&SurfaceGroup> {
        self.group(label).ok_or_else(|| Error::SurfaceNotFound(label.to_string()))
    }

    /// All polygons, surface by surface.
    #[inline]
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Polygons of one surface.
    pub fn surface(&self, label: &str) -> Result<impl Iterator<Item = &Polygon> + '_> {
        let group = self.group_or_err(label)?;
        Ok(group.polygons.iter().map(move |&i| &self.polygons[i as usize]))
    }

    /// Arena indices of one surface's polygons.
    pub fn surface_indices(&self, label: &str) -> Result<&[u32]> {
        Ok(&self.group_or_err(label)?.polygons)
    }

    /// The single inside environment shared by every polygon of a surface.
    pub fn inside_environment(&self, label: &str) -> Result<Environment> {
        let mut envs = self.surface(label)?.map(|p| p.inside);
        let first = envs.next().ok_or_else(|| Error::AmbiguousEnvironment(label.to_string()))?;
        if envs.all(|e| e == first) {
            Ok(first)
        } else {
            Err(Error::AmbiguousEnvironment(label.to_string()))
        }
    }

    /// Set the outside environment of one surface, or of every surface that is
    /// not a stack interface when `label` is `None`.
    pub fn set_outside_environment(&mut self, env: Environment, label: Option<&str>) -> Result<()> {
        let targets: Vec<u32> = match label {
            Some(label) => self.group_or_err(label)?.polygons.clone(),
            None => self
                .groups
                .iter()
                .filter(|g| !is_interface(&g.label))
                .flat_map(|g| g.polygons.iter().copied())
                .collect(),
        };
        for i in targets {
            self.polygons[i as usize].outside = env;
        }
        Ok(())
    }

    /// Set the inside environment of one surface, or of all of them.
    pub fn set_inside_environment(&mut self, env: Environment, label: Option<&str>) -> Result<()> {
        match label {
            Some(label) => {
                let targets = self.group_or_err(label)?.polygons.clone();
                for i in targets {
                    self.polygons[i as usize].inside = env;
                }
            }
            None => self.polygons.iter_mut().for_each(|p| p.inside = env),
        }
        Ok(())
    }

    /// Rename a surface, keeping its position in the ordering.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        if from != to && self.contains(to) {
            return Err(Error::invalid(format!("surface label '{to}' already in use")));
        }
        let label: Arc<str> = Arc::from(to);
        let group = self
            .groups
            .iter_mut()
            .find(|g| &*g.label == from)
            .ok_or_else(|| Error::SurfaceNotFound(from.to_string()))?;
        group.label = label.clone();
        for &i in &group.polygons {
            self.polygons[i as usize].set_surface_label(label.clone());
        }
        Ok(())
    }

    /// Remove a surface and return its polygons.
    pub fn remove(&mut self, label: &str) -> Result<Vec<Polygon>> {
        let pos = self
            .groups
            .iter()
            .position(|g| &*g.label == label)
            .ok_or_else(|| Error::SurfaceNotFound(label.to_string()))?;
        self.groups.remove(pos);

        let mut keep = vec![false; self.polygons.len()];
        for g in &self.groups {
            for &i in &g.polygons {
                keep[i as usize] = true;
            }
        }
        let mut remap = vec![u32::MAX; self.polygons.len()];
        let mut kept = Vec::with_capacity(self.polygons.len());
        let mut removed = Vec::new();
        for (i, p) in std::mem::take(&mut self.polygons).into_iter().enumerate() {
            if keep[i] {
                remap[i] = kept.len() as u32;
                kept.push(p);
            } else {
                removed.push(p);
            }
        }
        self.polygons = kept;
        for g in &mut self.groups {
            for i in &mut g.polygons {
                *i = remap[*i as usize];
            }
        }
        Ok(removed)
    }

    /// Merge another collection. Labels must not collide.
    pub fn extend(&mut self, other: SurfaceCollection) -> Result<()> {
        if let Some(clash) = other.groups.iter().find(|g| self.contains(&g.label)) {
            return Err(Error::invalid(format!("surface label collision on '{}'", clash.label)));
        }
        let offset = self.polygons.len() as u32;
        self.polygons.extend(other.polygons);
        self.groups.extend(other.groups.into_iter().map(|mut g| {
            g.polygons.iter_mut().for_each(|i| *i += offset);
            g
        }));
        Ok(())
    }

    /// Recompute cached normals, centroids and boxes against `arena`.
    pub fn reset_geometry(&mut self, arena: &[DVec3]) {
        for p in &mut self.polygons {
            p.refresh(arena);
        }
    }

    /// Drop every cached normal, centroid and box.
    pub fn invalidate_geometry(&mut self) {
        for p in &mut self.polygons {
            p.invalidate();
        }
    }

    pub(crate) fn rebase_environments(&mut self, by: u32) {
        for p in &mut self.polygons {
            p.inside = p.inside.rebased(by);
            p.outside = p.outside.rebased(by);
        }
    }

    pub(crate) fn remap_vertices(&mut self, map: impl Fn(u32) -> u32 + Copy) {
        for p in &mut self.polygons {
            p.remap_vertices(map);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Material, SolidId};

    fn env(id: u32) -> Environment {
        Environment::new(Material::new(1.0, 0.1, 0.9, 1.4), Some(SolidId(id)))
    }

    fn square(first: u32, inside: Environment) -> Polygon {
        let world = Environment::world(Material::VACUUM);
        Polygon::new([first, first + 1, first + 2, first + 3], Arc::from(""), inside, world)
    }

    #[test]
    fn test_labels_disambiguated() {
        let mut s = SurfaceCollection::new();
        assert_eq!(&*s.add("top", vec![square(0, env(0))]), "top");
        assert_eq!(&*s.add("top", vec![square(0, env(0))]), "top_0");
        assert_eq!(&*s.add("top", vec![square(0, env(0))]), "top_1");
        assert_eq!(s.len(), 3);
        assert_eq!(&**s.surface("top_1").unwrap().next().unwrap().surface_label(), "top_1");
    }

    #[test]
    fn test_missing_surface() {
        let s = SurfaceCollection::new();
        assert!(matches!(s.surface_indices("nope"), Err(Error::SurfaceNotFound(_))));
    }

    #[test]
    fn test_inside_environment() {
        let mut s = SurfaceCollection::new();
        s.add("front", vec![square(0, env(0)), square(4, env(0))]);
        s.add("mixed", vec![square(0, env(0)), square(4, env(1))]);
        assert_eq!(s.inside_environment("front").unwrap(), env(0));
        assert!(matches!(s.inside_environment("mixed"), Err(Error::AmbiguousEnvironment(_))));
    }

    #[test]
    fn test_set_outside_skips_interfaces() {
        let mut s = SurfaceCollection::new();
        s.add("front", vec![square(0, env(0))]);
        s.add("interface0", vec![square(4, env(0))]);
        s.set_outside_environment(env(1), Some("interface0")).unwrap();
        s.set_outside_environment(env(7), None).unwrap();

        assert_eq!(s.surface("front").unwrap().next().unwrap().outside, env(7));
        assert_eq!(s.surface("interface0").unwrap().next().unwrap().outside, env(1));
    }

    #[test]
    fn test_remove_and_extend() {
        let mut a = SurfaceCollection::new();
        a.add("left", vec![square(0, env(0))]);
        a.add("right", vec![square(4, env(0)), square(8, env(0))]);
        a.add("top", vec![square(12, env(0))]);

        let removed = a.remove("right").unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(a.polygons().len(), 2);
        assert_eq!(a.surface("top").unwrap().next().unwrap().vertex_indices()[0], 12);

        let mut b = SurfaceCollection::new();
        b.add("bottom", vec![square(16, env(1))]);
        a.extend(b).unwrap();
        assert_eq!(a.surface_indices("bottom").unwrap(), &[2]);

        let mut c = SurfaceCollection::new();
        c.add("left", vec![]);
        assert!(a.extend(c).is_err());
    }

    #[test]
    fn test_rename() {
        let mut s = SurfaceCollection::new();
        s.add("top", vec![square(0, env(0))]);
        s.add("bottom", vec![square(4, env(0))]);
        s.rename("top", "interface0").unwrap();
        assert!(s.contains("interface0"));
        assert!(!s.contains("top"));
        assert!(s.rename("bottom", "interface0").is_err());
    }
}
