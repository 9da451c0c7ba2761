//! Material environments and solid handles.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Material;

/// Handle of a solid (or stack layer) in the scene's solid table.
///
/// Before a solid is inserted into a scene its ids are local (the layer index);
/// insertion rebases them onto the scene table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolidId(pub u32);

impl SolidId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn offset(self, by: u32) -> Self {
        Self(self.0 + by)
    }
}

impl fmt::Debug for SolidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SolidId({})", self.0)
    }
}

/// The medium surrounding a point: a material and the solid it belongs to.
///
/// `solid` is `None` for the world. Two environments are equal when both the
/// material and the solid match.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Environment {
    pub material: Material,
    pub solid: Option<SolidId>,
}

impl Environment {
    pub const fn new(material: Material, solid: Option<SolidId>) -> Self {
        Self { material, solid }
    }

    /// World environment made of `material`.
    pub const fn world(material: Material) -> Self {
        Self { material, solid: None }
    }

    #[inline]
    pub fn is_world(&self) -> bool {
        self.solid.is_none()
    }

    /// Same material, solid id shifted by `by`. World stays world.
    #[inline]
    pub(crate) fn rebased(self, by: u32) -> Self {
        Self {
            material: self.material,
            solid: self.solid.map(|id| id.offset(by)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_equality() {
        let m = Material::new(1.0, 0.1, 0.9, 1.4);
        let a = Environment::new(m, Some(SolidId(0)));
        assert_eq!(a, Environment::new(m, Some(SolidId(0))));
        assert_ne!(a, Environment::new(m, Some(SolidId(1))));
        assert_ne!(a, Environment::world(m));
        assert_ne!(a, Environment::new(Material::VACUUM, Some(SolidId(0))));
    }

    #[test]
    fn test_rebased() {
        let m = Material::VACUUM;
        assert_eq!(Environment::new(m, Some(SolidId(2))).rebased(3).solid, Some(SolidId(5)));
        assert!(Environment::world(m).rebased(3).is_world());
    }
}
