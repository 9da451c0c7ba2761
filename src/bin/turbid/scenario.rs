//! JSON scenario files for the CLI.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

use turbid::prelude::*;

/// Everything needed for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub run: RunConfig,
    pub world: Material,
    pub options: SceneOptions,
    pub solids: Vec<SolidDef>,
    pub source: SourceDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Cuboid {
        size: [f64; 3],
        #[serde(default)]
        primitive: Primitive,
    },
    Icosphere {
        radius: f64,
        #[serde(default)]
        order: u32,
    },
}

/// A solid, optionally with more cuboids stacked onto it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolidDef {
    pub label: String,
    pub shape: Shape,
    #[serde(default)]
    pub position: [f64; 3],
    pub material: Material,
    /// Degrees about x, y, z, applied after stacking
    #[serde(default)]
    pub rotate: Option<[f64; 3]>,
    #[serde(default)]
    pub stack: Vec<StackDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackDef {
    pub on: String,
    pub solid: SolidDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SourceDef {
    Pencil {
        position: [f64; 3],
        direction: [f64; 3],
        count: usize,
    },
    Isotropic {
        position: [f64; 3],
        count: usize,
    },
    Directional {
        position: [f64; 3],
        direction: [f64; 3],
        diameter: f64,
        count: usize,
    },
    Divergent {
        position: [f64; 3],
        direction: [f64; 3],
        diameter: f64,
        divergence: f64,
        count: usize,
    },
}

impl Default for SourceDef {
    fn default() -> Self {
        SourceDef::Pencil {
            position: [0.0; 3],
            direction: [0.0, 0.0, 1.0],
            count: 1000,
        }
    }
}

impl SourceDef {
    pub fn build(&self) -> Box<dyn Source> {
        match *self {
            SourceDef::Pencil { position, direction, count } => {
                Box::new(PencilSource::new(position.into(), direction.into(), count))
            }
            SourceDef::Isotropic { position, count } => Box::new(IsotropicPointSource::new(position.into(), count)),
            SourceDef::Directional { position, direction, diameter, count } => {
                Box::new(DirectionalSource::new(position.into(), direction.into(), diameter, count))
            }
            SourceDef::Divergent { position, direction, diameter, divergence, count } => Box::new(
                DivergentSource::new(position.into(), direction.into(), diameter, divergence, count),
            ),
        }
    }

    pub fn set_count(&mut self, n: usize) {
        match self {
            SourceDef::Pencil { count, .. }
            | SourceDef::Isotropic { count, .. }
            | SourceDef::Directional { count, .. }
            | SourceDef::Divergent { count, .. } => *count = n,
        }
    }
}

impl SolidDef {
    pub fn build(&self) -> anyhow::Result<Solid> {
        let position = DVec3::from(self.position);
        let mut solid = match self.shape {
            Shape::Cuboid { size, primitive } => {
                Solid::cuboid(&self.label, size.into(), position, self.material, primitive)?
            }
            Shape::Icosphere { radius, order } => {
                Solid::icosphere(&self.label, radius, order, position, self.material)?
            }
        };
        for layer in &self.stack {
            if layer.solid.rotate.is_some() {
                bail!("stacked solid '{}' cannot be rotated on its own", layer.solid.label);
            }
            let other = layer.solid.build()?;
            solid = solid
                .stack(other, &layer.on)
                .with_context(|| format!("stacking '{}' on {} of '{}'", layer.solid.label, layer.on, self.label))?;
        }
        if let Some([x, y, z]) = self.rotate {
            solid.rotate(x, y, z);
        }
        Ok(solid)
    }
}

impl Scenario {
    /// The reference scenario: a 2x2x2 scattering cube in vacuum lit from its centre.
    pub fn cube() -> Self {
        Scenario {
            solids: vec![SolidDef {
                label: "cube".into(),
                shape: Shape::Cuboid {
                    size: [2.0; 3],
                    primitive: Primitive::Triangle,
                },
                position: [0.0; 3],
                material: Material::new(30.0, 0.1, 0.8, 1.0),
                rotate: None,
                stack: Vec::new(),
            }],
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let scenario: Scenario =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        scenario.run.validate()?;
        Ok(scenario)
    }

    pub fn scene(&self) -> anyhow::Result<Scene> {
        let solids = self.solids.iter().map(SolidDef::build).collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Scene::from_solids(solids, self.world, self.options)?)
    }
}
