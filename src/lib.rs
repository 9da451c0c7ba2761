//! # Turbid
//!
//! Monte Carlo photon transport through scenes of polyhedral solids filled
//! with scattering, absorbing and refracting media.
//!
//! Photons are propagated as weighted packets: each free path is sampled from
//! the local attenuation, boundaries are resolved with Fresnel reflection or
//! refraction, and every scattering event deposits the absorbed part of the
//! weight in a [`transport::Logger`].
//!
//! ## Modules
//!
//! - [`util`] - Errors, bounding boxes, vector helpers
//! - [`geom`] - Materials, environments, polygons, surfaces, rays
//! - [`solid`] - Closed polygonal solids: cuboids, stacks, icospheres, meshes
//! - [`scene`] - A world medium plus solids, with environment lookup
//! - [`tree`] - Surface-area-heuristic space partition over scene polygons
//! - [`intersect`] - Closest-hit queries, brute force or tree accelerated
//! - [`transport`] - Photons, sources, the propagation loop and bulk runs
//!
//! ## Example
//!
//! ```ignore
//! use turbid::prelude::*;
//!
//! let tissue = Material::new(30.0, 0.1, 0.8, 1.4);
//! let mut scene = Scene::new(Material::VACUUM);
//! scene.add(Solid::cuboid("cube", DVec3::splat(2.0), DVec3::ZERO, tissue, Primitive::Triangle)?)?;
//!
//! let report = Simulation::new(&scene, RunConfig::default())?
//!     .run(&PencilSource::new(DVec3::ZERO, DVec3::Z, 1000))?;
//! println!("absorbed in cube: {}", report.logger.absorbed_weight("cube"));
//! ```

pub mod util;
pub mod geom;
pub mod solid;
pub mod scene;
pub mod tree;
pub mod intersect;
pub mod transport;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{BoundingBox, DVec3, Error, Result, VectorExt};
    pub use crate::geom::{Environment, Material, Ray};
    pub use crate::solid::{Primitive, Solid};
    pub use crate::scene::{Scene, SceneOptions};
    pub use crate::tree::{SpacePartition, TreeConfig};
    pub use crate::intersect::{FastFinder, Intersection, IntersectionFinder, SimpleFinder};
    pub use crate::transport::{
        DirectionalSource, DivergentSource, IsotropicPointSource, Logger, PencilSource, Photon, RunConfig,
        RunReport, Simulation, Source, Transport, TransportConfig,
    };
}
