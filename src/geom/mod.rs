//! Geometry primitives of the scene model.
//!
//! - [`Material`] / [`Environment`] - Optical media and their owners
//! - [`Polygon`] - Triangles and quads over a shared vertex arena
//! - [`SurfaceCollection`] - Labelled groups of polygons
//! - [`Ray`] - Query rays

mod environment;
mod material;
mod polygon;
mod ray;
mod surfaces;

pub use environment::*;
pub use material::*;
pub use polygon::*;
pub use ray::*;
pub use surfaces::*;
