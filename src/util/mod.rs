//! Utility types shared by every other module.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`BoundingBox`] and [`VectorExt`] - Geometry helpers on top of glam

mod error;
mod math;

pub use error::*;
pub use math::*;
