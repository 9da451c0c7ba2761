//! Monte Carlo photon transport.
//!
//! - [`Photon`] - Position, direction, weight and current medium of one packet
//! - [`Transport`] - The per-photon loop: free paths, boundary crossings, scattering
//! - [`Fresnel`] - Reflection and refraction at material interfaces
//! - [`Logger`] - Weight deposits keyed by solid and surface
//! - [`Simulation`] - Bulk runs over a [`Source`], sequential or on rayon
//! - [`CpuBackend`] - Batch propagation over flat `turbid-wire` records

mod backend;
mod config;
mod engine;
mod fresnel;
mod logger;
mod photon;
mod run;
mod source;

pub use backend::*;
pub use config::*;
pub use engine::*;
pub use fresnel::*;
pub use logger::*;
pub use photon::*;
pub use run::*;
pub use source::*;
