//! Flat records exchanged with photon propagation backends.
//!
//! A backend receives one [`PhotonRecord`] per launched photon and one
//! [`MaterialRecord`] per material in the scene, and answers with a stream of
//! [`DataPointRecord`]s. The layouts are `#[repr(C)]` and [`Pod`] so they can be
//! uploaded to an accelerator buffer without conversion.
//!
//! Vectors use vec4 packing for GPU alignment: xyz carries the value, w is
//! padding (or a small payload where documented).

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

/// Launch state of a single photon.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PhotonRecord {
    /// Position (xyz), w unused
    pub position: Vec4,
    /// Unit direction (xyz), w unused
    pub direction: Vec4,
}

impl PhotonRecord {
    /// Size in bytes of one record.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(position: [f32; 3], direction: [f32; 3]) -> Self {
        Self {
            position: Vec4::new(position[0], position[1], position[2], 0.0),
            direction: Vec4::new(direction[0], direction[1], direction[2], 0.0),
        }
    }

    #[inline]
    pub fn position(&self) -> [f32; 3] {
        self.position.truncate().to_array()
    }

    #[inline]
    pub fn direction(&self) -> [f32; 3] {
        self.direction.truncate().to_array()
    }
}

/// Optical properties of one material.
///
/// The derived terms (`mu_t`, `albedo`) are stored so kernels never divide.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MaterialRecord {
    pub mu_s: f32,
    pub mu_a: f32,
    pub mu_t: f32,
    pub g: f32,
    pub n: f32,
    pub albedo: f32,
    _pad: [f32; 2],
}

impl MaterialRecord {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Build a record from the four primary coefficients.
    pub fn new(mu_s: f32, mu_a: f32, g: f32, n: f32) -> Self {
        let mu_t = mu_s + mu_a;
        let albedo = if mu_t == 0.0 { 0.0 } else { mu_s / mu_t };
        Self {
            mu_s,
            mu_a,
            mu_t,
            g,
            n,
            albedo,
            _pad: [0.0; 2],
        }
    }
}

/// One logged interaction: signed weight delta at a position.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DataPointRecord {
    pub delta_weight: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl DataPointRecord {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(delta_weight: f32, position: [f32; 3]) -> Self {
        Self {
            delta_weight,
            x: position[0],
            y: position[1],
            z: position[2],
        }
    }

    #[inline]
    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Raw bytes of a photon buffer.
pub fn photon_bytes(photons: &[PhotonRecord]) -> &[u8] {
    bytemuck::cast_slice(photons)
}

/// Raw bytes of a material buffer.
pub fn material_bytes(materials: &[MaterialRecord]) -> &[u8] {
    bytemuck::cast_slice(materials)
}

/// Reinterpret a backend output buffer as data points.
///
/// Trailing bytes that do not form a whole record are ignored.
pub fn data_points(bytes: &[u8]) -> Vec<DataPointRecord> {
    bytes
        .chunks_exact(DataPointRecord::SIZE)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// Work split and output buffer sizing for one backend dispatch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchPlan {
    /// Byte budget for the interaction output buffer
    pub max_logger_memory: usize,
    /// Number of independent work items (threads, GPU lanes)
    pub work_items: usize,
    /// Photons in the batch
    pub photon_count: usize,
}

impl Default for BatchPlan {
    fn default() -> Self {
        Self {
            max_logger_memory: 100_000_000,
            work_items: 100,
            photon_count: 1000,
        }
    }
}

impl BatchPlan {
    pub fn new(photon_count: usize, work_items: usize, max_logger_memory: usize) -> Self {
        Self {
            max_logger_memory,
            // never more work items than photons, never zero
            work_items: work_items.clamp(1, photon_count.max(1)),
            photon_count,
        }
    }

    /// Records that fit in the logger budget.
    pub fn max_loggable_interactions(&self) -> usize {
        self.max_logger_memory / DataPointRecord::SIZE
    }

    pub fn max_interactions_per_work_item(&self) -> usize {
        self.max_loggable_interactions() / self.work_items
    }

    pub fn photons_per_work_item(&self) -> usize {
        self.photon_count / self.work_items
    }

    /// Expected number of records for the batch.
    ///
    /// A photon scatters about `-ln(threshold) / (1 - albedo)` times before its
    /// weight reaches `threshold`; with no absorption the estimate falls back to
    /// `-ln(threshold) / albedo` per photon. The result is capped by the budget.
    pub fn required_interactions(&self, weight_threshold: f64, albedo: f64) -> usize {
        let per_photon = if weight_threshold <= 0.0 || weight_threshold >= 1.0 {
            1.0
        } else if albedo < 1.0 {
            -weight_threshold.ln() / (1.0 - albedo)
        } else {
            -weight_threshold.ln() / albedo.max(f64::MIN_POSITIVE)
        };
        let wanted = (per_photon * self.photon_count as f64).ceil();
        let cap = self.max_loggable_interactions();
        if wanted.is_finite() && wanted < cap as f64 {
            wanted as usize
        } else {
            cap
        }
    }
}
