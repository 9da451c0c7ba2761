//! Propagation backends speaking the flat wire records of `turbid-wire`.
//!
//! A backend takes launch records for a scene and returns interaction
//! records. [`CpuBackend`] runs the regular transport loop, on one thread or
//! the rayon pool; accelerator backends plug in behind the same trait.

use glam::Vec3;
use rand::RngCore;
use std::sync::atomic::AtomicBool;
use turbid_wire::{BatchPlan, DataPointRecord, MaterialRecord, PhotonRecord};

use super::logger::Logger;
use super::run::{RunReport, Simulation};
use super::source::{Packet, Source};
use super::RunConfig;
use crate::geom::Material;
use crate::scene::Scene;
use crate::util::Result;

impl From<Material> for MaterialRecord {
    fn from(m: Material) -> Self {
        MaterialRecord::new(m.mu_s as f32, m.mu_a as f32, m.g as f32, m.n as f32)
    }
}

/// Launch record of a packet.
pub fn photon_record((position, direction): Packet) -> PhotonRecord {
    PhotonRecord::new(position.as_vec3().to_array(), direction.as_vec3().to_array())
}

/// Material table of a scene: the world first, then one entry per solid table row.
pub fn material_records(scene: &Scene) -> Vec<MaterialRecord> {
    std::iter::once(scene.world())
        .chain(scene.solid_table().iter().map(|e| e.material))
        .map(MaterialRecord::from)
        .collect()
}

/// Flatten a logger into data point records, keys in sorted order.
pub fn data_point_records(logger: &Logger) -> Vec<DataPointRecord> {
    let mut keys: Vec<_> = logger.keys().collect();
    keys.sort();
    keys.into_iter()
        .flat_map(|key| logger.points(key))
        .map(|p| DataPointRecord::new(p.delta_weight as f32, p.position.as_vec3().to_array()))
        .collect()
}

/// Photons given as wire records.
#[derive(Debug, Clone, Copy)]
pub struct RecordSource<'a> {
    records: &'a [PhotonRecord],
}

impl<'a> RecordSource<'a> {
    pub fn new(records: &'a [PhotonRecord]) -> Self {
        Self { records }
    }
}

impl Source for RecordSource<'_> {
    fn photon_count(&self) -> usize {
        self.records.len()
    }

    fn packet(&self, index: usize, _rng: &mut dyn RngCore) -> Packet {
        let r = &self.records[index];
        (Vec3::from(r.position()).as_dvec3(), Vec3::from(r.direction()).as_dvec3())
    }
}

/// What a backend hands back.
#[derive(Debug, Clone)]
pub struct BackendOutput {
    pub records: Vec<DataPointRecord>,
    pub plan: BatchPlan,
    /// The logger budget ran out and records were dropped
    pub truncated: bool,
    pub report: RunReport,
}

/// Something that can propagate a batch of wire photons.
pub trait PropagationBackend {
    fn name(&self) -> &'static str;

    fn propagate(&self, scene: &Scene, photons: &[PhotonRecord], config: &RunConfig) -> Result<BackendOutput>;
}

/// Backend running the native transport loop.
#[derive(Debug, Clone, Copy)]
pub struct CpuBackend {
    /// Byte budget for returned records
    pub max_logger_memory: usize,
    pub work_items: usize,
}

impl Default for CpuBackend {
    fn default() -> Self {
        let plan = BatchPlan::default();
        Self {
            max_logger_memory: plan.max_logger_memory,
            work_items: rayon::current_num_threads(),
        }
    }
}

impl CpuBackend {
    pub fn plan(&self, photon_count: usize) -> BatchPlan {
        BatchPlan::new(photon_count, self.work_items, self.max_logger_memory)
    }

    /// Same as [`PropagationBackend::propagate`], checking `cancel` between photons.
    pub fn propagate_until(
        &self,
        scene: &Scene,
        photons: &[PhotonRecord],
        config: &RunConfig,
        cancel: Option<&AtomicBool>,
    ) -> Result<BackendOutput> {
        let plan = self.plan(photons.len());
        let albedo = material_records(scene).iter().map(|m| m.albedo as f64).fold(0.0, f64::max);
        tracing::debug!(
            work_items = plan.work_items,
            per_item = plan.photons_per_work_item(),
            expected_records = plan.required_interactions(config.transport.weight_threshold, albedo),
            "batch plan"
        );
        let simulation = Simulation::new(scene, *config)?;
        let report = simulation.run_until(&RecordSource::new(photons), cancel)?;

        let mut records = data_point_records(&report.logger);
        let cap = plan.max_loggable_interactions();
        let truncated = records.len() > cap;
        if truncated {
            tracing::warn!(records = records.len(), cap, "logger budget exceeded, records dropped");
            records.truncate(cap);
        }
        Ok(BackendOutput {
            records,
            plan,
            truncated,
            report,
        })
    }
}

impl PropagationBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    #[tracing::instrument(skip_all, fields(backend = "cpu", photons = photons.len()))]
    fn propagate(&self, scene: &Scene, photons: &[PhotonRecord], config: &RunConfig) -> Result<BackendOutput> {
        self.propagate_until(scene, photons, config, None)
    }
}
