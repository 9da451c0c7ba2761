//! Interaction records.
//!
//! The transport loop only ever appends: weight deltas at points, keyed by
//! solid and optional surface, plus path segments when enabled. Reading the
//! data back is for callers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::util::DVec3;

/// Solid label, plus the surface label for boundary crossings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InteractionKey {
    pub solid: Arc<str>,
    pub surface: Option<Arc<str>>,
}

impl InteractionKey {
    pub fn new(solid: Arc<str>, surface: Option<Arc<str>>) -> Self {
        Self { solid, surface }
    }

    /// Key of a scattering event inside `solid`.
    pub fn volume(solid: Arc<str>) -> Self {
        Self { solid, surface: None }
    }
}

/// A signed weight delta at a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub delta_weight: f64,
    pub position: DVec3,
}

/// Sink for interaction records.
pub trait InteractionLogger {
    fn log_point(&mut self, weight: f64, position: DVec3, key: &InteractionKey);

    fn log_segment(&mut self, start: DVec3, end: DVec3);
}

/// In-memory logger.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    points: HashMap<InteractionKey, Vec<DataPoint>>,
    segments: Vec<(DVec3, DVec3)>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &InteractionKey> {
        self.points.keys()
    }

    /// Records under `key`, empty if none were logged.
    pub fn points(&self, key: &InteractionKey) -> &[DataPoint] {
        self.points.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InteractionKey, &DataPoint)> {
        self.points.iter().flat_map(|(k, v)| v.iter().map(move |p| (k, p)))
    }

    /// Total number of point records.
    pub fn len(&self) -> usize {
        self.points.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.points.values().all(Vec::is_empty)
    }

    pub fn segments(&self) -> &[(DVec3, DVec3)] {
        &self.segments
    }

    /// Sum of every logged delta.
    pub fn total_weight(&self) -> f64 {
        self.points.values().flatten().map(|p| p.delta_weight).sum()
    }

    /// Sum of the deltas under one key.
    pub fn weight(&self, key: &InteractionKey) -> f64 {
        self.points(key).iter().map(|p| p.delta_weight).sum()
    }

    /// Sum of the deltas of one solid, volume and surfaces together.
    pub fn solid_weight(&self, solid: &str) -> f64 {
        self.points
            .iter()
            .filter(|(k, _)| &*k.solid == solid)
            .flat_map(|(_, v)| v.iter())
            .map(|p| p.delta_weight)
            .sum()
    }

    /// Sum of the scattering-loss deltas of one solid.
    pub fn absorbed_weight(&self, solid: &str) -> f64 {
        self.weight(&InteractionKey::volume(Arc::from(solid)))
    }

    /// Move all records of `other` into `self`.
    pub fn merge(&mut self, other: Logger) {
        for (key, mut points) in other.points {
            self.points.entry(key).or_default().append(&mut points);
        }
        self.segments.extend(other.segments);
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.segments.clear();
    }
}

impl InteractionLogger for Logger {
    fn log_point(&mut self, weight: f64, position: DVec3, key: &InteractionKey) {
        let point = DataPoint {
            delta_weight: weight,
            position,
        };
        match self.points.get_mut(key) {
            Some(points) => points.push(point),
            None => {
                self.points.insert(key.clone(), vec![point]);
            }
        }
    }

    fn log_segment(&mut self, start: DVec3, end: DVec3) {
        self.segments.push((start, end));
    }
}

/// [`Logger`] behind a mutex, for callers that drive photons from several
/// threads themselves.
#[derive(Debug, Default)]
pub struct SharedLogger {
    inner: Mutex<Logger>,
}

impl SharedLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a whole buffer under one lock.
    pub fn merge(&self, logger: Logger) {
        self.inner.lock().merge(logger);
    }

    pub fn into_inner(self) -> Logger {
        self.inner.into_inner()
    }

    /// Run `f` against the locked logger.
    pub fn with<T>(&self, f: impl FnOnce(&Logger) -> T) -> T {
        f(&self.inner.lock())
    }
}

impl InteractionLogger for &SharedLogger {
    fn log_point(&mut self, weight: f64, position: DVec3, key: &InteractionKey) {
        self.inner.lock().log_point(weight, position, key);
    }

    fn log_segment(&mut self, start: DVec3, end: DVec3) {
        self.inner.lock().log_segment(start, end);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl InteractionLogger for NullLogger {
    fn log_point(&mut self, _weight: f64, _position: DVec3, _key: &InteractionKey) {}

    fn log_segment(&mut self, _start: DVec3, _end: DVec3) {}
}
