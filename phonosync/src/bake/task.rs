use super::BakedDataIdentifier;
use crate::math::{Sphere, Vec3};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Radius of the single probe generated for a reverb point.
pub(crate) const REVERB_POINT_RADIUS: f32 = 10.0;

/// A named set of probes that baked data is computed for and stored with.
///
/// Shared between the host and the bake thread; the bake thread records layer
/// sizes and the size of the last save.
#[derive(Debug)]
pub struct ProbeBatch {
    name: String,
    probes: Vec<Sphere>,
    layers: Mutex<Vec<(BakedDataIdentifier, usize)>>,
    data_size: AtomicUsize,
}

impl ProbeBatch {
    pub fn new(name: impl Into<String>, probes: Vec<Sphere>) -> Self {
        Self {
            name: name.into(),
            probes,
            layers: Mutex::new(Vec::new()),
            data_size: AtomicUsize::new(0),
        }
    }

    /// A batch holding one probe at `center`.
    pub fn single(name: impl Into<String>, center: Vec3, radius: f32) -> Self {
        Self::new(name, vec![Sphere::new(center, radius)])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probes(&self) -> &[Sphere] {
        &self.probes
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Size in bytes of the batch as last persisted.
    pub fn probe_data_size(&self) -> usize {
        self.data_size.load(Ordering::Acquire)
    }

    pub(crate) fn set_probe_data_size(&self, bytes: usize) {
        self.data_size.store(bytes, Ordering::Release);
    }

    pub fn add_or_update_layer(&self, identifier: BakedDataIdentifier, bytes: usize) {
        let mut layers = self.layers.lock();
        match layers.iter_mut().find(|(id, _)| *id == identifier) {
            Some(entry) => entry.1 = bytes,
            None => layers.push((identifier, bytes)),
        }
    }

    pub fn size_for_layer(&self, identifier: &BakedDataIdentifier) -> Option<usize> {
        self.layers
            .lock()
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, bytes)| *bytes)
    }

    pub fn remove_layer(&self, identifier: &BakedDataIdentifier) -> bool {
        let mut layers = self.layers.lock();
        let before = layers.len();
        layers.retain(|(id, _)| id != identifier);
        layers.len() != before
    }

    pub fn layer_count(&self) -> usize {
        self.layers.lock().len()
    }
}

/// What a task is baked against.
#[derive(Debug, Clone)]
pub enum BakeTarget {
    /// Probe batches in bake order. `None` entries stand for missing batches
    /// and are skipped.
    ProbeBatches(Vec<Option<Arc<ProbeBatch>>>),
    /// A single listener position baked through a temporary one-probe batch.
    ReverbPoint(Vec3),
}

/// One unit of a bake job: an endpoint and the data to bake for it.
#[derive(Debug, Clone)]
pub struct BakeTask {
    name: String,
    identifier: BakedDataIdentifier,
    target: BakeTarget,
}

impl BakeTask {
    pub fn new(
        name: impl Into<String>,
        identifier: BakedDataIdentifier,
        target: BakeTarget,
    ) -> Self {
        Self {
            name: name.into(),
            identifier,
            target,
        }
    }

    pub fn reverb(name: impl Into<String>, batches: Vec<Option<Arc<ProbeBatch>>>) -> Self {
        Self::new(name, BakedDataIdentifier::reverb(), BakeTarget::ProbeBatches(batches))
    }

    pub fn static_source(
        name: impl Into<String>,
        influence: Sphere,
        batches: Vec<Option<Arc<ProbeBatch>>>,
    ) -> Self {
        Self::new(
            name,
            BakedDataIdentifier::static_source(influence),
            BakeTarget::ProbeBatches(batches),
        )
    }

    pub fn static_listener(
        name: impl Into<String>,
        influence: Sphere,
        batches: Vec<Option<Arc<ProbeBatch>>>,
    ) -> Self {
        Self::new(
            name,
            BakedDataIdentifier::static_listener(influence),
            BakeTarget::ProbeBatches(batches),
        )
    }

    pub fn pathing(name: impl Into<String>, batches: Vec<Option<Arc<ProbeBatch>>>) -> Self {
        Self::new(name, BakedDataIdentifier::pathing(), BakeTarget::ProbeBatches(batches))
    }

    pub fn reverb_point(name: impl Into<String>, position: Vec3) -> Self {
        Self::new(name, BakedDataIdentifier::reverb(), BakeTarget::ReverbPoint(position))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &BakedDataIdentifier {
        &self.identifier
    }

    pub fn target(&self) -> &BakeTarget {
        &self.target
    }

    /// Store key for the temporary batch baked at a reverb point.
    ///
    /// Suffixed so it never collides with a probe batch of the same name.
    pub fn reverb_point_key(&self) -> String {
        format!("{}.reverb", self.name)
    }

    /// Name shown in progress reports, e.g. `"Hallway (Reverb)"`.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.identifier.label())
    }

    /// Number of units (probe batch entries or reverb points) the task bakes.
    pub fn unit_count(&self) -> usize {
        match &self.target {
            BakeTarget::ProbeBatches(batches) => batches.len(),
            BakeTarget::ReverbPoint(_) => 1,
        }
    }
}
