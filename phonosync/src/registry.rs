//! Emitters and listeners participating in simulation.

use crate::simulation::{SimulationCore, SimulationFlags, SimulationInputs, SimulationOutputs};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Lightweight, type-safe handle for an emitter or listener.
///
/// Also used as the engine-side identifier of the endpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SourceId({})", self.0)
    }
}

/// What an endpoint represents in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// A sound emitter.
    Source,
    /// A listener whose reverb is simulated as if it were a source at the listener.
    Listener,
}

/// Per-endpoint simulation state.
///
/// Owned by whichever emitter or listener activated it; the registry only
/// keeps a weak reference. `inputs` are written by the owner at any time and
/// snapshotted into the engine at pass-input-build time. `outputs` are only
/// written by the scheduler after the pass producing them has returned.
#[derive(Debug)]
pub struct SourceState {
    id: SourceId,
    kind: EndpointKind,
    flags: SimulationFlags,
    inputs: Mutex<SimulationInputs>,
    outputs: Mutex<SimulationOutputs>,
}

impl SourceState {
    pub(crate) fn new(
        id: SourceId,
        kind: EndpointKind,
        flags: SimulationFlags,
        inputs: SimulationInputs,
    ) -> Self {
        Self {
            id,
            kind,
            flags,
            inputs: Mutex::new(inputs),
            outputs: Mutex::new(SimulationOutputs::default()),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    /// Passes this endpoint participates in.
    pub fn flags(&self) -> SimulationFlags {
        self.flags
    }

    pub fn set_inputs(&self, inputs: SimulationInputs) {
        *self.inputs.lock() = inputs;
    }

    pub fn update_inputs(&self, f: impl FnOnce(&mut SimulationInputs)) {
        f(&mut self.inputs.lock());
    }

    pub fn inputs(&self) -> SimulationInputs {
        self.inputs.lock().clone()
    }

    /// Last outputs consumed for this endpoint.
    pub fn outputs(&self) -> SimulationOutputs {
        self.outputs.lock().clone()
    }

    /// Copies the current inputs into the engine for the passes in `flags`.
    pub(crate) fn push_inputs<C: SimulationCore + ?Sized>(&self, core: &C, flags: SimulationFlags) {
        let flags = flags & self.flags;
        if flags.is_empty() {
            return;
        }
        let inputs = self.inputs.lock().clone();
        core.set_inputs(self.id, flags, &inputs);
    }

    /// Reads the engine's outputs for the passes in `flags` into this endpoint.
    pub(crate) fn pull_outputs<C: SimulationCore + ?Sized>(&self, core: &C, flags: SimulationFlags) {
        let flags = flags & self.flags;
        if flags.is_empty() {
            return;
        }
        let fresh = core.outputs(self.id, flags);
        self.outputs.lock().update_from(fresh, flags);
    }
}

/// The set of endpoints taking part in simulation passes.
///
/// Registration changes become visible at the next pass-input-build time; each
/// pass iterates a [`snapshot`](Self::snapshot) so concurrent registration
/// never disturbs an iteration in progress.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<SourceId, Weak<SourceState>>>,
    pruned: Mutex<Vec<SourceId>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate_id(&self) -> SourceId {
        SourceId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn add(&self, state: &Arc<SourceState>) {
        if self
            .entries
            .lock()
            .insert(state.id(), Arc::downgrade(state))
            .is_some()
        {
            log::warn!("Endpoint {} registered twice, replacing", state.id());
        }
    }

    pub fn remove(&self, id: SourceId) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Shallow copy of the live endpoints, sources first, then listeners.
    ///
    /// Entries whose owner dropped the state without deactivating are pruned
    /// and held for [`take_pruned`](Self::take_pruned).
    pub fn snapshot(&self) -> Vec<Arc<SourceState>> {
        let mut live = Vec::new();
        self.sweep(Some(&mut live));
        live.sort_by_key(|state| (state.kind() == EndpointKind::Listener, state.id()));
        live
    }

    /// Ids of endpoints dropped without deactivating, since the last call.
    ///
    /// Their engine-side state still exists and must be removed by the caller
    /// while no pass is in flight.
    pub fn take_pruned(&self) -> Vec<SourceId> {
        self.sweep(None);
        std::mem::take(&mut *self.pruned.lock())
    }

    fn sweep(&self, mut live: Option<&mut Vec<Arc<SourceState>>>) {
        let mut dead = Vec::new();
        self.entries.lock().retain(|id, weak| match weak.upgrade() {
            Some(state) => {
                if let Some(live) = live.as_mut() {
                    live.push(state);
                }
                true
            }
            None => {
                log::debug!("Pruning dropped endpoint {}", id);
                dead.push(*id);
                false
            }
        });
        if !dead.is_empty() {
            self.pruned.lock().extend(dead);
        }
    }
}
