//! The simulation engine contract.
//!
//! The acoustic engine itself (ray tracing, energy propagation, path finding) is
//! supplied by the host. PhonoSync only drives it: it decides *when* each entry
//! point runs, on which thread, and in what order inputs are pushed and outputs
//! are read back.
//!
//! All methods take `&self`. Implementations are expected to be safe to call
//! from the scheduler thread and the simulation worker thread, with the
//! guarantee that the scheduler never issues the direct pass and scene commits
//! at the same time as an in-flight reflections/pathing pass touches the same
//! data (see [`RealtimeScheduler`](crate::RealtimeScheduler)).

mod io;

pub use io::{
    DirectOutputs, DirectParams, PathingOutputs, PathingParams, ReflectionsOutputs,
    ReflectionsParams, SharedInputs, SimulationInputs, SimulationOutputs,
};

use crate::error::CoreError;
use crate::registry::SourceId;
use crate::scene::GeometryTarget;

bitflags::bitflags! {
    /// Which simulation passes a call applies to.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct SimulationFlags: u32 {
        /// Per-frame occlusion, attenuation and directivity.
        const DIRECT = 1 << 0;

        /// Indirect sound energy (reverb-like).
        const REFLECTIONS = 1 << 1;

        /// Route finding around obstacles through baked probes.
        const PATHING = 1 << 2;
    }
}

impl SimulationFlags {
    /// The passes the simulation worker runs together.
    pub const REFLECTIONS_PATHING: Self = Self::REFLECTIONS.union(Self::PATHING);
}

/// Synchronous, opaque acoustic simulation engine.
///
/// Scene mutation comes through the [`GeometryTarget`] supertrait.
/// Every call may be expensive (milliseconds). Failures are reported by the
/// `run_*` entry points; setters are infallible because the engine only copies
/// the provided values.
pub trait SimulationCore: GeometryTarget + Send + Sync {
    /// Creates the engine-side state for an emitter or listener.
    fn add_source(&self, id: SourceId, flags: SimulationFlags) -> Result<(), CoreError>;

    /// Destroys the engine-side state for an emitter or listener.
    fn remove_source(&self, id: SourceId);

    /// Stores listener pose and global parameters for the given passes.
    fn set_shared_inputs(&self, flags: SimulationFlags, inputs: &SharedInputs);

    /// Copies per-source inputs for the given passes.
    ///
    /// The engine keeps its own copy; later mutation of `inputs` by the caller
    /// does not affect an in-flight pass.
    fn set_inputs(&self, id: SourceId, flags: SimulationFlags, inputs: &SimulationInputs);

    /// Reads the most recent outputs of the given passes for one source.
    fn outputs(&self, id: SourceId, flags: SimulationFlags) -> SimulationOutputs;

    fn run_direct(&self) -> Result<(), CoreError>;

    fn run_reflections(&self) -> Result<(), CoreError>;

    fn run_pathing(&self) -> Result<(), CoreError>;

    /// Makes added/removed sources and probe batches visible to the next pass.
    fn commit(&self);

    fn add_probe_batch(&self, name: &str);

    fn remove_probe_batch(&self, name: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflections_pathing_flags() {
        let flags = SimulationFlags::REFLECTIONS_PATHING;
        assert!(flags.contains(SimulationFlags::REFLECTIONS));
        assert!(flags.contains(SimulationFlags::PATHING));
        assert!(!flags.intersects(SimulationFlags::DIRECT));
    }
}
