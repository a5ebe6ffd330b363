//! # PhonoSync
//!
//! Scheduling for acoustic simulation in interactive applications, plus a
//! background pipeline for precomputing ("baking") acoustic data into probes.
//!
//! The acoustic engine itself is supplied by the host through the
//! [`SimulationCore`] and [`BakeEngine`] traits. PhonoSync decides when each
//! engine entry point runs and on which thread.
//!
//! ## Quick Start
//!
//! ```no_run
//! use phonosync::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn run<C: SimulationCore + 'static>(core: Arc<C>) -> Result<()> {
//! // Start the scheduler and its simulation worker
//! let mut scheduler = RealtimeScheduler::new(core, SimulationDesc::default())?;
//!
//! // Activate an emitter; keep the returned state alive while it plays
//! let source = scheduler.activate(
//!     EndpointKind::Source,
//!     SimulationFlags::all(),
//!     SimulationInputs::at(&Pose::from_position(Vec3::new(5.0, 0.0, 0.0))),
//! )?;
//!
//! // Once per frame
//! scheduler.set_listener_pose(Pose::identity());
//! let report = scheduler.tick(Duration::from_millis(16));
//! if report.consumed {
//!     println!("reverb: {:?}", source.outputs().reflections.reverb_times);
//! }
//!
//! scheduler.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Components
//!
//! - **[`RealtimeScheduler`]**: Per-frame loop; direct pass every tick, reflections and
//!   pathing on a worker at a fixed interval
//! - **[`SourceRegistry`]**: Emitters and listeners taking part in simulation
//! - **[`SceneStage`]**: Geometry changes buffered until it is safe to commit them
//! - **[`BakeJobRunner`]**: Runs a list of bake tasks on a background thread with progress
//!   and cancellation
//! - **[`DeviceSet`]**: Optional compute devices, with fallbacks when they are missing
//!
//! ## Threading
//!
//! 1. **Caller thread**: calls `tick`, runs the direct pass and owns all commits
//! 2. **Simulation worker**: runs at most one reflections + pathing pass at a time
//! 3. **Bake thread**: one per active bake job
//!
//! Scene and simulator commits only happen while the worker is idle, and the
//! caller never waits for the worker.

pub mod bake;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
mod guard;
pub mod math;
pub mod registry;
pub mod scene;
pub mod scheduler;
pub mod simulation;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use bake::{
    BakeEngine, BakeJobRunner, BakeOutcome, BakePoll, BakeStatus, BakeSummary, BakeTask,
    BakedDataIdentifier, BakedDataStore, DirectoryStore, MemoryStore, ProbeBatch,
};
pub use config::{BakeDesc, ReflectionEffectType, SceneType, SimulationDesc, WorkerExecution};
pub use device::{DeviceBackend, DeviceKind, DeviceSet};
pub use error::{BakeFailure, CoreError, PhonoSyncError, Result};
pub use events::BakeEvent;
pub use math::{Pose, Vec3};
pub use registry::{EndpointKind, SourceId, SourceRegistry, SourceState};
pub use scene::{GeometryChange, GeometryTarget, MeshId, SceneStage};
pub use scheduler::{RealtimeScheduler, ReflectionsPhase, TickReport};
pub use simulation::{SimulationCore, SimulationFlags, SimulationInputs, SimulationOutputs};
pub use worker::SimulationWorker;
