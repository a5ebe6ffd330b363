//! The dual-rate frame loop.
//!
//! [`RealtimeScheduler::tick`] runs the direct pass synchronously every frame
//! and hands reflections/pathing to the [`SimulationWorker`] at most once per
//! `simulation_update_interval`. The calling thread never waits on the worker:
//! if a pass is still running when the interval elapses, the cycle is skipped.

use crate::config::{SimulationDesc, WorkerExecution};
use crate::error::{CoreError, Result};
use crate::guard::guard_engine_call;
use crate::math::Pose;
use crate::registry::{EndpointKind, SourceRegistry, SourceState};
use crate::scene::SceneStage;
use crate::simulation::{SharedInputs, SimulationCore, SimulationFlags, SimulationInputs};
use crate::worker::SimulationWorker;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// What happened to reflections/pathing during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionsPhase {
    /// The update interval has not elapsed yet.
    NotDue,
    /// The interval elapsed but the previous pass is still running.
    WorkerBusy,
    /// Fresh inputs were pushed and the worker was signaled.
    Dispatched,
    /// Fresh inputs were pushed and the pass ran on the calling thread.
    RanInline,
    /// The scheduler has been shut down.
    Stopped,
}

/// Summary of one [`RealtimeScheduler::tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub scene_committed: bool,
    pub simulator_committed: bool,
    pub direct: std::result::Result<(), CoreError>,
    pub reflections: ReflectionsPhase,
    /// Outputs of a completed reflections/pathing pass were read this tick.
    pub consumed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProbeBatchChange {
    Add(String),
    Remove(String),
}

/// Per-session orchestrator for real-time simulation.
///
/// Constructed explicitly and passed by reference to whatever activates
/// emitters and listeners; there is no global instance.
pub struct RealtimeScheduler<C: SimulationCore + 'static> {
    core: Arc<C>,
    desc: SimulationDesc,
    execution: WorkerExecution,
    scene: Arc<SceneStage>,
    registry: Arc<SourceRegistry>,
    listener: Pose,
    elapsed: Duration,
    worker: Option<SimulationWorker>,
    inline_completed: bool,
    pending_batches: Mutex<Vec<ProbeBatchChange>>,
    stopped: bool,
}

impl<C: SimulationCore + 'static> RealtimeScheduler<C> {
    /// Creates the scheduler and, unless passes must run on the caller, its
    /// worker thread. Either both exist or an error is returned.
    pub fn new(core: Arc<C>, desc: SimulationDesc) -> Result<Self> {
        desc.validate()?;

        let execution = desc.effective_execution();
        let worker = match execution {
            WorkerExecution::Background => Some(spawn_worker(&core)?),
            WorkerExecution::CallerThread => None,
        };

        log::info!(
            "Real-time scheduler started ({:?}, interval {:?})",
            execution,
            desc.simulation_update_interval
        );

        Ok(Self {
            core,
            desc,
            execution,
            scene: Arc::new(SceneStage::new("scene")),
            registry: Arc::new(SourceRegistry::new()),
            listener: Pose::identity(),
            elapsed: Duration::ZERO,
            worker,
            inline_completed: false,
            pending_batches: Mutex::new(Vec::new()),
            stopped: false,
        })
    }

    pub fn core(&self) -> &Arc<C> {
        &self.core
    }

    pub fn desc(&self) -> &SimulationDesc {
        &self.desc
    }

    pub fn execution(&self) -> WorkerExecution {
        self.execution
    }

    pub fn scene(&self) -> &Arc<SceneStage> {
        &self.scene
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn listener_pose(&self) -> Pose {
        self.listener
    }

    pub fn set_listener_pose(&mut self, pose: Pose) {
        self.listener = pose;
    }

    /// True when no reflections/pathing pass is running or pending.
    pub fn is_worker_idle(&self) -> bool {
        self.worker.as_ref().is_none_or(SimulationWorker::is_idle)
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Creates engine-side state for an emitter or listener and registers it.
    ///
    /// The returned state is owned by the caller; the registry only observes it.
    pub fn activate(
        &self,
        kind: EndpointKind,
        flags: SimulationFlags,
        inputs: SimulationInputs,
    ) -> Result<Arc<SourceState>> {
        let id = self.registry.allocate_id();
        self.core.add_source(id, flags)?;

        let state = Arc::new(SourceState::new(id, kind, flags, inputs));
        self.registry.add(&state);
        log::debug!("Activated {:?} {}", kind, id);
        Ok(state)
    }

    pub fn deactivate(&self, state: &SourceState) {
        if self.registry.remove(state.id()) {
            self.core.remove_source(state.id());
            log::debug!("Deactivated {:?} {}", state.kind(), state.id());
        }
    }

    /// Queues a probe batch to be added at the next commit point.
    pub fn add_probe_batch(&self, name: impl Into<String>) {
        self.pending_batches
            .lock()
            .push(ProbeBatchChange::Add(name.into()));
    }

    /// Queues a probe batch to be removed at the next commit point.
    pub fn remove_probe_batch(&self, name: impl Into<String>) {
        self.pending_batches
            .lock()
            .push(ProbeBatchChange::Remove(name.into()));
    }

    /// Runs one frame of the simulation loop. Never blocks on the worker.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        let mut scene_committed = false;
        let mut simulator_committed = false;

        // Scene and simulator changes are only folded in while nothing traces.
        if self.is_worker_idle() {
            scene_committed = self.scene.commit_if_dirty(&*self.core);
            self.release_dropped_endpoints();
            self.apply_probe_batch_changes();
            self.core.commit();
            simulator_committed = true;
        }

        let endpoints = self.registry.snapshot();
        let shared = SharedInputs::new(&self.listener, &self.desc.real_time);

        self.core.set_shared_inputs(SimulationFlags::DIRECT, &shared);
        for endpoint in &endpoints {
            endpoint.push_inputs(&*self.core, SimulationFlags::DIRECT);
        }
        let direct = self.core.run_direct();
        match &direct {
            Ok(()) => {
                for endpoint in &endpoints {
                    endpoint.pull_outputs(&*self.core, SimulationFlags::DIRECT);
                }
            }
            Err(e) => log::warn!("Direct simulation failed: {}", e),
        }

        let mut report = TickReport {
            scene_committed,
            simulator_committed,
            direct,
            reflections: ReflectionsPhase::NotDue,
            consumed: false,
        };

        if self.stopped {
            report.reflections = ReflectionsPhase::Stopped;
            return report;
        }

        self.elapsed += dt;
        if self.elapsed < self.desc.simulation_update_interval {
            return report;
        }
        self.elapsed = Duration::ZERO;

        if !self.is_worker_idle() {
            log::debug!("Reflections/pathing pass still running, skipping update");
            report.reflections = ReflectionsPhase::WorkerBusy;
            return report;
        }

        if self.take_completed() {
            for endpoint in &endpoints {
                endpoint.pull_outputs(&*self.core, SimulationFlags::REFLECTIONS_PATHING);
            }
            report.consumed = true;
        }

        self.core
            .set_shared_inputs(SimulationFlags::REFLECTIONS_PATHING, &shared);
        for endpoint in &endpoints {
            endpoint.push_inputs(&*self.core, SimulationFlags::REFLECTIONS_PATHING);
        }

        report.reflections = match (&self.worker, self.execution) {
            (_, WorkerExecution::CallerThread) => {
                let core = &*self.core;
                let result =
                    guard_engine_call("reflections/pathing pass", || run_reflections_pathing(core));
                match result {
                    Ok(Ok(())) => self.inline_completed = true,
                    Ok(Err(e)) => log::warn!("Reflections/pathing pass failed: {}", e),
                    Err(_) => {}
                }
                ReflectionsPhase::RanInline
            }
            (Some(worker), WorkerExecution::Background) if worker.signal() => {
                ReflectionsPhase::Dispatched
            }
            _ => ReflectionsPhase::Stopped,
        };

        report
    }

    /// Stops the worker, applies `desc` and restarts.
    ///
    /// On error the scheduler is left stopped.
    pub fn reinitialize(&mut self, desc: SimulationDesc) -> Result<()> {
        desc.validate()?;
        self.shutdown();

        let execution = desc.effective_execution();
        if execution == WorkerExecution::Background {
            self.worker = Some(spawn_worker(&self.core)?);
        }

        self.desc = desc;
        self.execution = execution;
        self.elapsed = Duration::ZERO;
        self.inline_completed = false;
        self.stopped = false;

        log::info!("Real-time scheduler reinitialized ({:?})", execution);
        Ok(())
    }

    /// Stops the worker, waiting for any in-flight pass. Idempotent.
    ///
    /// Must run before the simulation context is destroyed.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        self.inline_completed = false;
        self.stopped = true;
        log::info!("Real-time scheduler stopped");
    }

    fn take_completed(&mut self) -> bool {
        match &self.worker {
            Some(worker) => worker.take_completed(),
            None => std::mem::take(&mut self.inline_completed),
        }
    }

    fn release_dropped_endpoints(&self) {
        for id in self.registry.take_pruned() {
            self.core.remove_source(id);
            log::debug!("Released dropped endpoint {}", id);
        }
    }

    fn apply_probe_batch_changes(&self) {
        let changes = std::mem::take(&mut *self.pending_batches.lock());
        for change in changes {
            match change {
                ProbeBatchChange::Add(name) => self.core.add_probe_batch(&name),
                ProbeBatchChange::Remove(name) => self.core.remove_probe_batch(&name),
            }
        }
    }
}

impl<C: SimulationCore + 'static> Drop for RealtimeScheduler<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker<C: SimulationCore + 'static>(core: &Arc<C>) -> Result<SimulationWorker> {
    let core = Arc::clone(core);
    SimulationWorker::start("phonosync-simulation", move || {
        run_reflections_pathing(&*core)
    })
}

/// Runs both background passes, reporting the first failure.
fn run_reflections_pathing<C: SimulationCore + ?Sized>(
    core: &C,
) -> std::result::Result<(), CoreError> {
    let reflections = core.run_reflections();
    let pathing = core.run_pathing();
    reflections.and(pathing)
}
