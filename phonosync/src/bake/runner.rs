use super::engine::{BakeEngine, PathBakeParams, ReflectionsBakeFlags, ReflectionsBakeParams};
use super::status::{BakeProgress, BakeStatus, BakeStatusModel};
use super::store::BakedDataStore;
use super::task::{BakeTarget, BakeTask, ProbeBatch, REVERB_POINT_RADIUS};
use super::{BakedDataIdentifier, BakedDataType};
use crate::config::{BakeDesc, SceneType, available_cores};
use crate::error::{BakeFailure, PhonoSyncError, Result};
use crate::events::BakeEvent;
use crate::guard::guard_engine_call;
use crate::scene::SceneStage;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// How a bake job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeOutcome {
    Completed,
    Cancelled,
    /// The engine reported an unrecoverable failure.
    Aborted,
}

/// Aggregate statistics of a finished bake job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeSummary {
    pub outcome: BakeOutcome,
    pub baked_units: usize,
    pub skipped_units: usize,
    pub persisted_bytes: usize,
}

impl BakeSummary {
    fn new(outcome: BakeOutcome) -> Self {
        Self {
            outcome,
            baked_units: 0,
            skipped_units: 0,
            persisted_bytes: 0,
        }
    }
}

/// Result of [`BakeJobRunner::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum BakePoll {
    /// No job has been started.
    Idle,
    InProgress(BakeProgress),
    /// The job ended and has just been finalized.
    Finished(BakeSummary),
}

struct ActiveBake {
    engine: Arc<dyn BakeEngine>,
    join: JoinHandle<BakeSummary>,
}

/// Runs bake jobs on a background thread and finalizes them for the host.
///
/// One job at a time. The host calls [`poll`](Self::poll) every tick; the call
/// that observes `Complete` flushes deferred writes, tears down the bake
/// context and returns the job's [`BakeSummary`].
pub struct BakeJobRunner {
    desc: BakeDesc,
    store: Arc<dyn BakedDataStore>,
    status: Arc<BakeStatusModel>,
    active: Option<ActiveBake>,
    event_tx: Sender<BakeEvent>,
    event_rx: Receiver<BakeEvent>,
}

impl BakeJobRunner {
    pub fn new(desc: BakeDesc, store: Arc<dyn BakedDataStore>) -> Result<Self> {
        desc.validate()?;
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        Ok(Self {
            desc,
            store,
            status: Arc::new(BakeStatusModel::new()),
            active: None,
            event_tx,
            event_rx,
        })
    }

    pub fn desc(&self) -> &BakeDesc {
        &self.desc
    }

    /// Starts baking `tasks` in order on a background thread.
    ///
    /// `engine` is the temporary context the bake runs in; it is dropped when
    /// the job is finalized. Pending geometry in `scene` is committed to it
    /// before the bake starts. Precondition failures leave the status `Ready`.
    pub fn begin_bake(
        &mut self,
        engine: Arc<dyn BakeEngine>,
        scene: &SceneStage,
        tasks: Vec<BakeTask>,
    ) -> Result<()> {
        if self.active.is_some() || self.status.status() != BakeStatus::Ready {
            return Err(PhonoSyncError::BakeInProgress);
        }

        let summary = engine.scene_summary();
        if summary.scene_type == SceneType::Custom {
            return Err(PhonoSyncError::UnsupportedSceneType(summary.scene_type));
        }
        if !summary.exported {
            return Err(PhonoSyncError::SceneNotExported(summary.name));
        }
        if summary.triangle_count == 0 {
            return Err(PhonoSyncError::EmptyScene(summary.name));
        }

        scene.commit_if_dirty(&*engine);

        let total_units = tasks.iter().map(BakeTask::unit_count).sum();
        if !self.status.try_begin(tasks.len(), total_units) {
            return Err(PhonoSyncError::BakeInProgress);
        }
        self.status.clear_cancel();

        log::info!(
            "Starting bake of {} tasks ({} units) in scene '{}'",
            tasks.len(),
            total_units,
            summary.name
        );

        let job = BakeJob {
            engine: Arc::clone(&engine),
            store: Arc::clone(&self.store),
            status: Arc::clone(&self.status),
            events: self.event_tx.clone(),
            desc: self.desc.clone(),
            scene_type: summary.scene_type,
            cpu_cores: available_cores(),
            tasks,
        };

        let spawned = std::thread::Builder::new()
            .name("phonosync-bake".to_string())
            .spawn(move || job.run());

        match spawned {
            Ok(join) => {
                self.active = Some(ActiveBake { engine, join });
                Ok(())
            }
            Err(e) => {
                self.status.reset();
                Err(PhonoSyncError::WorkerSpawn(format!("bake thread: {e}")))
            }
        }
    }

    /// Reports progress, finalizing the job once its thread is done.
    pub fn poll(&mut self) -> BakePoll {
        match self.status.status() {
            BakeStatus::Ready => BakePoll::Idle,
            BakeStatus::InProgress => BakePoll::InProgress(self.status.snapshot()),
            BakeStatus::Complete => BakePoll::Finished(self.end_bake()),
        }
    }

    /// Stops the running job and finalizes it.
    ///
    /// Blocks until the bake thread has exited. Batches baked before the
    /// cancellation are kept; the batch in flight is discarded. Returns `None`
    /// when there is nothing to cancel, including a job that already reached
    /// `Complete` and only awaits [`poll`](Self::poll).
    pub fn cancel(&mut self) -> Option<BakeSummary> {
        let active = self.active.as_ref()?;
        if self.status.status() == BakeStatus::Complete {
            log::debug!("Bake already complete, nothing to cancel");
            return None;
        }

        self.status.request_cancel();
        active.engine.cancel_bake();
        let summary = self.end_bake();
        self.status.clear_cancel();
        Some(summary)
    }

    /// Blocks until the running job ends, then finalizes it.
    pub fn wait(&mut self) -> Option<BakeSummary> {
        self.active.as_ref()?;
        Some(self.end_bake())
    }

    pub fn is_bake_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn status(&self) -> BakeStatus {
        self.status.status()
    }

    pub fn progress(&self) -> BakeProgress {
        self.status.snapshot()
    }

    pub fn poll_events(&self) -> Vec<BakeEvent> {
        self.event_rx.try_iter().collect()
    }

    fn end_bake(&mut self) -> BakeSummary {
        let Some(active) = self.active.take() else {
            self.status.reset();
            return BakeSummary::new(BakeOutcome::Completed);
        };

        let summary = match active.join.join() {
            Ok(summary) => summary,
            Err(_) => {
                log::error!("Bake thread panicked");
                BakeSummary::new(BakeOutcome::Aborted)
            }
        };

        if let Err(e) = self.store.flush_all() {
            log::error!("Failed to flush baked data: {}", e);
        }

        // Last reference to the bake context goes here.
        drop(active.engine);
        self.status.reset();

        log::info!(
            "Bake finished ({:?}): {} baked, {} skipped, {} bytes",
            summary.outcome,
            summary.baked_units,
            summary.skipped_units,
            summary.persisted_bytes
        );
        summary
    }
}

impl Drop for BakeJobRunner {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            self.status.request_cancel();
            active.engine.cancel_bake();
            self.end_bake();
            self.status.clear_cancel();
        }
    }
}

enum Flow {
    Continue,
    Cancelled,
    Aborted(String),
}

/// Everything the bake thread owns.
struct BakeJob {
    engine: Arc<dyn BakeEngine>,
    store: Arc<dyn BakedDataStore>,
    status: Arc<BakeStatusModel>,
    events: Sender<BakeEvent>,
    desc: BakeDesc,
    scene_type: SceneType,
    cpu_cores: usize,
    tasks: Vec<BakeTask>,
}

impl BakeJob {
    fn run(self) -> BakeSummary {
        let mut summary = BakeSummary::new(BakeOutcome::Completed);

        for (task_index, task) in self.tasks.iter().enumerate() {
            match self.run_task(task_index, task, &mut summary) {
                Flow::Continue => {}
                Flow::Cancelled => {
                    log::info!("CANCELLED: Baking.");
                    summary.outcome = BakeOutcome::Cancelled;
                    self.emit(BakeEvent::Cancelled { task_index });
                    // The canceller finalizes the job itself.
                    return summary;
                }
                Flow::Aborted(error) => {
                    log::error!("Aborting bake of {}: {}", task.display_name(), error);
                    summary.outcome = BakeOutcome::Aborted;
                    self.emit(BakeEvent::Aborted { task_index, error });
                    break;
                }
            }
        }

        self.status.complete();
        summary
    }

    fn run_task(&self, task_index: usize, task: &BakeTask, summary: &mut BakeSummary) -> Flow {
        if self.status.is_cancel_requested() {
            return Flow::Cancelled;
        }

        let name = task.display_name();
        self.status.enter_task(task_index, task.unit_count());
        log::info!("START: Baking effect for {}.", name);
        self.emit(BakeEvent::TaskStarted {
            task_index,
            name: name.clone(),
        });

        match task.target() {
            BakeTarget::ProbeBatches(batches) => {
                if batches.is_empty() {
                    log::warn!("No probe batches selected for {}", name);
                }

                for (batch_index, entry) in batches.iter().enumerate() {
                    if self.status.is_cancel_requested() {
                        return Flow::Cancelled;
                    }
                    self.status.enter_batch(batch_index);

                    let batch = match entry {
                        None => {
                            self.skip(task_index, batch_index, "probe batch is missing", summary);
                            continue;
                        }
                        Some(batch) if batch.probe_count() == 0 => {
                            let reason = format!(
                                "probe batch '{}' has no probes; generate probes before baking",
                                batch.name()
                            );
                            self.skip(task_index, batch_index, &reason, summary);
                            continue;
                        }
                        Some(batch) => batch,
                    };

                    let flow = self.bake_unit(
                        task_index,
                        batch_index,
                        task.identifier(),
                        batch,
                        None,
                        summary,
                    );
                    if !matches!(flow, Flow::Continue) {
                        return flow;
                    }
                }
            }
            BakeTarget::ReverbPoint(position) => {
                self.status.enter_batch(0);
                let batch =
                    ProbeBatch::single(task.reverb_point_key(), *position, REVERB_POINT_RADIUS);
                let flags =
                    ReflectionsBakeFlags::BAKE_CONVOLUTION | ReflectionsBakeFlags::BAKE_PARAMETRIC;
                let flow =
                    self.bake_unit(task_index, 0, task.identifier(), &batch, Some(flags), summary);
                if !matches!(flow, Flow::Continue) {
                    return flow;
                }
            }
        }

        log::info!("COMPLETED: Baking effect for {}.", name);
        self.emit(BakeEvent::TaskCompleted { task_index, name });
        Flow::Continue
    }

    fn bake_unit(
        &self,
        task_index: usize,
        batch_index: usize,
        identifier: &BakedDataIdentifier,
        batch: &ProbeBatch,
        flags: Option<ReflectionsBakeFlags>,
        summary: &mut BakeSummary,
    ) -> Flow {
        let status = &*self.status;
        let progress = move |fraction: f32| status.set_unit_progress(fraction);

        let baked = guard_engine_call("bake", || match identifier.data_type {
            BakedDataType::Reflections => {
                let mut params = ReflectionsBakeParams::from_desc(
                    &self.desc,
                    *identifier,
                    self.scene_type,
                    self.cpu_cores,
                );
                if let Some(flags) = flags {
                    params.bake_flags = flags;
                }
                self.engine.bake_reflections(batch, &params, &progress)
            }
            BakedDataType::Pathing => {
                let params = PathBakeParams::from_desc(&self.desc, *identifier, self.cpu_cores);
                self.engine.bake_pathing(batch, &params, &progress)
            }
        });
        // An engine that panicked aborts the job.
        let result = match baked {
            Ok(result) => result,
            Err(panic) => return Flow::Aborted(panic),
        };

        // Whatever the engine returned after a cancel request is discarded.
        if self.status.is_cancel_requested() {
            return Flow::Cancelled;
        }

        let output = match result {
            Ok(output) => output,
            Err(BakeFailure::Skip(reason)) => {
                let reason = format!("failed to bake probe batch '{}': {}", batch.name(), reason);
                self.skip(task_index, batch_index, &reason, summary);
                return Flow::Continue;
            }
            Err(BakeFailure::Fatal(reason)) => return Flow::Aborted(reason),
        };

        if let Err(e) = self.store.write(batch.name(), &output.data, false) {
            let reason = format!("failed to persist probe batch '{}': {}", batch.name(), e);
            self.skip(task_index, batch_index, &reason, summary);
            return Flow::Continue;
        }

        let bytes = output.data.len();
        batch.set_probe_data_size(bytes);
        batch.add_or_update_layer(*identifier, output.layer_size);
        summary.baked_units += 1;
        summary.persisted_bytes += bytes;
        self.status.finish_unit();

        log::debug!(
            "Baked probe batch '{}' ({} bytes, layer {} bytes)",
            batch.name(),
            bytes,
            output.layer_size
        );
        self.emit(BakeEvent::BatchBaked {
            task_index,
            batch_index,
            batch: batch.name().to_string(),
            bytes,
        });
        Flow::Continue
    }

    fn skip(&self, task_index: usize, batch_index: usize, reason: &str, summary: &mut BakeSummary) {
        log::warn!("Skipping probe batch {}: {}", batch_index, reason);
        summary.skipped_units += 1;
        self.status.finish_unit();
        self.emit(BakeEvent::BatchSkipped {
            task_index,
            batch_index,
            reason: reason.to_string(),
        });
    }

    fn emit(&self, event: BakeEvent) {
        // The runner owns the receiver for as long as this thread can run.
        let _ = self.events.send(event);
    }
}
