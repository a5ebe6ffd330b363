//! Recording and scriptable engine doubles for unit tests.

use crate::bake::{
    BakeEngine, BakeOutput, PathBakeParams, ProbeBatch, ReflectionsBakeParams, SceneSummary,
};
use crate::config::SceneType;
use crate::error::{BakeFailure, CoreError};
use crate::registry::SourceId;
use crate::scene::{GeometryChange, GeometryTarget};
use crate::simulation::{
    SharedInputs, SimulationCore, SimulationFlags, SimulationInputs, SimulationOutputs,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const GATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Polls `condition` until it holds or `timeout` elapses.
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CoreCall {
    AddSource(SourceId),
    RemoveSource(SourceId),
    SetSharedInputs(SimulationFlags),
    SetInputs(SourceId, SimulationFlags),
    Outputs(SourceId, SimulationFlags),
    RunDirect,
    RunReflections,
    RunPathing,
    ApplyGeometry(GeometryChange),
    CommitScene,
    Commit,
    AddProbeBatch(String),
    RemoveProbeBatch(String),
}

/// Test side of a gated [`MockCore`]: observes a reflections pass starting and
/// lets it finish.
pub(crate) struct CoreGate {
    entered_rx: Receiver<()>,
    release_tx: Sender<()>,
}

impl CoreGate {
    pub fn wait_entered(&self) {
        if self.entered_rx.recv_timeout(GATE_TIMEOUT).is_err() {
            panic!("reflections pass never started");
        }
    }

    pub fn try_entered(&self) -> bool {
        self.entered_rx.try_recv().is_ok()
    }

    pub fn release(&self) {
        let _ = self.release_tx.send(());
    }
}

/// `SimulationCore` that records every call and stamps outputs with the
/// number of completed passes.
#[derive(Default)]
pub(crate) struct MockCore {
    calls: Mutex<Vec<CoreCall>>,
    direct_passes: AtomicU64,
    reflections_passes: AtomicU64,
    pathing_passes: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    commits_during_pass: AtomicUsize,
    fail_direct: AtomicBool,
    fail_add_source: AtomicBool,
    panic_next_reflections: AtomicBool,
    gate: Option<(Sender<()>, Receiver<()>)>,
}

impl MockCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A core whose reflections pass blocks until the gate releases it.
    pub fn gated() -> (Self, CoreGate) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let core = Self {
            gate: Some((entered_tx, release_rx)),
            ..Self::default()
        };
        (
            core,
            CoreGate {
                entered_rx,
                release_tx,
            },
        )
    }

    pub fn calls(&self) -> Vec<CoreCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &CoreCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn direct_passes(&self) -> u64 {
        self.direct_passes.load(Ordering::Acquire)
    }

    pub fn reflections_passes(&self) -> u64 {
        self.reflections_passes.load(Ordering::Acquire)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Acquire)
    }

    pub fn commits_during_pass(&self) -> usize {
        self.commits_during_pass.load(Ordering::Acquire)
    }

    pub fn fail_direct(&self, fail: bool) {
        self.fail_direct.store(fail, Ordering::Release);
    }

    pub fn fail_add_source(&self, fail: bool) {
        self.fail_add_source.store(fail, Ordering::Release);
    }

    /// Makes the next reflections pass panic.
    pub fn panic_next_reflections(&self) {
        self.panic_next_reflections.store(true, Ordering::Release);
    }

    fn record(&self, call: CoreCall) {
        self.calls.lock().push(call);
    }

    fn check_commit(&self) {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            self.commits_during_pass.fetch_add(1, Ordering::AcqRel);
        }
    }
}

impl GeometryTarget for MockCore {
    fn apply_geometry(&self, change: &GeometryChange) {
        self.check_commit();
        self.record(CoreCall::ApplyGeometry(change.clone()));
    }

    fn commit_scene(&self) {
        self.check_commit();
        self.record(CoreCall::CommitScene);
    }
}

impl SimulationCore for MockCore {
    fn add_source(&self, id: SourceId, _flags: SimulationFlags) -> Result<(), CoreError> {
        if self.fail_add_source.load(Ordering::Acquire) {
            return Err(CoreError::OutOfMemory);
        }
        self.record(CoreCall::AddSource(id));
        Ok(())
    }

    fn remove_source(&self, id: SourceId) {
        self.record(CoreCall::RemoveSource(id));
    }

    fn set_shared_inputs(&self, flags: SimulationFlags, _inputs: &SharedInputs) {
        self.record(CoreCall::SetSharedInputs(flags));
    }

    fn set_inputs(&self, id: SourceId, flags: SimulationFlags, _inputs: &SimulationInputs) {
        self.record(CoreCall::SetInputs(id, flags));
    }

    fn outputs(&self, id: SourceId, flags: SimulationFlags) -> SimulationOutputs {
        self.record(CoreCall::Outputs(id, flags));
        let mut outputs = SimulationOutputs::default();
        outputs.direct.pass = self.direct_passes.load(Ordering::Acquire);
        outputs.reflections.pass = self.reflections_passes.load(Ordering::Acquire);
        outputs.pathing.pass = self.pathing_passes.load(Ordering::Acquire);
        outputs
    }

    fn run_direct(&self) -> Result<(), CoreError> {
        self.record(CoreCall::RunDirect);
        if self.fail_direct.load(Ordering::Acquire) {
            return Err(CoreError::Unspecified);
        }
        self.direct_passes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn run_reflections(&self) -> Result<(), CoreError> {
        if self.panic_next_reflections.swap(false, Ordering::AcqRel) {
            panic!("reflections pass crashed");
        }
        let in_flight = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::AcqRel);
        self.record(CoreCall::RunReflections);

        if let Some((entered_tx, release_rx)) = &self.gate {
            let _ = entered_tx.send(());
            let _ = release_rx.recv_timeout(GATE_TIMEOUT);
        }

        self.reflections_passes.fetch_add(1, Ordering::AcqRel);
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    fn run_pathing(&self) -> Result<(), CoreError> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.record(CoreCall::RunPathing);
        self.pathing_passes.fetch_add(1, Ordering::AcqRel);
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    fn commit(&self) {
        self.check_commit();
        self.record(CoreCall::Commit);
    }

    fn add_probe_batch(&self, name: &str) {
        self.record(CoreCall::AddProbeBatch(name.to_string()));
    }

    fn remove_probe_batch(&self, name: &str) {
        self.record(CoreCall::RemoveProbeBatch(name.to_string()));
    }
}

/// Scripted result for a probe batch in [`MockBakeEngine`].
#[derive(Debug, Clone)]
pub(crate) enum BakeScript {
    Bytes(usize),
    Fail(BakeFailure),
    Panic(String),
}

/// Test side of a gated [`MockBakeEngine`].
pub(crate) struct BakeGate {
    entered_rx: Receiver<String>,
    release_tx: Sender<()>,
}

impl BakeGate {
    /// Name of the next batch whose bake call started.
    pub fn entered(&self) -> String {
        match self.entered_rx.recv_timeout(GATE_TIMEOUT) {
            Ok(name) => name,
            Err(_) => panic!("bake call never started"),
        }
    }

    pub fn release(&self) {
        let _ = self.release_tx.send(());
    }
}

/// `BakeEngine` whose per-batch results are scripted by name.
pub(crate) struct MockBakeEngine {
    summary: SceneSummary,
    scripts: Mutex<HashMap<String, BakeScript>>,
    baked: Mutex<Vec<String>>,
    last_reflections: Mutex<Option<ReflectionsBakeParams>>,
    last_probe_count: Mutex<Option<usize>>,
    cancel_requested: AtomicBool,
    cancel_calls: AtomicUsize,
    scene_commits: AtomicUsize,
    gate: Option<(Sender<String>, Receiver<()>)>,
}

impl MockBakeEngine {
    pub fn new() -> Self {
        Self {
            summary: SceneSummary {
                name: "mock".to_string(),
                exported: true,
                triangle_count: 128,
                scene_type: SceneType::Default,
            },
            scripts: Mutex::new(HashMap::new()),
            baked: Mutex::new(Vec::new()),
            last_reflections: Mutex::new(None),
            last_probe_count: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
            cancel_calls: AtomicUsize::new(0),
            scene_commits: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// An engine whose bake calls block until the gate releases them or a
    /// cancel is requested.
    pub fn gated() -> (Self, BakeGate) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let engine = Self {
            gate: Some((entered_tx, release_rx)),
            ..Self::new()
        };
        (
            engine,
            BakeGate {
                entered_rx,
                release_tx,
            },
        )
    }

    pub fn with_exported(mut self, exported: bool) -> Self {
        self.summary.exported = exported;
        self
    }

    pub fn with_triangles(mut self, count: usize) -> Self {
        self.summary.triangle_count = count;
        self
    }

    pub fn with_scene_type(mut self, scene_type: SceneType) -> Self {
        self.summary.scene_type = scene_type;
        self
    }

    pub fn script(&self, batch: &str, script: BakeScript) {
        self.scripts.lock().insert(batch.to_string(), script);
    }

    /// Batches baked successfully, in order.
    pub fn baked(&self) -> Vec<String> {
        self.baked.lock().clone()
    }

    pub fn last_reflections_params(&self) -> Option<ReflectionsBakeParams> {
        self.last_reflections.lock().clone()
    }

    pub fn last_probe_count(&self) -> Option<usize> {
        *self.last_probe_count.lock()
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::Acquire)
    }

    pub fn scene_commits(&self) -> usize {
        self.scene_commits.load(Ordering::Acquire)
    }

    fn bake(
        &self,
        batch: &ProbeBatch,
        progress: &(dyn Fn(f32) + Sync),
    ) -> Result<BakeOutput, BakeFailure> {
        *self.last_probe_count.lock() = Some(batch.probe_count());

        if let Some((entered_tx, release_rx)) = &self.gate {
            let _ = entered_tx.send(batch.name().to_string());
            let deadline = Instant::now() + GATE_TIMEOUT;
            loop {
                match release_rx.recv_timeout(Duration::from_millis(1)) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        if self.cancel_requested.load(Ordering::Acquire) {
                            return Err(BakeFailure::Skip("cancelled".into()));
                        }
                        if Instant::now() >= deadline {
                            return Err(BakeFailure::Fatal("gate never released".into()));
                        }
                    }
                }
            }
        }

        progress(0.5);
        let script = self
            .scripts
            .lock()
            .get(batch.name())
            .cloned()
            .unwrap_or(BakeScript::Bytes(64));
        progress(1.0);

        match script {
            BakeScript::Bytes(bytes) => {
                self.baked.lock().push(batch.name().to_string());
                Ok(BakeOutput {
                    data: vec![0xAB; bytes],
                    layer_size: bytes / 2,
                })
            }
            BakeScript::Fail(failure) => Err(failure),
            BakeScript::Panic(msg) => panic!("{}", msg),
        }
    }
}

impl GeometryTarget for MockBakeEngine {
    fn apply_geometry(&self, _change: &GeometryChange) {}

    fn commit_scene(&self) {
        self.scene_commits.fetch_add(1, Ordering::AcqRel);
    }
}

impl BakeEngine for MockBakeEngine {
    fn scene_summary(&self) -> SceneSummary {
        self.summary.clone()
    }

    fn bake_reflections(
        &self,
        batch: &ProbeBatch,
        params: &ReflectionsBakeParams,
        progress: &(dyn Fn(f32) + Sync),
    ) -> Result<BakeOutput, BakeFailure> {
        *self.last_reflections.lock() = Some(params.clone());
        self.bake(batch, progress)
    }

    fn bake_pathing(
        &self,
        batch: &ProbeBatch,
        _params: &PathBakeParams,
        progress: &(dyn Fn(f32) + Sync),
    ) -> Result<BakeOutput, BakeFailure> {
        self.bake(batch, progress)
    }

    fn cancel_bake(&self) {
        self.cancel_calls.fetch_add(1, Ordering::AcqRel);
        self.cancel_requested.store(true, Ordering::Release);
    }
}
