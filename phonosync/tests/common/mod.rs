//! Engine doubles shared by the integration tests.

#![allow(dead_code)]

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use phonosync::bake::{BakeOutput, PathBakeParams, ReflectionsBakeParams, SceneSummary};
use phonosync::simulation::SharedInputs;
use phonosync::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const HOLD_TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Simulation core that counts passes and flags commits made mid-pass.
#[derive(Default)]
pub struct CountingCore {
    pub direct: AtomicU64,
    pub reflections: AtomicU64,
    pub pathing: AtomicU64,
    pub commits: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub commits_during_pass: AtomicUsize,
    hold: Option<(Sender<()>, Receiver<()>)>,
}

/// Releases reflections passes held by a [`CountingCore`].
pub struct Hold {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl Hold {
    pub fn wait_entered(&self) {
        if self.entered.recv_timeout(HOLD_TIMEOUT).is_err() {
            panic!("reflections pass never started");
        }
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

impl CountingCore {
    /// A core whose every reflections pass waits for [`Hold::release`].
    pub fn held() -> (Self, Hold) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let core = Self {
            hold: Some((entered_tx, release_rx)),
            ..Self::default()
        };
        (
            core,
            Hold {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }

    fn committing(&self) {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            self.commits_during_pass.fetch_add(1, Ordering::AcqRel);
        }
    }
}

impl GeometryTarget for CountingCore {
    fn apply_geometry(&self, _change: &GeometryChange) {
        self.committing();
    }

    fn commit_scene(&self) {
        self.committing();
    }
}

impl SimulationCore for CountingCore {
    fn add_source(
        &self,
        _id: SourceId,
        _flags: SimulationFlags,
    ) -> std::result::Result<(), CoreError> {
        Ok(())
    }

    fn remove_source(&self, _id: SourceId) {}

    fn set_shared_inputs(&self, _flags: SimulationFlags, _inputs: &SharedInputs) {}

    fn set_inputs(&self, _id: SourceId, _flags: SimulationFlags, _inputs: &SimulationInputs) {}

    fn outputs(&self, _id: SourceId, _flags: SimulationFlags) -> SimulationOutputs {
        let mut outputs = SimulationOutputs::default();
        outputs.direct.pass = self.direct.load(Ordering::Acquire);
        outputs.reflections.pass = self.reflections.load(Ordering::Acquire);
        outputs.pathing.pass = self.pathing.load(Ordering::Acquire);
        outputs
    }

    fn run_direct(&self) -> std::result::Result<(), CoreError> {
        self.direct.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn run_reflections(&self) -> std::result::Result<(), CoreError> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::AcqRel);
        if let Some((entered, release)) = &self.hold {
            let _ = entered.send(());
            let _ = release.recv_timeout(HOLD_TIMEOUT);
        }
        self.reflections.fetch_add(1, Ordering::AcqRel);
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    fn run_pathing(&self) -> std::result::Result<(), CoreError> {
        self.pathing.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn commit(&self) {
        self.committing();
        self.commits.fetch_add(1, Ordering::AcqRel);
    }

    fn add_probe_batch(&self, _name: &str) {}

    fn remove_probe_batch(&self, _name: &str) {}
}

/// Bake context whose results are scripted per probe batch name.
pub struct ScriptedEngine {
    failures: HashMap<String, BakeFailure>,
    blocking: Option<(String, Sender<()>, Receiver<()>)>,
    cancelled: AtomicBool,
    pub baked: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            failures: HashMap::new(),
            blocking: None,
            cancelled: AtomicBool::new(false),
            baked: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, batch: &str, failure: BakeFailure) -> Self {
        self.failures.insert(batch.to_string(), failure);
        self
    }

    /// Makes the bake of `batch` block until released or cancelled.
    pub fn blocking_on(mut self, batch: &str) -> (Self, Hold) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        self.blocking = Some((batch.to_string(), entered_tx, release_rx));
        (
            self,
            Hold {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }

    fn bake(
        &self,
        batch: &ProbeBatch,
        progress: &(dyn Fn(f32) + Sync),
    ) -> std::result::Result<BakeOutput, BakeFailure> {
        let blocking = self
            .blocking
            .as_ref()
            .filter(|(name, _, _)| name == batch.name());
        if let Some((_, entered, release)) = blocking {
            let _ = entered.send(());
            let deadline = Instant::now() + HOLD_TIMEOUT;
            loop {
                match release.recv_timeout(Duration::from_millis(1)) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        if self.cancelled.load(Ordering::Acquire) {
                            return Err(BakeFailure::Skip("cancelled".into()));
                        }
                        if Instant::now() >= deadline {
                            return Err(BakeFailure::Fatal("never released".into()));
                        }
                    }
                }
            }
        }

        if let Some(failure) = self.failures.get(batch.name()) {
            return Err(failure.clone());
        }

        progress(1.0);
        self.baked.lock().push(batch.name().to_string());
        let data = vec![batch.probe_count() as u8; 32 * batch.probe_count()];
        let layer_size = data.len();
        Ok(BakeOutput { data, layer_size })
    }
}

impl GeometryTarget for ScriptedEngine {
    fn apply_geometry(&self, _change: &GeometryChange) {}

    fn commit_scene(&self) {}
}

impl BakeEngine for ScriptedEngine {
    fn scene_summary(&self) -> SceneSummary {
        SceneSummary {
            name: "atrium".to_string(),
            exported: true,
            triangle_count: 2048,
            scene_type: SceneType::Default,
        }
    }

    fn bake_reflections(
        &self,
        batch: &ProbeBatch,
        _params: &ReflectionsBakeParams,
        progress: &(dyn Fn(f32) + Sync),
    ) -> std::result::Result<BakeOutput, BakeFailure> {
        self.bake(batch, progress)
    }

    fn bake_pathing(
        &self,
        batch: &ProbeBatch,
        _params: &PathBakeParams,
        progress: &(dyn Fn(f32) + Sync),
    ) -> std::result::Result<BakeOutput, BakeFailure> {
        self.bake(batch, progress)
    }

    fn cancel_bake(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

pub fn probe_batch(name: &str, probes: usize) -> std::sync::Arc<ProbeBatch> {
    let probes = (0..probes)
        .map(|i| phonosync::math::Sphere::new(Vec3::new(i as f32 * 2.0, 1.5, 0.0), 1.0))
        .collect();
    std::sync::Arc::new(ProbeBatch::new(name, probes))
}
