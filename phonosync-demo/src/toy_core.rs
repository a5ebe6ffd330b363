//! A small analytic stand-in for a real acoustic engine.
//!
//! Direct sound falls off with distance, reverb time grows with the amount of
//! geometry in the scene, and every background pass sleeps to look expensive.

use parking_lot::Mutex;
use phonosync::bake::{BakeOutput, PathBakeParams, ReflectionsBakeParams, SceneSummary};
use phonosync::math::{CoordinateFrame, Vec3};
use phonosync::simulation::SharedInputs;
use phonosync::{
    BakeEngine, BakeFailure, CoreError, DeviceBackend, GeometryChange, GeometryTarget, ProbeBatch,
    SceneType, SimulationCore, SimulationFlags, SimulationInputs, SimulationOutputs, SourceId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

struct Endpoint {
    flags: SimulationFlags,
    direct_inputs: SimulationInputs,
    indirect_inputs: SimulationInputs,
    outputs: SimulationOutputs,
}

#[derive(Default)]
struct Staged {
    direct_listener: CoordinateFrame,
    indirect_listener: CoordinateFrame,
    endpoints: HashMap<SourceId, Endpoint>,
    meshes: usize,
}

pub struct ToyCore {
    staged: Mutex<Staged>,
    committed_meshes: AtomicUsize,
    direct_pass: AtomicU64,
    indirect_pass: AtomicU64,
    pass_cost: Duration,
}

impl ToyCore {
    pub fn new(pass_cost: Duration) -> Self {
        Self {
            staged: Mutex::new(Staged::default()),
            committed_meshes: AtomicUsize::new(0),
            direct_pass: AtomicU64::new(0),
            indirect_pass: AtomicU64::new(0),
            pass_cost,
        }
    }
}

fn distance(a: &CoordinateFrame, b: &CoordinateFrame) -> f32 {
    a.origin.distance(b.origin)
}

impl GeometryTarget for ToyCore {
    fn apply_geometry(&self, change: &GeometryChange) {
        let mut staged = self.staged.lock();
        match change {
            GeometryChange::AddMesh { .. } => staged.meshes += 1,
            GeometryChange::RemoveMesh { .. } => staged.meshes = staged.meshes.saturating_sub(1),
            GeometryChange::UpdateTransform { .. } => {}
        }
    }

    fn commit_scene(&self) {
        let meshes = self.staged.lock().meshes;
        self.committed_meshes.store(meshes, Ordering::Release);
    }
}

impl SimulationCore for ToyCore {
    fn add_source(&self, id: SourceId, flags: SimulationFlags) -> Result<(), CoreError> {
        let endpoint = Endpoint {
            flags,
            direct_inputs: SimulationInputs::default(),
            indirect_inputs: SimulationInputs::default(),
            outputs: SimulationOutputs::default(),
        };
        self.staged.lock().endpoints.insert(id, endpoint);
        Ok(())
    }

    fn remove_source(&self, id: SourceId) {
        self.staged.lock().endpoints.remove(&id);
    }

    fn set_shared_inputs(&self, flags: SimulationFlags, inputs: &SharedInputs) {
        let mut staged = self.staged.lock();
        if flags.contains(SimulationFlags::DIRECT) {
            staged.direct_listener = inputs.listener;
        }
        if flags.intersects(SimulationFlags::REFLECTIONS_PATHING) {
            staged.indirect_listener = inputs.listener;
        }
    }

    fn set_inputs(&self, id: SourceId, flags: SimulationFlags, inputs: &SimulationInputs) {
        let mut staged = self.staged.lock();
        let Some(endpoint) = staged.endpoints.get_mut(&id) else {
            return;
        };
        if flags.contains(SimulationFlags::DIRECT) {
            endpoint.direct_inputs = inputs.clone();
        }
        if flags.intersects(SimulationFlags::REFLECTIONS_PATHING) {
            endpoint.indirect_inputs = inputs.clone();
        }
    }

    fn outputs(&self, id: SourceId, _flags: SimulationFlags) -> SimulationOutputs {
        self.staged
            .lock()
            .endpoints
            .get(&id)
            .map(|e| e.outputs.clone())
            .unwrap_or_default()
    }

    fn run_direct(&self) -> Result<(), CoreError> {
        let pass = self.direct_pass.fetch_add(1, Ordering::AcqRel) + 1;
        let mut staged = self.staged.lock();
        let listener = staged.direct_listener;
        for endpoint in staged.endpoints.values_mut() {
            if !endpoint.flags.contains(SimulationFlags::DIRECT) {
                continue;
            }
            let d = distance(&endpoint.direct_inputs.source, &listener);
            endpoint.outputs.direct.pass = pass;
            endpoint.outputs.direct.distance_attenuation = 1.0 / d.max(1.0);
        }
        Ok(())
    }

    fn run_reflections(&self) -> Result<(), CoreError> {
        let pass = self.indirect_pass.fetch_add(1, Ordering::AcqRel) + 1;
        let (listener, sources) = {
            let staged = self.staged.lock();
            let sources: Vec<_> = staged
                .endpoints
                .iter()
                .filter(|(_, e)| e.flags.contains(SimulationFlags::REFLECTIONS))
                .map(|(id, e)| (*id, e.indirect_inputs.source))
                .collect();
            (staged.indirect_listener, sources)
        };

        std::thread::sleep(self.pass_cost);
        let rt60 = 0.3 + 0.1 * self.committed_meshes.load(Ordering::Acquire) as f32;

        let mut staged = self.staged.lock();
        for (id, source) in sources {
            if let Some(endpoint) = staged.endpoints.get_mut(&id) {
                let d = distance(&source, &listener);
                endpoint.outputs.reflections.pass = pass;
                endpoint.outputs.reflections.reverb_times = [rt60 * 1.2, rt60, rt60 * 0.7];
                endpoint.outputs.reflections.energy = 1.0 / (1.0 + d * d);
            }
        }
        Ok(())
    }

    fn run_pathing(&self) -> Result<(), CoreError> {
        let pass = self.indirect_pass.load(Ordering::Acquire);
        let mut staged = self.staged.lock();
        for endpoint in staged.endpoints.values_mut() {
            if endpoint.flags.contains(SimulationFlags::PATHING) {
                endpoint.outputs.pathing.pass = pass;
                endpoint.outputs.pathing.eq_coeffs = [0.9, 0.7, 0.5];
            }
        }
        Ok(())
    }

    fn commit(&self) {}

    fn add_probe_batch(&self, name: &str) {
        log::debug!("Toy core loaded probe batch '{}'", name);
    }

    fn remove_probe_batch(&self, name: &str) {
        log::debug!("Toy core unloaded probe batch '{}'", name);
    }
}

/// Reports OpenCL as missing so the fallback paths run.
pub struct ToyDevices;

impl DeviceBackend for ToyDevices {
    fn create_embree(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    fn create_open_cl(&mut self) -> Result<(), CoreError> {
        Err(CoreError::Initialization)
    }

    fn create_radeon_rays(&mut self) -> Result<(), CoreError> {
        Err(CoreError::Initialization)
    }

    fn create_true_audio_next(
        &mut self,
        _settings: &phonosync::config::RealTimeSettings,
    ) -> Result<(), CoreError> {
        Err(CoreError::Initialization)
    }
}

/// Bake context built from an exported scene of `triangles` triangles.
/// Each probe takes `probe_cost` to bake.
pub struct ToyBaker {
    probe_cost: Duration,
    triangles: usize,
    cancelled: AtomicBool,
}

impl ToyBaker {
    pub fn new(probe_cost: Duration, triangles: usize) -> Self {
        Self {
            probe_cost,
            triangles,
            cancelled: AtomicBool::new(false),
        }
    }

    fn bake(
        &self,
        batch: &ProbeBatch,
        bytes_per_probe: usize,
        progress: &(dyn Fn(f32) + Sync),
    ) -> Result<BakeOutput, BakeFailure> {
        let count = batch.probe_count();
        for i in 0..count {
            if self.cancelled.load(Ordering::Acquire) {
                return Err(BakeFailure::Skip("cancelled".into()));
            }
            std::thread::sleep(self.probe_cost);
            progress((i + 1) as f32 / count as f32);
        }

        let layer_size = bytes_per_probe * count;
        Ok(BakeOutput {
            data: vec![0u8; layer_size + 16],
            layer_size,
        })
    }
}

impl GeometryTarget for ToyBaker {
    fn apply_geometry(&self, change: &GeometryChange) {
        log::debug!("Bake scene change: {:?}", change);
    }

    fn commit_scene(&self) {}
}

impl BakeEngine for ToyBaker {
    fn scene_summary(&self) -> SceneSummary {
        SceneSummary {
            name: "demo-hall".to_string(),
            exported: true,
            triangle_count: self.triangles,
            scene_type: SceneType::Default,
        }
    }

    fn bake_reflections(
        &self,
        batch: &ProbeBatch,
        params: &ReflectionsBakeParams,
        progress: &(dyn Fn(f32) + Sync),
    ) -> Result<BakeOutput, BakeFailure> {
        let channels = ((params.order + 1) * (params.order + 1)) as usize;
        self.bake(batch, 4 * channels, progress)
    }

    fn bake_pathing(
        &self,
        batch: &ProbeBatch,
        _params: &PathBakeParams,
        progress: &(dyn Fn(f32) + Sync),
    ) -> Result<BakeOutput, BakeFailure> {
        self.bake(batch, 8, progress)
    }

    fn cancel_bake(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

pub fn probe_grid(name: &str, origin: Vec3, side: usize, spacing: f32) -> ProbeBatch {
    let probes = (0..side * side)
        .map(|i| {
            let offset = Vec3::new((i % side) as f32, 0.0, (i / side) as f32) * spacing;
            phonosync::math::Sphere::new(origin + offset, spacing * 0.5)
        })
        .collect();
    ProbeBatch::new(name, probes)
}
