use crate::error::{PhonoSyncError, Result};
use std::time::Duration;

/// Ray tracing back-end the scene is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SceneType {
    /// Built-in software ray tracer.
    #[default]
    Default,
    /// Intel Embree CPU ray tracer.
    Embree,
    /// AMD Radeon Rays GPU ray tracer. Requires an OpenCL device.
    RadeonRays,
    /// Host-provided ray tracer. Can only be called from the host's own thread.
    Custom,
}

/// How reflections are rendered, which constrains what the simulation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReflectionEffectType {
    #[default]
    Convolution,
    Parametric,
    Hybrid,
    /// GPU convolution. Requires an OpenCL device.
    TrueAudioNext,
}

/// Where reflections and pathing passes execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerExecution {
    /// On a dedicated simulation worker thread.
    #[default]
    Background,
    /// Synchronously on the thread that calls `tick`.
    CallerThread,
}

/// Real-time simulation quality settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RealTimeSettings {
    pub max_occlusion_samples: u32,
    pub rays: u32,
    pub bounces: u32,
    /// Impulse response length in seconds
    pub duration: f32,
    pub ambisonic_order: u32,
    pub max_sources: u32,
    pub cpu_cores_percentage: u32,
    pub irradiance_min_distance: f32,
}

impl Default for RealTimeSettings {
    fn default() -> Self {
        Self {
            max_occlusion_samples: 16,
            rays: 4096,
            bounces: 4,
            duration: 1.0,
            ambisonic_order: 1,
            max_sources: 32,
            cpu_cores_percentage: 5,
            irradiance_min_distance: 1.0,
        }
    }
}

/// Configuration descriptor for a real-time simulation session
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationDesc {
    /// Minimum time between two reflections/pathing passes.
    pub simulation_update_interval: Duration,
    pub scene_type: SceneType,
    pub reflection_effect_type: ReflectionEffectType,
    pub execution: WorkerExecution,
    pub real_time: RealTimeSettings,
}

impl Default for SimulationDesc {
    fn default() -> Self {
        Self {
            simulation_update_interval: Duration::from_millis(100),
            scene_type: SceneType::Default,
            reflection_effect_type: ReflectionEffectType::Convolution,
            execution: WorkerExecution::Background,
            real_time: RealTimeSettings::default(),
        }
    }
}

impl SimulationDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn simulation_update_interval(mut self, interval: Duration) -> Self {
        self.simulation_update_interval = interval;
        self
    }

    pub fn scene_type(mut self, scene_type: SceneType) -> Self {
        self.scene_type = scene_type;
        self
    }

    pub fn reflection_effect_type(mut self, effect_type: ReflectionEffectType) -> Self {
        self.reflection_effect_type = effect_type;
        self
    }

    pub fn execution(mut self, execution: WorkerExecution) -> Self {
        self.execution = execution;
        self
    }

    pub fn real_time(mut self, settings: RealTimeSettings) -> Self {
        self.real_time = settings;
        self
    }

    /// Execution policy actually used for reflections and pathing.
    ///
    /// A custom scene can only be traced from the host thread, so it always
    /// runs on the caller regardless of the requested policy.
    pub fn effective_execution(&self) -> WorkerExecution {
        if self.scene_type == SceneType::Custom {
            WorkerExecution::CallerThread
        } else {
            self.execution
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.simulation_update_interval.is_zero() {
            return Err(PhonoSyncError::Configuration(
                "simulation_update_interval must be greater than zero".into(),
            ));
        }

        let rt = &self.real_time;
        if rt.rays == 0 || rt.bounces == 0 {
            return Err(PhonoSyncError::Configuration(format!(
                "real-time rays ({}) and bounces ({}) must be at least 1",
                rt.rays, rt.bounces
            )));
        }
        if rt.ambisonic_order > 3 {
            return Err(PhonoSyncError::Configuration(format!(
                "real-time ambisonic order {} out of range (max: 3)",
                rt.ambisonic_order
            )));
        }
        if rt.cpu_cores_percentage > 100 {
            return Err(PhonoSyncError::Configuration(format!(
                "real-time CPU core percentage {} out of range (max: 100)",
                rt.cpu_cores_percentage
            )));
        }
        if rt.duration <= 0.0 {
            return Err(PhonoSyncError::Configuration(
                "real-time duration must be positive".into(),
            ));
        }

        Ok(())
    }
}
