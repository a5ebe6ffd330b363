use super::{BakedDataIdentifier, ProbeBatch};
use crate::config::{BakeDesc, SceneType, threads_for_cpu_percentage};
use crate::error::BakeFailure;
use crate::scene::GeometryTarget;

bitflags::bitflags! {
    /// Types of reflections data to bake.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ReflectionsBakeFlags: u32 {
        /// Impulse responses for convolution, hybrid or TrueAudio Next rendering.
        const BAKE_CONVOLUTION = 1 << 0;

        /// Parametric reverb for parametric or hybrid rendering.
        const BAKE_PARAMETRIC = 1 << 1;
    }
}

impl ReflectionsBakeFlags {
    pub fn from_desc(desc: &BakeDesc) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::BAKE_CONVOLUTION, desc.bake_convolution);
        flags.set(Self::BAKE_PARAMETRIC, desc.bake_parametric);
        flags
    }
}

/// Parameters used to control how reflections data is baked.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionsBakeParams {
    /// The data layer to bake. Existing data with this identifier is overwritten.
    pub identifier: BakedDataIdentifier,
    pub bake_flags: ReflectionsBakeFlags,
    pub num_rays: u32,
    pub num_diffuse_samples: u32,
    pub num_bounces: u32,
    /// Length in seconds of the impulse responses to simulate.
    pub simulated_duration: f32,
    /// Length in seconds of the impulse responses to save at each probe.
    pub saved_duration: f32,
    pub order: u32,
    pub num_threads: u32,
    pub irradiance_min_distance: f32,
    pub ray_batch_size: u32,
    /// Probes baked simultaneously. Only the Radeon Rays back-end batches.
    pub bake_batch_size: u32,
}

impl ReflectionsBakeParams {
    pub fn from_desc(
        desc: &BakeDesc,
        identifier: BakedDataIdentifier,
        scene_type: SceneType,
        cpu_cores: usize,
    ) -> Self {
        Self {
            identifier,
            bake_flags: ReflectionsBakeFlags::from_desc(desc),
            num_rays: desc.rays,
            num_diffuse_samples: desc.diffuse_samples,
            num_bounces: desc.bounces,
            simulated_duration: desc.duration,
            saved_duration: desc.duration,
            order: desc.ambisonic_order,
            num_threads: threads_for_cpu_percentage(desc.cpu_cores_percentage, cpu_cores),
            irradiance_min_distance: desc.irradiance_min_distance,
            ray_batch_size: desc.ray_batch_size,
            bake_batch_size: match scene_type {
                SceneType::RadeonRays => desc.batch_size,
                _ => 1,
            },
        }
    }
}

/// Parameters used to control how pathing data is baked.
#[derive(Debug, Clone, PartialEq)]
pub struct PathBakeParams {
    pub identifier: BakedDataIdentifier,
    /// Point samples around each probe used for visibility tests.
    pub num_samples: u32,
    /// Radius in meters of the sphere each probe is treated as.
    pub radius: f32,
    /// Unoccluded fraction above which two probes are mutually visible.
    pub threshold: f32,
    pub visibility_range: f32,
    pub path_range: f32,
    pub num_threads: u32,
}

impl PathBakeParams {
    pub fn from_desc(desc: &BakeDesc, identifier: BakedDataIdentifier, cpu_cores: usize) -> Self {
        Self {
            identifier,
            num_samples: desc.visibility_samples,
            radius: desc.visibility_radius,
            threshold: desc.visibility_threshold,
            visibility_range: desc.visibility_range,
            path_range: desc.path_range,
            num_threads: threads_for_cpu_percentage(desc.pathing_cpu_cores_percentage, cpu_cores),
        }
    }
}

/// State of the exported scene a bake context was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSummary {
    pub name: String,
    pub exported: bool,
    pub triangle_count: usize,
    pub scene_type: SceneType,
}

/// Result of baking one probe batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeOutput {
    /// The whole serialized probe batch, layers included.
    pub data: Vec<u8>,
    /// Size in bytes of the layer that was just baked.
    pub layer_size: usize,
}

/// A temporary simulation context used only for baking.
///
/// The context is created by the host before [`BakeJobRunner::begin_bake`](super::BakeJobRunner::begin_bake)
/// and torn down (dropped) when the job is finalized.
///
/// The `progress` callback may be invoked from any engine-owned thread and
/// must only perform lock-free updates.
pub trait BakeEngine: GeometryTarget + Send + Sync {
    fn scene_summary(&self) -> SceneSummary;

    /// Loads `batch` into the context and bakes the requested reflections layer.
    fn bake_reflections(
        &self,
        batch: &ProbeBatch,
        params: &ReflectionsBakeParams,
        progress: &(dyn Fn(f32) + Sync),
    ) -> Result<BakeOutput, BakeFailure>;

    /// Loads `batch` into the context and bakes pathing data for it.
    fn bake_pathing(
        &self,
        batch: &ProbeBatch,
        params: &PathBakeParams,
        progress: &(dyn Fn(f32) + Sync),
    ) -> Result<BakeOutput, BakeFailure>;

    /// Asks an in-flight bake call to return early. Best effort.
    fn cancel_bake(&self);
}
