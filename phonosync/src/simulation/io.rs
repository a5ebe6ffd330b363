//! Inputs pushed to and outputs read from the simulation engine.

use super::SimulationFlags;
use crate::bake::BakedDataIdentifier;
use crate::config::RealTimeSettings;
use crate::math::{CoordinateFrame, Pose};

/// Listener pose and global parameters shared by every source in a pass.
///
/// Built once per pass and never modified while that pass runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedInputs {
    pub listener: CoordinateFrame,
    pub num_rays: u32,
    pub num_bounces: u32,
    /// Impulse response length in seconds
    pub duration: f32,
    pub order: u32,
    pub irradiance_min_distance: f32,
}

impl SharedInputs {
    pub fn new(listener: &Pose, settings: &RealTimeSettings) -> Self {
        Self {
            listener: CoordinateFrame::from_pose(listener),
            num_rays: settings.rays,
            num_bounces: settings.bounces,
            duration: settings.duration,
            order: settings.ambisonic_order,
            irradiance_min_distance: settings.irradiance_min_distance,
        }
    }
}

/// Direct-path models to evaluate for a source.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectParams {
    pub distance_attenuation: bool,
    pub air_absorption: bool,
    /// Dipole weight and power; `None` for an omnidirectional source.
    pub directivity: Option<(f32, f32)>,
    pub occlusion: bool,
    pub transmission: bool,
    /// Radius used for volumetric occlusion, in meters.
    pub occlusion_radius: f32,
}

impl Default for DirectParams {
    fn default() -> Self {
        Self {
            distance_attenuation: true,
            air_absorption: true,
            directivity: None,
            occlusion: false,
            transmission: false,
            occlusion_radius: 1.0,
        }
    }
}

/// Reflections source settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionsParams {
    /// Baked layer to read instead of tracing in real time.
    pub baked: Option<BakedDataIdentifier>,
    /// Per-band multiplier applied to reverb times
    pub reverb_scale: [f32; 3],
}

impl Default for ReflectionsParams {
    fn default() -> Self {
        Self {
            baked: None,
            reverb_scale: [1.0; 3],
        }
    }
}

/// Pathing settings for a source. Pathing always reads baked probe data.
#[derive(Debug, Clone, PartialEq)]
pub struct PathingParams {
    pub probe_batch: String,
    pub visibility_radius: f32,
    pub visibility_threshold: f32,
    pub visibility_range: f32,
    pub order: u32,
    pub validation: bool,
    pub find_alternate_paths: bool,
}

/// Per-endpoint inputs for one or more passes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulationInputs {
    pub source: CoordinateFrame,
    pub direct: DirectParams,
    pub reflections: ReflectionsParams,
    pub pathing: Option<PathingParams>,
}

impl SimulationInputs {
    pub fn at(pose: &Pose) -> Self {
        Self {
            source: CoordinateFrame::from_pose(pose),
            ..Default::default()
        }
    }

    pub fn with_direct(mut self, params: DirectParams) -> Self {
        self.direct = params;
        self
    }

    pub fn with_reflections(mut self, params: ReflectionsParams) -> Self {
        self.reflections = params;
        self
    }

    pub fn with_pathing(mut self, params: PathingParams) -> Self {
        self.pathing = Some(params);
        self
    }
}

/// Results of the direct pass.
///
/// `pass` is the sequence number of the engine pass that produced the block;
/// zero means the block has never been written.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectOutputs {
    pub pass: u64,
    pub distance_attenuation: f32,
    pub air_absorption: [f32; 3],
    pub directivity: f32,
    pub occlusion: f32,
    pub transmission: [f32; 3],
}

impl Default for DirectOutputs {
    fn default() -> Self {
        Self {
            pass: 0,
            distance_attenuation: 1.0,
            air_absorption: [1.0; 3],
            directivity: 1.0,
            occlusion: 1.0,
            transmission: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReflectionsOutputs {
    pub pass: u64,
    /// Per-band RT60 in seconds
    pub reverb_times: [f32; 3],
    /// Total energy of the simulated impulse response
    pub energy: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathingOutputs {
    pub pass: u64,
    pub eq_coeffs: [f32; 3],
    pub sh_coeffs: Vec<f32>,
}

/// Everything the engine produced for one endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulationOutputs {
    pub direct: DirectOutputs,
    pub reflections: ReflectionsOutputs,
    pub pathing: PathingOutputs,
}

impl SimulationOutputs {
    /// Overwrites the blocks selected by `flags` with those from `other`.
    pub fn update_from(&mut self, other: SimulationOutputs, flags: SimulationFlags) {
        if flags.contains(SimulationFlags::DIRECT) {
            self.direct = other.direct;
        }
        if flags.contains(SimulationFlags::REFLECTIONS) {
            self.reflections = other.reflections;
        }
        if flags.contains(SimulationFlags::PATHING) {
            self.pathing = other.pathing;
        }
    }
}
