//! Optional compute devices and the fallbacks taken when they are missing.
//!
//! Accelerated ray tracers and convolution need devices that may not exist on
//! the host. Failing to create one is never fatal: the session degrades to the
//! default ray tracer or to plain convolution and a warning is logged.

use crate::config::{RealTimeSettings, ReflectionEffectType, SceneType, SimulationDesc};
use crate::error::CoreError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Embree,
    OpenCl,
    RadeonRays,
    TrueAudioNext,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Embree => "Embree",
            Self::OpenCl => "OpenCL",
            Self::RadeonRays => "Radeon Rays",
            Self::TrueAudioNext => "TrueAudio Next",
        };
        f.write_str(name)
    }
}

/// Creates the engine's optional devices.
///
/// Radeon Rays and TrueAudio Next are only requested after OpenCL succeeded.
pub trait DeviceBackend {
    fn create_embree(&mut self) -> Result<(), CoreError>;
    fn create_open_cl(&mut self) -> Result<(), CoreError>;
    fn create_radeon_rays(&mut self) -> Result<(), CoreError>;
    fn create_true_audio_next(&mut self, settings: &RealTimeSettings) -> Result<(), CoreError>;
}

/// Devices that were created for a session, and the resulting effective
/// scene and reflection effect types.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSet {
    scene_type: SceneType,
    reflection_effect_type: ReflectionEffectType,
    created: Vec<DeviceKind>,
    failures: Vec<(DeviceKind, CoreError)>,
}

impl DeviceSet {
    pub fn initialize<B: DeviceBackend + ?Sized>(desc: &SimulationDesc, backend: &mut B) -> Self {
        let mut set = Self {
            scene_type: desc.scene_type,
            reflection_effect_type: desc.reflection_effect_type,
            created: Vec::new(),
            failures: Vec::new(),
        };

        if set.scene_type == SceneType::Embree
            && !set.try_create(DeviceKind::Embree, backend.create_embree())
        {
            set.scene_type = SceneType::Default;
        }

        let needs_open_cl = set.scene_type == SceneType::RadeonRays
            || set.reflection_effect_type == ReflectionEffectType::TrueAudioNext;
        if needs_open_cl && !set.try_create(DeviceKind::OpenCl, backend.create_open_cl()) {
            if set.scene_type == SceneType::RadeonRays {
                set.scene_type = SceneType::Default;
            }
            if set.reflection_effect_type == ReflectionEffectType::TrueAudioNext {
                set.reflection_effect_type = ReflectionEffectType::Convolution;
            }
        }

        if set.scene_type == SceneType::RadeonRays
            && !set.try_create(DeviceKind::RadeonRays, backend.create_radeon_rays())
        {
            set.scene_type = SceneType::Default;
        }

        if set.reflection_effect_type == ReflectionEffectType::TrueAudioNext
            && !set.try_create(
                DeviceKind::TrueAudioNext,
                backend.create_true_audio_next(&desc.real_time),
            )
        {
            set.reflection_effect_type = ReflectionEffectType::Convolution;
        }

        set
    }

    fn try_create(&mut self, kind: DeviceKind, result: Result<(), CoreError>) -> bool {
        match result {
            Ok(()) => {
                log::debug!("Created {} device", kind);
                self.created.push(kind);
                true
            }
            Err(e) => {
                log::warn!("Unable to create {} device ({}), falling back", kind, e);
                self.failures.push((kind, e));
                false
            }
        }
    }

    pub fn scene_type(&self) -> SceneType {
        self.scene_type
    }

    pub fn reflection_effect_type(&self) -> ReflectionEffectType {
        self.reflection_effect_type
    }

    pub fn has(&self, kind: DeviceKind) -> bool {
        self.created.contains(&kind)
    }

    pub fn failures(&self) -> &[(DeviceKind, CoreError)] {
        &self.failures
    }

    /// `desc` with its scene and effect types replaced by the effective ones.
    pub fn apply(&self, desc: SimulationDesc) -> SimulationDesc {
        desc.scene_type(self.scene_type)
            .reflection_effect_type(self.reflection_effect_type)
    }
}
