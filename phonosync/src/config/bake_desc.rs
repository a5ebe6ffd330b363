use crate::error::{PhonoSyncError, Result};

/// Configuration descriptor for baking reflections and pathing data
#[derive(Debug, Clone, PartialEq)]
pub struct BakeDesc {
    /// Bake impulse responses for convolution/hybrid rendering
    pub bake_convolution: bool,
    /// Bake parametric reverb estimates
    pub bake_parametric: bool,
    pub rays: u32,
    pub diffuse_samples: u32,
    pub bounces: u32,
    /// Impulse response length in seconds
    pub duration: f32,
    pub ambisonic_order: u32,
    pub cpu_cores_percentage: u32,
    pub irradiance_min_distance: f32,
    pub ray_batch_size: u32,
    /// Probes baked simultaneously on the Radeon Rays back-end
    pub batch_size: u32,
    pub visibility_samples: u32,
    pub visibility_radius: f32,
    pub visibility_threshold: f32,
    pub visibility_range: f32,
    pub path_range: f32,
    pub pathing_cpu_cores_percentage: u32,
}

impl Default for BakeDesc {
    fn default() -> Self {
        Self {
            bake_convolution: true,
            bake_parametric: false,
            rays: 16384,
            diffuse_samples: 1024,
            bounces: 16,
            duration: 1.0,
            ambisonic_order: 1,
            cpu_cores_percentage: 50,
            irradiance_min_distance: 1.0,
            ray_batch_size: 16,
            batch_size: 8,
            visibility_samples: 4,
            visibility_radius: 1.0,
            visibility_threshold: 0.1,
            visibility_range: 1000.0,
            path_range: 1000.0,
            pathing_cpu_cores_percentage: 50,
        }
    }
}

impl BakeDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bake_convolution(mut self, enable: bool) -> Self {
        self.bake_convolution = enable;
        self
    }

    pub fn bake_parametric(mut self, enable: bool) -> Self {
        self.bake_parametric = enable;
        self
    }

    pub fn rays(mut self, rays: u32) -> Self {
        self.rays = rays;
        self
    }

    pub fn bounces(mut self, bounces: u32) -> Self {
        self.bounces = bounces;
        self
    }

    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = seconds;
        self
    }

    pub fn ambisonic_order(mut self, order: u32) -> Self {
        self.ambisonic_order = order;
        self
    }

    pub fn cpu_cores_percentage(mut self, percentage: u32) -> Self {
        self.cpu_cores_percentage = percentage;
        self
    }

    pub fn batch_size(mut self, probes: u32) -> Self {
        self.batch_size = probes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rays == 0 || self.bounces == 0 {
            return Err(PhonoSyncError::Configuration(format!(
                "bake rays ({}) and bounces ({}) must be at least 1",
                self.rays, self.bounces
            )));
        }
        if self.ambisonic_order > 3 {
            return Err(PhonoSyncError::Configuration(format!(
                "bake ambisonic order {} out of range (max: 3)",
                self.ambisonic_order
            )));
        }
        if self.cpu_cores_percentage > 100 || self.pathing_cpu_cores_percentage > 100 {
            return Err(PhonoSyncError::Configuration(
                "bake CPU core percentages must not exceed 100".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.visibility_threshold) {
            return Err(PhonoSyncError::Configuration(format!(
                "visibility threshold {} out of range [0, 1]",
                self.visibility_threshold
            )));
        }

        Ok(())
    }
}
