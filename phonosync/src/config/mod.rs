//! Configuration descriptors for the real-time scheduler and the bake pipeline.

mod bake_desc;
mod simulation_desc;

pub use bake_desc::BakeDesc;
pub use simulation_desc::{
    RealTimeSettings, ReflectionEffectType, SceneType, SimulationDesc, WorkerExecution,
};

/// Number of worker threads to dedicate given a share of the machine's cores.
///
/// Always returns at least one thread.
pub fn threads_for_cpu_percentage(percentage: u32, cpu_cores: usize) -> u32 {
    let threads = (percentage as f32 * cpu_cores as f32) / 100.0;
    (threads as u32).max(1)
}

/// Number of logical cores reported by the OS, or 1 if unavailable.
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
