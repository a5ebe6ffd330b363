//! Background baking of reflections and pathing data.
//!
//! A bake runs a list of [`BakeTask`]s on a dedicated thread. Each task bakes
//! one endpoint against its probe batches and persists the result through a
//! [`BakedDataStore`]. The host drives the job with [`BakeJobRunner::poll`]
//! once per tick and may cancel it at any time with [`BakeJobRunner::cancel`].

mod engine;
mod runner;
mod status;
mod store;
mod task;

pub use engine::{
    BakeEngine, BakeOutput, PathBakeParams, ReflectionsBakeFlags, ReflectionsBakeParams,
    SceneSummary,
};
pub use runner::{BakeJobRunner, BakeOutcome, BakePoll, BakeSummary};
pub use status::{BakeProgress, BakeStatus};
pub use store::{BakedDataStore, DirectoryStore, MemoryStore};
pub use task::{BakeTarget, BakeTask, ProbeBatch};

use crate::math::Sphere;

/// Kind of data stored in a probe batch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BakedDataType {
    Reflections,
    Pathing,
}

/// How a baked layer varies with the endpoint it was baked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BakedDataVariation {
    /// Listener-centric reverb, valid anywhere in the batch.
    Reverb,
    /// Reflections from a static source anywhere inside the sphere.
    StaticSource(Sphere),
    /// Reflections heard by a static listener inside the sphere.
    StaticListener(Sphere),
    /// Probe-to-probe data with no fixed endpoint.
    Dynamic,
}

/// Key of one baked layer within a probe batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakedDataIdentifier {
    pub data_type: BakedDataType,
    pub variation: BakedDataVariation,
}

impl BakedDataIdentifier {
    pub fn reverb() -> Self {
        Self {
            data_type: BakedDataType::Reflections,
            variation: BakedDataVariation::Reverb,
        }
    }

    pub fn static_source(influence: Sphere) -> Self {
        Self {
            data_type: BakedDataType::Reflections,
            variation: BakedDataVariation::StaticSource(influence),
        }
    }

    pub fn static_listener(influence: Sphere) -> Self {
        Self {
            data_type: BakedDataType::Reflections,
            variation: BakedDataVariation::StaticListener(influence),
        }
    }

    pub fn pathing() -> Self {
        Self {
            data_type: BakedDataType::Pathing,
            variation: BakedDataVariation::Dynamic,
        }
    }

    /// Suffix used in task display names.
    pub fn label(&self) -> &'static str {
        match (self.data_type, self.variation) {
            (BakedDataType::Pathing, _) => "Pathing",
            (_, BakedDataVariation::Reverb) => "Reverb",
            _ => "Reflections",
        }
    }
}
