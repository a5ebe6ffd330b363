//! Error types for PhonoSync

use thiserror::Error;

/// Status reported by the simulation engine for a single call.
///
/// These mirror the engine's own result codes; they never carry ownership of
/// engine state, so they are cheap to copy across threads.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    #[error("unspecified engine error")]
    Unspecified,

    #[error("engine ran out of memory")]
    OutOfMemory,

    #[error("engine failed to initialize an external dependency")]
    Initialization,
}

/// Failure of a single bake unit (one probe batch).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BakeFailure {
    /// The batch could not be baked; the job moves on to the next one.
    #[error("{0}")]
    Skip(String),

    /// The engine cannot continue; the whole job aborts.
    #[error("unrecoverable: {0}")]
    Fatal(String),
}

impl From<CoreError> for BakeFailure {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OutOfMemory | CoreError::Initialization => Self::Fatal(err.to_string()),
            CoreError::Unspecified => Self::Skip(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum PhonoSyncError {
    #[error("A bake is already in progress")]
    BakeInProgress,

    #[error("Scene has not been exported: {0}")]
    SceneNotExported(String),

    #[error("Scene {0} has no geometry")]
    EmptyScene(String),

    #[error("Baking is not supported with the {0:?} scene type")]
    UnsupportedSceneType(crate::config::SceneType),

    #[error("Failed to create simulation context: {0}")]
    ContextCreation(String),

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("Simulation engine error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, PhonoSyncError>;
