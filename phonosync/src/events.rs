//! Event types for PhonoSync

/// Notifications emitted by the bake thread, drained with
/// [`BakeJobRunner::poll_events`](crate::bake::BakeJobRunner::poll_events).
#[derive(Debug, Clone, PartialEq)]
pub enum BakeEvent {
    TaskStarted {
        task_index: usize,
        name: String,
    },
    BatchSkipped {
        task_index: usize,
        batch_index: usize,
        reason: String,
    },
    BatchBaked {
        task_index: usize,
        batch_index: usize,
        batch: String,
        bytes: usize,
    },
    TaskCompleted {
        task_index: usize,
        name: String,
    },
    Cancelled {
        task_index: usize,
    },
    Aborted {
        task_index: usize,
        error: String,
    },
}

impl BakeEvent {
    pub fn task_index(&self) -> usize {
        match self {
            Self::TaskStarted { task_index, .. }
            | Self::BatchSkipped { task_index, .. }
            | Self::BatchBaked { task_index, .. }
            | Self::TaskCompleted { task_index, .. }
            | Self::Cancelled { task_index }
            | Self::Aborted { task_index, .. } => *task_index,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Self::BatchSkipped { .. } | Self::Aborted { .. })
    }

    /// True for events that end the job early.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::Aborted { .. })
    }
}
