//! Bake status shared between the bake thread and the polling host.
//!
//! Everything here is updated with atomics only: the progress callback runs on
//! an engine-owned thread and must never block.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Lifecycle of a bake job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BakeStatus {
    Ready = 0,
    InProgress = 1,
    /// All tasks finished, or the job stopped early. Waiting for finalization.
    Complete = 2,
}

impl BakeStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::InProgress,
            2 => Self::Complete,
            _ => Self::Ready,
        }
    }
}

/// Snapshot of a running bake, for progress display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakeProgress {
    pub status: BakeStatus,
    pub current_task: usize,
    pub total_tasks: usize,
    pub current_batch: usize,
    pub total_batches: usize,
    /// Fraction of the whole job, in `[0, 1]`.
    pub fraction: f32,
}

#[derive(Debug, Default)]
pub(crate) struct BakeStatusModel {
    status: AtomicU8,
    cancel_requested: AtomicBool,
    /// Task index in the high half, batch index in the low half, so both are
    /// always observed together.
    position: AtomicU64,
    total_tasks: AtomicUsize,
    total_batches: AtomicUsize,
    completed_units: AtomicUsize,
    total_units: AtomicUsize,
    unit_progress: AtomicU32,
}

impl BakeStatusModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> BakeStatus {
        BakeStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Moves `Ready -> InProgress` and resets all counters.
    ///
    /// Returns `false` if a job is already running or awaiting finalization.
    pub fn try_begin(&self, total_tasks: usize, total_units: usize) -> bool {
        if self.status() != BakeStatus::Ready {
            return false;
        }

        self.position.store(0, Ordering::Release);
        self.total_tasks.store(total_tasks, Ordering::Release);
        self.total_batches.store(0, Ordering::Release);
        self.completed_units.store(0, Ordering::Release);
        self.total_units.store(total_units, Ordering::Release);
        self.unit_progress.store(0f32.to_bits(), Ordering::Release);

        self.status
            .compare_exchange(
                BakeStatus::Ready as u8,
                BakeStatus::InProgress as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn enter_task(&self, task: usize, total_batches: usize) {
        self.total_batches.store(total_batches, Ordering::Release);
        self.position.store(pack(task, 0), Ordering::Release);
        self.unit_progress.store(0f32.to_bits(), Ordering::Release);
    }

    pub fn enter_batch(&self, batch: usize) {
        let (task, _) = unpack(self.position.load(Ordering::Acquire));
        self.position.store(pack(task, batch), Ordering::Release);
        self.unit_progress.store(0f32.to_bits(), Ordering::Release);
    }

    /// Progress of the unit being baked. Lock-free; called from engine threads.
    pub fn set_unit_progress(&self, fraction: f32) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.unit_progress.store(fraction.to_bits(), Ordering::Release);
    }

    pub fn finish_unit(&self) {
        self.completed_units.fetch_add(1, Ordering::AcqRel);
        self.unit_progress.store(0f32.to_bits(), Ordering::Release);
    }

    pub fn complete(&self) {
        self.status.store(BakeStatus::Complete as u8, Ordering::Release);
    }

    pub fn reset(&self) {
        self.position.store(0, Ordering::Release);
        self.total_tasks.store(0, Ordering::Release);
        self.total_batches.store(0, Ordering::Release);
        self.completed_units.store(0, Ordering::Release);
        self.total_units.store(0, Ordering::Release);
        self.unit_progress.store(0f32.to_bits(), Ordering::Release);
        self.status.store(BakeStatus::Ready as u8, Ordering::Release);
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    pub fn clear_cancel(&self) {
        self.cancel_requested.store(false, Ordering::Release);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// `(completed + current) / max(total, 1)`, clamped to `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        let completed = self.completed_units.load(Ordering::Acquire) as f32;
        let current = f32::from_bits(self.unit_progress.load(Ordering::Acquire));
        let total = self.total_units.load(Ordering::Acquire).max(1) as f32;
        ((completed + current) / total).clamp(0.0, 1.0)
    }

    pub fn snapshot(&self) -> BakeProgress {
        let (current_task, current_batch) = unpack(self.position.load(Ordering::Acquire));
        BakeProgress {
            status: self.status(),
            current_task,
            total_tasks: self.total_tasks.load(Ordering::Acquire),
            current_batch,
            total_batches: self.total_batches.load(Ordering::Acquire),
            fraction: self.fraction(),
        }
    }
}

fn pack(task: usize, batch: usize) -> u64 {
    ((task as u64) << 32) | (batch as u64 & 0xFFFF_FFFF)
}

fn unpack(position: u64) -> (usize, usize) {
    ((position >> 32) as usize, (position & 0xFFFF_FFFF) as usize)
}
