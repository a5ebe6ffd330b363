//! Scene staging: buffers geometry mutations until a safe commit point.
//!
//! Geometry may change on any thread (a dynamic object moves, a level streams
//! in), but the simulation engine must never see a mutation while it is tracing
//! rays through the scene. [`SceneStage`] records the mutations and a dirty
//! flag; the scheduler folds them into the engine with
//! [`SceneStage::commit_if_dirty`] only when no reflections/pathing pass is in
//! flight.

use crate::math::Mat4;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Handle for a mesh (static or instanced) in the scene.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

impl std::fmt::Display for MeshId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MeshId({})", self.0)
    }
}

/// A buffered geometry mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryChange {
    AddMesh { id: MeshId, transform: Mat4 },
    RemoveMesh { id: MeshId },
    UpdateTransform { id: MeshId, transform: Mat4 },
}

/// An engine context whose scene can absorb staged geometry.
pub trait GeometryTarget {
    /// Applies one buffered geometry mutation to the scene.
    ///
    /// Only called from a commit point, never while a pass is in flight.
    fn apply_geometry(&self, change: &GeometryChange);

    /// Finalizes applied geometry so it can be traced against.
    fn commit_scene(&self);
}

/// Holds pending scene mutations and the "commit required" flag.
pub struct SceneStage {
    name: String,
    dirty: AtomicBool,
    pending: Mutex<Vec<GeometryChange>>,
    commits: AtomicU64,
}

impl SceneStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dirty: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
            commits: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_mesh(&self, id: MeshId, transform: Mat4) {
        self.push(GeometryChange::AddMesh { id, transform });
    }

    pub fn remove_mesh(&self, id: MeshId) {
        self.push(GeometryChange::RemoveMesh { id });
    }

    pub fn update_transform(&self, id: MeshId, transform: Mat4) {
        self.push(GeometryChange::UpdateTransform { id, transform });
    }

    /// Requests a commit at the next safe point. Callable from any thread.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Number of buffered mutations not yet folded into the engine.
    pub fn pending_changes(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of commits performed so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    /// Applies buffered mutations and commits the scene if anything changed.
    ///
    /// Must only be called when no simulation pass reads the scene. Returns
    /// whether a commit happened.
    pub fn commit_if_dirty<T: GeometryTarget + ?Sized>(&self, target: &T) -> bool {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return false;
        }

        let changes = std::mem::take(&mut *self.pending.lock());
        for change in &changes {
            target.apply_geometry(change);
        }
        target.commit_scene();
        self.commits.fetch_add(1, Ordering::AcqRel);

        log::debug!(
            "Committed scene '{}' ({} geometry changes)",
            self.name,
            changes.len()
        );
        true
    }

    fn push(&self, change: GeometryChange) {
        self.pending.lock().push(change);
        self.mark_dirty();
    }
}
