//! Math types for PhonoSync

pub use glam::{Mat4, Quat, Vec3};

/// Position and orientation of a listener or emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * (-Vec3::Z)
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.position.distance(other.position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Orthonormal frame handed to the simulation engine for a listener or source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateFrame {
    pub origin: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub ahead: Vec3,
}

impl CoordinateFrame {
    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            origin: pose.position,
            right: pose.right(),
            up: pose.up(),
            ahead: pose.forward(),
        }
    }
}

impl Default for CoordinateFrame {
    fn default() -> Self {
        Self::from_pose(&Pose::identity())
    }
}

/// A sphere describing the spatial influence of a baked endpoint or a probe.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        self.center.distance(point) <= self.radius
    }
}
