//! World collaborator: ray queries against the ground/obstacle classifications
//! and the body controller used to apply a tick's displacement.

pub mod level;
pub mod terrain;

pub use level::{LevelDescription, LevelError, TriggerKind, TriggerVolume};
pub use terrain::{Aabb, HeightField, TerrainWorld};

use glam::Vec3;

/// The two disjoint surface classifications a ray can be tested against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Ground,
    Obstacle,
}

/// Closest intersection of a ray with one classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    /// Unit surface normal at `point`
    pub normal: Vec3,
    pub distance: f32,
}

/// Geometry queries the simulation needs from the world.
///
/// A missed ray is a normal outcome and is reported as `None`. A zero-length
/// direction never hits.
pub trait CollisionWorld {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, layer: Layer)
        -> Option<RayHit>;

    /// Move a body of `radius` by `displacement`, resolving small penetrations.
    /// Returns the resulting position.
    fn move_body(&self, position: Vec3, displacement: Vec3, radius: f32) -> Vec3;
}
