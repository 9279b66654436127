//! Level description: terrain, obstacles, spawn pose and trigger volumes

use std::path::Path;

use glam::{UVec2, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::terrain::{Aabb, HeightField, TerrainWorld};
use crate::game::physics::VehicleTuning;
use crate::game::session::SessionTuning;

/// Ground definition as stored in a level file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroundDescription {
    Flat {
        height: f32,
    },
    Heightfield {
        origin: Vec2,
        dims: UVec2,
        cell: Vec2,
        heights: Vec<f32>,
    },
}

/// What happens when a vehicle enters a trigger volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerKind {
    /// Energy pickup; all of them must be taken before an exit opens
    Collectible,
    /// Finishes the level once no collectibles remain
    ExitZone,
}

/// Spherical trigger volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerVolume {
    pub kind: TriggerKind,
    pub position: Vec3,
    pub radius: f32,
}

impl TriggerVolume {
    pub fn touches(&self, point: Vec3, body_radius: f32) -> bool {
        let reach = self.radius + body_radius;
        self.position.distance_squared(point) <= reach * reach
    }
}

/// A playable level as loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDescription {
    pub name: String,
    /// Level loaded after a successful finish
    pub next_level: String,
    pub spawn_position: Vec3,
    /// Spawn heading in degrees about world up
    #[serde(default)]
    pub spawn_yaw_deg: f32,
    pub ground: GroundDescription,
    #[serde(default)]
    pub obstacles: Vec<Aabb>,
    #[serde(default)]
    pub triggers: Vec<TriggerVolume>,
    #[serde(default)]
    pub vehicle_tuning: Option<VehicleTuning>,
    #[serde(default)]
    pub session_tuning: Option<SessionTuning>,
}

impl LevelDescription {
    pub fn load(path: &Path) -> Result<Self, LevelError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Build the collision world for this level
    pub fn build_world(&self) -> Result<TerrainWorld, LevelError> {
        let ground = match &self.ground {
            GroundDescription::Flat { height } => HeightField::flat(*height),
            GroundDescription::Heightfield {
                origin,
                dims,
                cell,
                heights,
            } => HeightField::from_heights(*origin, *dims, *cell, heights.clone())?,
        };
        Ok(TerrainWorld {
            ground,
            obstacles: self.obstacles.clone(),
        })
    }

    pub fn collectible_count(&self) -> usize {
        self.triggers
            .iter()
            .filter(|t| t.kind == TriggerKind::Collectible)
            .count()
    }

    /// Small built-in course: a gentle hill, one wall, two pickups and an exit
    pub fn demo() -> Self {
        let dims = UVec2::new(16, 16);
        let mut heights = Vec::with_capacity((dims.x * dims.y) as usize);
        for z in 0..dims.y {
            for x in 0..dims.x {
                let dx = x as f32 - 8.0;
                let dz = z as f32 - 10.0;
                heights.push((1.5 - 0.05 * (dx * dx + dz * dz)).max(0.0));
            }
        }

        Self {
            name: "demo".to_string(),
            next_level: "demo".to_string(),
            spawn_position: Vec3::new(0.0, 0.5, 0.0),
            spawn_yaw_deg: 0.0,
            ground: GroundDescription::Heightfield {
                origin: Vec2::new(-30.0, -10.0),
                dims,
                cell: Vec2::splat(4.0),
                heights,
            },
            obstacles: vec![Aabb::new(
                Vec3::new(-12.0, -1.0, 24.0),
                Vec3::new(-4.0, 3.0, 26.0),
            )],
            triggers: vec![
                TriggerVolume {
                    kind: TriggerKind::Collectible,
                    position: Vec3::new(0.0, 1.0, 12.0),
                    radius: 1.5,
                },
                TriggerVolume {
                    kind: TriggerKind::Collectible,
                    position: Vec3::new(6.0, 1.0, 30.0),
                    radius: 1.5,
                },
                TriggerVolume {
                    kind: TriggerKind::ExitZone,
                    position: Vec3::new(0.0, 1.0, 44.0),
                    radius: 3.0,
                },
            ],
            vehicle_tuning: None,
            session_tuning: None,
        }
    }
}

/// Level loading errors
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("Failed to read level file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse level file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Heightfield needs at least 2x2 samples, got {0}x{1}")]
    HeightfieldTooSmall(u32, u32),

    #[error("Heightfield expects {expected} samples, got {actual}")]
    HeightfieldSize { expected: usize, actual: usize },

    #[error("Heightfield cell size must be positive")]
    InvalidCellSize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{CollisionWorld, Layer};

    #[test]
    fn demo_level_round_trips_through_json() {
        let demo = LevelDescription::demo();
        let raw = serde_json::to_string(&demo).unwrap();
        let parsed = LevelDescription::from_json(&raw).unwrap();
        assert_eq!(parsed.name, "demo");
        assert_eq!(parsed.collectible_count(), 2);
        assert!(parsed.build_world().is_ok());
    }

    #[test]
    fn minimal_level_uses_defaults() {
        let raw = r#"{
            "name": "flat",
            "next_level": "hills",
            "spawn_position": [0.0, 0.0, 0.0],
            "ground": { "kind": "flat", "height": 0.0 }
        }"#;
        let level = LevelDescription::from_json(raw).unwrap();
        assert!(level.triggers.is_empty());
        assert!(level.vehicle_tuning.is_none());
        let world = level.build_world().unwrap();
        assert!(world
            .raycast(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Y, 2.0, Layer::Ground)
            .is_some());
    }

    #[test]
    fn bad_heightfield_is_rejected() {
        let raw = r#"{
            "name": "broken",
            "next_level": "broken",
            "spawn_position": [0.0, 0.0, 0.0],
            "ground": { "kind": "heightfield", "origin": [0.0, 0.0], "dims": [3, 3], "cell": [1.0, 1.0], "heights": [0.0] }
        }"#;
        let level = LevelDescription::from_json(raw).unwrap();
        assert!(matches!(
            level.build_world(),
            Err(LevelError::HeightfieldSize { .. })
        ));
    }

    #[test]
    fn trigger_touch_includes_body_radius() {
        let trigger = TriggerVolume {
            kind: TriggerKind::Collectible,
            position: Vec3::ZERO,
            radius: 1.0,
        };
        assert!(trigger.touches(Vec3::new(1.4, 0.0, 0.0), 0.5));
        assert!(!trigger.touches(Vec3::new(1.6, 0.0, 0.0), 0.5));
    }
}
