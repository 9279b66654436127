//! Outward call-outs produced by a session tick

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::pool::VehicleId;

/// How a level attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LevelOutcome {
    Success { next_level: String },
    /// The active vehicle stopped with an empty tank
    FailFuel,
    /// No vehicle left to control for too long
    FailTimeline,
}

/// Events emitted during a tick, in the order they happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    VehicleActivated {
        vehicle: VehicleId,
    },
    VehicleDestroyed {
        vehicle: VehicleId,
        position: Vec3,
    },
    /// One-shot explosion effect at a world position
    ExplosionRequested {
        position: Vec3,
    },
    /// Camera should follow a new active vehicle
    CameraRetarget {
        vehicle: VehicleId,
    },
    RewindStarted {
        vehicle: VehicleId,
    },
    RewindReleased {
        /// The vehicle left behind to replay the abandoned branch
        ghost: VehicleId,
        /// The vehicle now under player control
        active: VehicleId,
        remaining: u32,
    },
    /// Rewind aborted without forking (level ended mid-rewind)
    RewindCancelled,
    CollectibleTaken {
        vehicle: VehicleId,
        remaining: usize,
    },
    EnergyDepleted {
        vehicle: VehicleId,
    },
    LevelEnded {
        outcome: LevelOutcome,
    },
    /// Transition finished; the host should load this level
    LoadLevel {
        level: String,
    },
}
