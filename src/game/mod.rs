//! Game simulation modules

pub mod events;
pub mod ground;
pub mod lifecycle;
pub mod math;
pub mod physics;
pub mod pool;
pub mod rewind;
pub mod session;
pub mod snapshot;
pub mod vehicle;

pub use events::{LevelOutcome, SessionEvent};
pub use physics::{VehicleSimulator, VehicleTuning};
pub use pool::VehicleId;
pub use session::{GameSession, LevelPhase, SessionError, SessionTuning};
pub use snapshot::{Snapshot, Timeline};
pub use vehicle::{Pose, VehicleMode, VehicleState};

use serde::{Deserialize, Serialize};

/// The two driving axes, already normalised by the input layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveInput {
    /// -1.0 = full reverse, 1.0 = full forward
    pub forward: f32,
    /// -1.0 = full left, 1.0 = full right
    pub steer: f32,
}

/// Input state for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    pub drive: DriveInput,
    /// Rewind button level; start/stop edges are derived from it
    pub rewind_held: bool,
    /// Acknowledge the end-of-level prompt
    pub confirm: bool,
}

impl TickInput {
    pub fn driving(forward: f32, steer: f32) -> Self {
        Self {
            drive: DriveInput { forward, steer },
            ..Self::default()
        }
    }

    pub fn rewinding() -> Self {
        Self {
            rewind_held: true,
            ..Self::default()
        }
    }
}
