//! Mutable per-vehicle state

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::math::{forward, look_rotation, yaw_rotation};
use super::pool::VehicleId;
use super::snapshot::{Snapshot, Timeline};

/// Position and body rotation used when placing a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, yaw_deg: f32) -> Self {
        Self {
            position,
            rotation: yaw_rotation(yaw_deg),
        }
    }
}

/// Which source drives a vehicle this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleMode {
    /// Simulated forward; every result is appended to the timeline
    Recording,
    /// Cursor walks toward the head while the global rewind is held
    Rewinding,
    /// Cursor walks toward the tail, applying stored state without new input
    Replaying,
}

/// Vehicle state (authoritative)
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub id: VehicleId,

    // Kinematics
    pub position: Vec3,
    /// World units per tick
    pub velocity: Vec3,
    pub rotation: Quat,
    pub target_rotation: Quat,

    // Input actually used by the last step
    pub forward_input: f32,
    pub steer_input: f32,

    pub energy: f32,
    pub on_ground: bool,
    /// Seconds left before other vehicles can destroy this one; 0 = vulnerable
    pub invulnerable_timer: f32,
    pub destroyed: bool,
    pub player_controlled: bool,
    /// Skid visual flag from the last simulated tick
    pub skidding: bool,

    pub mode: VehicleMode,
    pub timeline: Timeline,
}

impl VehicleState {
    pub fn new(id: VehicleId) -> Self {
        Self {
            id,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            target_rotation: Quat::IDENTITY,
            forward_input: 0.0,
            steer_input: 0.0,
            energy: 0.0,
            on_ground: false,
            invulnerable_timer: 0.0,
            destroyed: false,
            player_controlled: false,
            skidding: false,
            mode: VehicleMode::Recording,
            timeline: Timeline::new(),
        }
    }

    /// Put the vehicle back into its freshly spawned state at `pose`
    pub fn reset(&mut self, pose: Pose, energy: f32, invulnerable_time: f32) {
        self.position = pose.position;
        self.rotation = pose.rotation;
        self.target_rotation =
            look_rotation(forward(pose.rotation), Vec3::Y).unwrap_or(pose.rotation);
        self.velocity = Vec3::ZERO;
        self.forward_input = 0.0;
        self.steer_input = 0.0;
        self.energy = energy;
        self.on_ground = false;
        self.invulnerable_timer = invulnerable_time;
        self.destroyed = false;
        self.player_controlled = false;
        self.skidding = false;
        self.mode = VehicleMode::Recording;
        self.timeline.clear();
    }

    pub fn invulnerable(&self) -> bool {
        self.invulnerable_timer > 0.0
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            rotation: self.rotation,
        }
    }

    pub fn capture(&self) -> Snapshot {
        Snapshot {
            position: self.position,
            velocity: self.velocity,
            rotation: self.rotation,
            target_rotation: self.target_rotation,
            forward_input: self.forward_input,
            steer_input: self.steer_input,
            energy: self.energy,
        }
    }

    /// Overwrite the recorded fields with `snapshot`, verbatim
    pub fn apply(&mut self, snapshot: &Snapshot) {
        self.position = snapshot.position;
        self.velocity = snapshot.velocity;
        self.rotation = snapshot.rotation;
        self.target_rotation = snapshot.target_rotation;
        self.forward_input = snapshot.forward_input;
        self.steer_input = snapshot.steer_input;
        self.energy = snapshot.energy;
    }

    /// Record the current state at the timeline tail
    pub fn record(&mut self) {
        let snapshot = self.capture();
        self.timeline.push(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_spawn_state() {
        let mut v = VehicleState::new(VehicleId::default());
        v.velocity = Vec3::X;
        v.destroyed = true;
        v.record();
        v.reset(Pose::new(Vec3::new(1.0, 2.0, 3.0), 90.0), 50.0, 1.5);

        assert_eq!(v.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.velocity, Vec3::ZERO);
        assert_eq!(v.energy, 50.0);
        assert!(v.invulnerable());
        assert!(!v.destroyed);
        assert!(v.timeline.is_empty());
        assert!((forward(v.target_rotation) - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn capture_then_apply_is_exact() {
        let mut a = VehicleState::new(VehicleId::default());
        a.position = Vec3::new(0.1, 0.2, 0.3);
        a.velocity = Vec3::new(-0.5, 0.0, 0.25);
        a.rotation = yaw_rotation(33.0);
        a.forward_input = 0.75;
        a.steer_input = -0.2;
        a.energy = 12.5;

        let mut b = VehicleState::new(VehicleId::default());
        b.apply(&a.capture());
        assert_eq!(b.capture(), a.capture());
    }
}
