//! Vehicle physics: acceleration, drift, velocity-gated turning, obstacle
//! response and terrain alignment

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::ground::{GroundSample, GroundSampler};
use super::math::{angle_deg, forward, look_rotation, project_on_plane, right, up, NEAR_ZERO};
use super::vehicle::VehicleState;
use super::DriveInput;
use crate::world::{CollisionWorld, Layer};

/// Impacts only destroy when the velocity points this much into the obstacle
const IMPACT_FACING_DOT: f32 = -0.5;
/// Throttle magnitudes below this count as idle for energy use
const INPUT_DEADZONE: f32 = 1e-3;
/// Obstacle probes start this far above the vehicle origin
const OBSTACLE_PROBE_LIFT: f32 = 0.1;

/// Vehicle physics constants. Velocities are in world units per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleTuning {
    /// Forward acceleration while grounded (per second)
    pub acceleration: f32,
    /// Speed cap applied before dampening
    pub max_velocity: f32,
    /// Base (air) dampening factor, 1 = no drag
    pub velocity_dampening: f32,
    /// Subtracted from the dampening factor while grounded
    pub on_ground_dampening: f32,
    /// Subtracted from the dampening factor per unit of drift while grounded
    pub drifting_velocity_dampening: f32,

    /// Degrees between heading and velocity that count as full drift;
    /// also the largest per-tick turn target
    pub max_drift_angle: f32,
    /// Slerp factor toward the turn target
    pub drifting_angle_dampening: f32,
    /// Planar speed at which steering reaches full authority
    pub max_turning_velocity: f32,
    /// Drift factor above which skid marks are shown
    pub skid_threshold: f32,

    /// Downward acceleration (per second)
    pub gravity: f32,
    pub max_ground_check_distance: f32,
    pub alignment_probe_forward: f32,
    pub alignment_probe_side: f32,
    pub alignment_probe_height: f32,
    pub alignment_probe_distance: f32,

    /// Slerp factor toward the terrain-aligned target rotation on the ground
    pub terrain_rotation_lerp: f32,
    /// Multiplier on `terrain_rotation_lerp` while airborne
    pub air_rotation_lerp_scale: f32,
    /// Largest tilt from world up, in degrees, per local axis
    pub max_terrain_angle: f32,

    /// Obstacle probe reach beyond the body radius
    pub obstacle_probe_margin: f32,
    /// Sideways skew of the left/right obstacle probes
    pub obstacle_probe_skew: f32,
    /// Speed cap after bumping into an obstacle
    pub obstacle_hit_velocity_clamp: f32,
    /// Impacts above this speed destroy the vehicle
    pub destroy_on_impact_velocity: f32,

    /// Invulnerability to other vehicles after spawn or rewind, seconds
    pub invulnerable_start_time: f32,
    pub body_radius: f32,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            acceleration: 2.0,
            max_velocity: 0.8,
            velocity_dampening: 0.995,
            on_ground_dampening: 0.02,
            drifting_velocity_dampening: 0.03,
            max_drift_angle: 45.0,
            drifting_angle_dampening: 0.15,
            max_turning_velocity: 0.4,
            skid_threshold: 0.4,
            gravity: 1.5,
            max_ground_check_distance: 0.2,
            alignment_probe_forward: 1.0,
            alignment_probe_side: 1.0,
            alignment_probe_height: 2.5,
            alignment_probe_distance: 4.0,
            terrain_rotation_lerp: 0.2,
            air_rotation_lerp_scale: 0.15,
            max_terrain_angle: 35.0,
            obstacle_probe_margin: 0.4,
            obstacle_probe_skew: 0.75,
            obstacle_hit_velocity_clamp: 0.1,
            destroy_on_impact_velocity: 0.6,
            invulnerable_start_time: 1.0,
            body_radius: 0.5,
        }
    }
}

impl VehicleTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        if !(self.max_velocity > 0.0) {
            return Err(TuningError::NonPositive("max_velocity"));
        }
        if !(self.velocity_dampening > 0.0 && self.velocity_dampening <= 1.0) {
            return Err(TuningError::OutOfRange {
                field: "velocity_dampening",
                min: 0.0,
                max: 1.0,
            });
        }
        if self.on_ground_dampening < 0.0
            || self.drifting_velocity_dampening < 0.0
            || self.on_ground_dampening + self.drifting_velocity_dampening
                >= self.velocity_dampening
        {
            return Err(TuningError::GroundDampening);
        }
        for (field, value) in [
            ("max_drift_angle", self.max_drift_angle),
            ("max_turning_velocity", self.max_turning_velocity),
            ("body_radius", self.body_radius),
            ("alignment_probe_distance", self.alignment_probe_distance),
        ] {
            if !(value > 0.0) {
                return Err(TuningError::NonPositive(field));
            }
        }
        for (field, value) in [
            ("drifting_angle_dampening", self.drifting_angle_dampening),
            ("terrain_rotation_lerp", self.terrain_rotation_lerp),
            ("air_rotation_lerp_scale", self.air_rotation_lerp_scale),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TuningError::OutOfRange {
                    field,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        if !(0.0..90.0).contains(&self.max_terrain_angle) {
            return Err(TuningError::OutOfRange {
                field: "max_terrain_angle",
                min: 0.0,
                max: 90.0,
            });
        }
        Ok(())
    }
}

/// Tuning validation errors
#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    #[error("{0} must be positive")]
    NonPositive(&'static str),

    #[error("{field} must lie in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        min: f32,
        max: f32,
    },

    #[error("{0} must be finite and not negative")]
    Negative(&'static str),

    #[error("ground and drift dampening must leave a positive dampening factor")]
    GroundDampening,
}

/// Per-tick facts the simulator needs from the session
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    pub dt: f32,
    pub level_ended: bool,
    /// Energy per second at full throttle
    pub acceleration_energy_rate: f32,
    /// Energy per second with no throttle
    pub idle_energy_rate: f32,
}

/// What happened during one step, beyond the state change itself
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepOutcome {
    /// Normalised heading/velocity deviation in [0, 1]
    pub drift_factor: f32,
    pub skidding: bool,
    /// Speed right after the clamp and dampening stage
    pub damped_speed: f32,
    pub obstacle_hit: bool,
    /// Destructive impact; the vehicle did not move this tick
    pub destroyed: bool,
    /// Energy ran out during this tick
    pub energy_depleted: bool,
}

/// Advances one vehicle by one fixed tick
#[derive(Debug, Clone)]
pub struct VehicleSimulator {
    tuning: VehicleTuning,
    sampler: GroundSampler,
}

impl VehicleSimulator {
    pub fn new(tuning: VehicleTuning) -> Result<Self, TuningError> {
        tuning.validate()?;
        Ok(Self {
            sampler: GroundSampler::from_tuning(&tuning),
            tuning,
        })
    }

    pub fn tuning(&self) -> &VehicleTuning {
        &self.tuning
    }

    /// Count the invulnerability window down, stopping at exactly 0
    pub fn decay_invulnerability(state: &mut VehicleState, dt: f32) {
        if state.invulnerable_timer > 0.0 {
            state.invulnerable_timer = (state.invulnerable_timer - dt).max(0.0);
        }
    }

    /// Restart the invulnerability window, used when a rewind begins
    pub fn grant_invulnerability(&self, state: &mut VehicleState) {
        state.invulnerable_timer = self.tuning.invulnerable_start_time;
    }

    /// Run one tick of the integrator on `state`
    pub fn step(
        &self,
        state: &mut VehicleState,
        input: DriveInput,
        ctx: &StepContext,
        world: &impl CollisionWorld,
    ) -> StepOutcome {
        let t = &self.tuning;
        let dt = ctx.dt;
        let mut outcome = StepOutcome::default();

        Self::decay_invulnerability(state, dt);
        let ground = self.sampler.sample(&state.pose(), world);
        state.on_ground = ground.on_ground;
        let on_ground = ground.on_ground;

        // Input gating
        let controllable = state.player_controlled && !ctx.level_ended;
        let (mut forward_input, mut steer_input) = if controllable {
            (axis(input.forward).clamp(-0.5, 1.0), axis(input.steer).clamp(-1.0, 1.0))
        } else {
            (0.0, 0.0)
        };

        // Energy
        if controllable {
            if state.energy > 0.0 {
                let demand = forward_input.abs();
                let rate = if demand > INPUT_DEADZONE {
                    ctx.acceleration_energy_rate * demand
                } else {
                    ctx.idle_energy_rate
                };
                state.energy -= rate * dt;
                outcome.energy_depleted = state.energy <= 0.0;
            }
            if state.energy <= 0.0 {
                state.energy = 0.0;
                forward_input = 0.0;
                steer_input = 0.0;
            }
        }
        state.forward_input = forward_input;
        state.steer_input = steer_input;

        let heading = forward(state.rotation);
        let body_up = up(state.rotation);
        let mut velocity = state.velocity;

        if on_ground {
            velocity += heading * forward_input * t.acceleration * dt;
        }

        // Drift: heading vs. planar velocity mapped to the front of the car
        let going_forward = velocity.normalize_or_zero().dot(heading) > 0.0;
        let direction_sign = if going_forward { 1.0 } else { -1.0 };
        let drift_angle = angle_deg(
            heading,
            project_on_plane(velocity * direction_sign, body_up),
        );
        let drift = (drift_angle / t.max_drift_angle).clamp(0.0, 1.0);
        outcome.drift_factor = drift;

        // Speed clamp and dampening (air drag, ground friction, drift friction)
        velocity = velocity.clamp_length_max(t.max_velocity);
        let mut dampening = t.velocity_dampening;
        if on_ground {
            dampening -= t.on_ground_dampening;
            dampening -= t.drifting_velocity_dampening * drift;
        }
        velocity *= dampening.max(0.0);
        outcome.damped_speed = velocity.length();

        // Turning, gated by planar speed and mirrored when reversing
        let planar = project_on_plane(velocity, body_up);
        let going_forward = velocity.normalize_or_zero().dot(heading) > 0.0;
        let planar_speed = planar.length();
        if on_ground && planar_speed > NEAR_ZERO {
            let authority = (planar_speed / t.max_turning_velocity).clamp(0.0, 1.0);
            let turn_deg = authority
                * steer_input
                * t.max_drift_angle
                * if going_forward { 1.0 } else { -1.0 };
            let target = Quat::from_axis_angle(body_up, turn_deg.to_radians()) * state.rotation;
            state.rotation = state
                .rotation
                .slerp(target, t.drifting_angle_dampening)
                .normalize();
        }

        // Obstacles: straight, skewed left and skewed right
        if let Some(direction) = velocity.try_normalize() {
            let skew = right(state.rotation) * t.obstacle_probe_skew;
            let origin = state.position + Vec3::Y * OBSTACLE_PROBE_LIFT;
            let reach = t.body_radius + t.obstacle_probe_margin;
            let hit = [direction, direction - skew, direction + skew]
                .into_iter()
                .find_map(|d| world.raycast(origin, d, reach, Layer::Obstacle));

            if let Some(hit) = hit {
                outcome.obstacle_hit = true;
                let facing = direction.dot(project_on_plane(hit.normal, Vec3::Y));
                if velocity.length() > t.destroy_on_impact_velocity && facing < IMPACT_FACING_DOT {
                    state.velocity = velocity;
                    outcome.destroyed = true;
                    return outcome;
                }
                velocity = velocity.clamp_length_max(t.obstacle_hit_velocity_clamp);
            }
        }

        if on_ground {
            velocity = project_on_plane(velocity, body_up);
        }
        velocity += Vec3::NEG_Y * t.gravity * dt;

        self.align_to_terrain(state, ground);

        outcome.skidding = on_ground && drift > t.skid_threshold;
        state.skidding = outcome.skidding;
        state.velocity = velocity;
        state.position = world.move_body(state.position, velocity, t.body_radius);

        outcome
    }

    /// Retarget the body rotation to the terrain plane (or upright when
    /// airborne or flipped) and slerp toward it
    fn align_to_terrain(&self, state: &mut VehicleState, ground: GroundSample) {
        let t = &self.tuning;
        let on_ground = ground.on_ground;

        if on_ground {
            if let Some(normal) = ground.normal {
                let clamped = clamp_tilt(normal, t.max_terrain_angle);
                let projected = project_on_plane(forward(state.rotation), clamped);
                if let Some(target) = look_rotation(projected, clamped) {
                    state.target_rotation = target;
                }
            }
        }

        if !on_ground || up(state.rotation).dot(Vec3::Y) < 0.0 {
            let projected = project_on_plane(forward(state.rotation), Vec3::Y);
            if let Some(target) = look_rotation(projected, Vec3::Y) {
                state.target_rotation = target;
            }
        }

        let lerp = t.terrain_rotation_lerp * if on_ground { 1.0 } else { t.air_rotation_lerp_scale };
        state.rotation = state.rotation.slerp(state.target_rotation, lerp).normalize();
    }
}

/// Limit the pitch and roll that carry world up onto `normal`
fn clamp_tilt(normal: Vec3, max_deg: f32) -> Vec3 {
    let Some(normal) = normal.try_normalize() else {
        return Vec3::Y;
    };
    let limit = max_deg.to_radians();
    let (yaw, pitch, roll) = Quat::from_rotation_arc(Vec3::Y, normal).to_euler(EulerRot::YXZ);
    let clamped = Quat::from_euler(
        EulerRot::YXZ,
        yaw,
        pitch.clamp(-limit, limit),
        roll.clamp(-limit, limit),
    );
    clamped * Vec3::Y
}

/// Non-finite axis values read as centred
#[inline]
fn axis(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
