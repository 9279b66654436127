//! Level session and authoritative tick
//!
//! Every tick runs in a fixed order: rewind edges, bookkeeping,
//! simulate-or-replay dispatch, timeline append, then contacts,
//! destruction/promotion and the level checks.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::tick_delta;
use crate::world::{CollisionWorld, LevelDescription, LevelError, TerrainWorld, TriggerKind, TriggerVolume};

use super::events::{LevelOutcome, SessionEvent};
use super::lifecycle::VehicleLifecycleManager;
use super::physics::{StepContext, TuningError, VehicleSimulator};
use super::pool::{VehicleId, VehiclePool};
use super::rewind::{ReplayStep, RewindCoordinator, RewindEdge};
use super::vehicle::{Pose, VehicleMode, VehicleState};
use super::{DriveInput, TickInput};

/// Session rules: energy economy, rewind budget and level flow timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    /// Energy a vehicle spawns with; also the energy cap
    pub spawn_energy: f32,
    /// Energy per second at full throttle
    pub acceleration_energy_consumption: f32,
    /// Energy per second with no throttle
    pub idle_energy_consumption: f32,
    pub energy_per_collectible: f32,
    /// Forks allowed per level attempt
    pub rewind_budget: u32,
    /// Seconds without an active vehicle before the level fails
    pub no_active_grace: f32,
    /// Planar speed at or below which an empty vehicle counts as stalled
    pub stationary_speed_epsilon: f32,
    /// Seconds between confirming the end prompt and loading the next level
    pub fade_duration: f32,
    /// Ghosts keep and replay the future they abandoned
    pub fork_keeps_branch: bool,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            spawn_energy: 100.0,
            acceleration_energy_consumption: 5.0,
            idle_energy_consumption: 1.0,
            energy_per_collectible: 25.0,
            rewind_budget: 3,
            no_active_grace: 2.0,
            stationary_speed_epsilon: 0.001,
            fade_duration: 1.0,
            fork_keeps_branch: false,
        }
    }
}

impl SessionTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        for (field, value) in [
            ("spawn_energy", self.spawn_energy),
            ("acceleration_energy_consumption", self.acceleration_energy_consumption),
            ("idle_energy_consumption", self.idle_energy_consumption),
            ("energy_per_collectible", self.energy_per_collectible),
            ("no_active_grace", self.no_active_grace),
            ("stationary_speed_epsilon", self.stationary_speed_epsilon),
            ("fade_duration", self.fade_duration),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(TuningError::Negative(field));
            }
        }
        Ok(())
    }
}

/// Level flow
#[derive(Debug, Clone, PartialEq)]
pub enum LevelPhase {
    /// Normal play
    Running,
    /// Level over; waiting for the player to confirm
    AwaitingConfirm { outcome: LevelOutcome },
    /// Confirmed; counting down to the level load
    Fading { outcome: LevelOutcome, remaining: f32 },
    /// Load requested, nothing more happens
    Finished { outcome: LevelOutcome },
}

impl LevelPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn outcome(&self) -> Option<&LevelOutcome> {
        match self {
            Self::Running => None,
            Self::AwaitingConfirm { outcome }
            | Self::Fading { outcome, .. }
            | Self::Finished { outcome } => Some(outcome),
        }
    }
}

/// Something a vehicle touched this tick
#[derive(Debug, Clone, Copy, PartialEq)]
enum Contact {
    Collectible { vehicle: VehicleId, trigger: usize },
    ExitZone { vehicle: VehicleId },
    RivalVehicle { a: VehicleId, b: VehicleId },
}

/// Session construction errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Level(#[from] LevelError),

    #[error("Invalid vehicle tuning: {0}")]
    Tuning(#[from] TuningError),

    #[error("Invalid session tuning: {0}")]
    Rules(TuningError),
}

/// One attempt at a level (owned by the tick driver)
pub struct GameSession<W = TerrainWorld> {
    id: Uuid,
    level: LevelDescription,
    world: W,
    tuning: SessionTuning,
    simulator: VehicleSimulator,
    pool: VehiclePool,
    lifecycle: VehicleLifecycleManager,
    rewind: RewindCoordinator,
    /// Level triggers; taken collectibles become `None`
    triggers: Vec<Option<TriggerVolume>>,
    collectibles_left: usize,
    phase: LevelPhase,
    /// Counts down while nothing is active
    no_active_timer: Option<f32>,
    confirm_held: bool,
    tick: u64,
}

impl GameSession<TerrainWorld> {
    /// Build the level's own collision world and start a session on it
    pub fn from_level(level: LevelDescription) -> Result<Self, SessionError> {
        let world = level.build_world()?;
        Self::new(level, world)
    }
}

impl<W: CollisionWorld> GameSession<W> {
    pub fn new(level: LevelDescription, world: W) -> Result<Self, SessionError> {
        let simulator = VehicleSimulator::new(level.vehicle_tuning.unwrap_or_default())?;
        let tuning = level.session_tuning.clone().unwrap_or_default();
        tuning.validate().map_err(SessionError::Rules)?;

        let mut session = Self {
            id: Uuid::new_v4(),
            world,
            simulator,
            pool: VehiclePool::new(),
            lifecycle: VehicleLifecycleManager::new(),
            rewind: RewindCoordinator::new(tuning.rewind_budget, tuning.fork_keeps_branch),
            triggers: Vec::new(),
            collectibles_left: 0,
            phase: LevelPhase::Running,
            no_active_timer: None,
            confirm_held: false,
            tick: 0,
            tuning,
            level,
        };
        session.restart();
        Ok(session)
    }

    /// Throw away all vehicles and history and spawn afresh at the level start
    pub fn restart(&mut self) -> Vec<SessionEvent> {
        self.pool.clear();
        self.lifecycle.clear();
        self.rewind.reset();
        self.triggers = self.level.triggers.iter().cloned().map(Some).collect();
        self.collectibles_left = self.level.collectible_count();
        self.phase = LevelPhase::Running;
        self.no_active_timer = None;
        self.confirm_held = false;
        self.tick = 0;

        info!(
            session_id = %self.id,
            level = %self.level.name,
            collectibles = self.collectibles_left,
            rewinds = self.tuning.rewind_budget,
            "Level started"
        );

        let pose = Pose::new(self.level.spawn_position, self.level.spawn_yaw_deg);
        self.lifecycle.spawn(
            &mut self.pool,
            pose,
            self.tuning.spawn_energy,
            self.simulator.tuning().invulnerable_start_time,
        )
    }

    /// Advance the session by one fixed tick
    pub fn tick(&mut self, input: TickInput) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let dt = tick_delta();
        self.tick += 1;

        let edge = self.rewind.detect(input.rewind_held);
        let confirmed = input.confirm && !self.confirm_held;
        self.confirm_held = input.confirm;

        match self.phase.clone() {
            LevelPhase::Running => self.run_tick(input, edge, dt, &mut events),
            LevelPhase::AwaitingConfirm { outcome } => {
                self.coast(&mut events);
                if confirmed {
                    debug!(session_id = %self.id, "End of level confirmed");
                    self.phase = LevelPhase::Fading {
                        outcome,
                        remaining: self.tuning.fade_duration,
                    };
                }
            }
            LevelPhase::Fading { outcome, remaining } => {
                self.coast(&mut events);
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    let level = match &outcome {
                        LevelOutcome::Success { next_level } => next_level.clone(),
                        _ => self.level.name.clone(),
                    };
                    info!(session_id = %self.id, level = %level, "Loading level");
                    events.push(SessionEvent::LoadLevel { level });
                    self.phase = LevelPhase::Finished { outcome };
                } else {
                    self.phase = LevelPhase::Fading { outcome, remaining };
                }
            }
            LevelPhase::Finished { .. } => {}
        }

        events
    }

    fn run_tick(
        &mut self,
        input: TickInput,
        edge: Option<RewindEdge>,
        dt: f32,
        events: &mut Vec<SessionEvent>,
    ) {
        // 1. Rewind edges
        match edge {
            Some(RewindEdge::Start) => {
                events.extend(self.rewind.begin(&mut self.pool, &self.lifecycle, &self.simulator));
            }
            Some(RewindEdge::Stop) => {
                events.extend(self.rewind.release(
                    &mut self.pool,
                    &mut self.lifecycle,
                    &self.simulator,
                ));
            }
            None => {}
        }

        // 2. Bookkeeping
        let rewinding = self.rewind.rewinding();
        if !rewinding {
            for vehicle in self.pool.iter_mut() {
                if vehicle.mode == VehicleMode::Replaying {
                    VehicleSimulator::decay_invulnerability(vehicle, dt);
                }
            }
            if let Some(timer) = self.no_active_timer.as_mut() {
                *timer -= dt;
                if *timer <= 0.0 {
                    self.end_level(LevelOutcome::FailTimeline, events);
                    return;
                }
            }
        }

        // 3. Simulate or replay
        let mut simulated = Vec::new();
        let mut wrecked = Vec::new();
        if rewinding {
            self.rewind.walk_back(&mut self.pool);
        } else {
            let ctx = self.step_context(false);
            for id in self.pool.live_ids() {
                let Some(vehicle) = self.pool.get_mut(id) else {
                    continue;
                };
                if vehicle.mode == VehicleMode::Replaying {
                    match RewindCoordinator::replay(vehicle) {
                        ReplayStep::Applied => continue,
                        ReplayStep::ReachedTail => {
                            debug!(vehicle = %id, "Replay reached the tail, recording");
                            vehicle.mode = VehicleMode::Recording;
                        }
                    }
                }

                let drive = if vehicle.player_controlled {
                    input.drive
                } else {
                    DriveInput::default()
                };
                let outcome = self.simulator.step(vehicle, drive, &ctx, &self.world);
                if outcome.energy_depleted {
                    info!(vehicle = %id, "Energy depleted");
                    events.push(SessionEvent::EnergyDepleted { vehicle: id });
                }
                if outcome.destroyed {
                    wrecked.push(id);
                } else {
                    simulated.push(id);
                }
            }
        }

        // 4. Timeline append
        for &id in &simulated {
            if let Some(vehicle) = self.pool.get_mut(id) {
                vehicle.record();
            }
        }

        // 5. Contacts, destruction and level checks
        if !rewinding {
            for contact in self.find_contacts(&wrecked) {
                self.resolve_contact(contact, &mut wrecked, events);
                if !self.phase.is_running() {
                    break;
                }
            }
        }

        for id in wrecked {
            events.extend(self.lifecycle.destroy(&mut self.pool, id));
        }

        match (self.lifecycle.active(), self.no_active_timer) {
            (Some(_), _) => self.no_active_timer = None,
            (None, None) if self.phase.is_running() => {
                info!(
                    session_id = %self.id,
                    grace = self.tuning.no_active_grace,
                    "No vehicle left, failure countdown started"
                );
                self.no_active_timer = Some(self.tuning.no_active_grace);
            }
            _ => {}
        }

        if self.phase.is_running() && !self.rewind.rewinding() && self.active_is_stalled() {
            self.end_level(LevelOutcome::FailFuel, events);
        }
    }

    /// Collect trigger and vehicle contacts among live, intact vehicles
    fn find_contacts(&self, wrecked: &[VehicleId]) -> Vec<Contact> {
        let bodies: Vec<(VehicleId, Vec3)> = self
            .pool
            .iter()
            .filter(|v| !v.destroyed && !wrecked.contains(&v.id))
            .map(|v| (v.id, v.position))
            .collect();
        let radius = self.simulator.tuning().body_radius;
        let mut contacts = Vec::new();
        let mut exits = Vec::new();

        for &(vehicle, position) in &bodies {
            for (trigger, volume) in self.triggers.iter().enumerate() {
                let Some(volume) = volume else {
                    continue;
                };
                if !volume.touches(position, radius) {
                    continue;
                }
                match volume.kind {
                    TriggerKind::Collectible => {
                        contacts.push(Contact::Collectible { vehicle, trigger });
                    }
                    TriggerKind::ExitZone => exits.push(Contact::ExitZone { vehicle }),
                }
            }
        }
        // Pickups land first so an exit touched the same tick sees them
        contacts.append(&mut exits);

        let reach = 2.0 * radius;
        for (i, &(a, pa)) in bodies.iter().enumerate() {
            for &(b, pb) in &bodies[i + 1..] {
                if pa.distance_squared(pb) < reach * reach {
                    contacts.push(Contact::RivalVehicle { a, b });
                }
            }
        }

        contacts
    }

    fn resolve_contact(
        &mut self,
        contact: Contact,
        wrecked: &mut Vec<VehicleId>,
        events: &mut Vec<SessionEvent>,
    ) {
        match contact {
            Contact::Collectible { vehicle, trigger } => {
                if self.triggers.get_mut(trigger).and_then(Option::take).is_none() {
                    return;
                }
                self.collectibles_left = self.collectibles_left.saturating_sub(1);
                let cap = self.tuning.spawn_energy;
                let bonus = self.tuning.energy_per_collectible;
                if let Some(state) = self.pool.get_mut(vehicle) {
                    state.energy = (state.energy + bonus).clamp(0.0, cap);
                }
                info!(vehicle = %vehicle, remaining = self.collectibles_left, "Collectible taken");
                events.push(SessionEvent::CollectibleTaken {
                    vehicle,
                    remaining: self.collectibles_left,
                });
            }
            Contact::ExitZone { vehicle } => {
                if self.collectibles_left > 0 {
                    return;
                }
                debug!(vehicle = %vehicle, "Exit reached");
                let next_level = self.level.next_level.clone();
                self.end_level(LevelOutcome::Success { next_level }, events);
            }
            Contact::RivalVehicle { a, b } => {
                for victim in self.lifecycle.contact_victims(&self.pool, a, b) {
                    if !wrecked.contains(&victim) {
                        wrecked.push(victim);
                    }
                }
            }
        }
    }

    /// Active vehicle recording with an empty tank and no planar motion
    fn active_is_stalled(&self) -> bool {
        self.active_vehicle().is_some_and(|v| {
            let planar = Vec3::new(v.velocity.x, 0.0, v.velocity.z);
            v.mode == VehicleMode::Recording
                && v.energy <= 0.0
                && planar.length() <= self.tuning.stationary_speed_epsilon
        })
    }

    /// Stop play: cancel any rewind and wait for confirmation
    fn end_level(&mut self, outcome: LevelOutcome, events: &mut Vec<SessionEvent>) {
        events.extend(self.rewind.cancel(&mut self.pool));
        info!(session_id = %self.id, tick = self.tick, outcome = ?outcome, "Level ended");
        events.push(SessionEvent::LevelEnded {
            outcome: outcome.clone(),
        });
        self.no_active_timer = None;
        self.phase = LevelPhase::AwaitingConfirm { outcome };
    }

    /// After the level ends vehicles keep moving under physics only
    fn coast(&mut self, events: &mut Vec<SessionEvent>) {
        let ctx = self.step_context(true);
        let mut wrecked = Vec::new();
        for id in self.pool.live_ids() {
            if let Some(vehicle) = self.pool.get_mut(id) {
                let outcome = self
                    .simulator
                    .step(vehicle, DriveInput::default(), &ctx, &self.world);
                if outcome.destroyed {
                    wrecked.push(id);
                }
            }
        }
        for id in wrecked {
            events.extend(self.lifecycle.destroy(&mut self.pool, id));
        }
    }

    fn step_context(&self, level_ended: bool) -> StepContext {
        StepContext {
            dt: tick_delta(),
            level_ended,
            acceleration_energy_rate: self.tuning.acceleration_energy_consumption,
            idle_energy_rate: self.tuning.idle_energy_consumption,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> &LevelPhase {
        &self.phase
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn level(&self) -> &LevelDescription {
        &self.level
    }

    pub fn tuning(&self) -> &SessionTuning {
        &self.tuning
    }

    pub fn active_id(&self) -> Option<VehicleId> {
        self.lifecycle.active()
    }

    pub fn active_vehicle(&self) -> Option<&VehicleState> {
        self.lifecycle.active().and_then(|id| self.pool.get(id))
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&VehicleState> {
        self.pool.get(id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleState> {
        self.pool.iter()
    }

    pub fn is_rewinding(&self) -> bool {
        self.rewind.rewinding()
    }

    pub fn rewinds_remaining(&self) -> u32 {
        self.rewind.remaining()
    }

    pub fn rewinds_used(&self) -> u32 {
        self.rewind.used()
    }

    pub fn collectibles_left(&self) -> usize {
        self.collectibles_left
    }

    /// Vehicles activated during this attempt
    pub fn vehicles_spawned(&self) -> usize {
        self.lifecycle.history().len()
    }
}
