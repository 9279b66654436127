//! Global rewind state: edge detection, budget, cursor walking and forking

use tracing::{debug, info, warn};

use super::events::SessionEvent;
use super::lifecycle::VehicleLifecycleManager;
use super::physics::VehicleSimulator;
use super::pool::{VehicleId, VehiclePool};
use super::vehicle::{VehicleMode, VehicleState};

/// Edge derived from the rewind button level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindEdge {
    Start,
    Stop,
}

/// Result of advancing a replaying vehicle by one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStep {
    /// A stored snapshot was applied
    Applied,
    /// Nothing left to replay; the caller decides how the vehicle continues
    ReachedTail,
}

/// Drives rewinding and replaying across all vehicles
#[derive(Debug)]
pub struct RewindCoordinator {
    budget: u32,
    remaining: u32,
    rewinding: bool,
    was_held: bool,
    /// Vehicle whose timeline gets forked on release
    rewound: Option<VehicleId>,
    /// Clone keeps the abandoned future instead of just the prefix
    keep_branch: bool,
}

impl RewindCoordinator {
    pub fn new(budget: u32, keep_branch: bool) -> Self {
        Self {
            budget,
            remaining: budget,
            rewinding: false,
            was_held: false,
            rewound: None,
            keep_branch,
        }
    }

    pub fn rewinding(&self) -> bool {
        self.rewinding
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn used(&self) -> u32 {
        self.budget - self.remaining
    }

    /// Turn the button level into start/stop edges
    pub fn detect(&mut self, held: bool) -> Option<RewindEdge> {
        let edge = match (self.was_held, held) {
            (false, true) => Some(RewindEdge::Start),
            (true, false) => Some(RewindEdge::Stop),
            _ => None,
        };
        self.was_held = held;
        edge
    }

    /// Start rewinding the active vehicle. Ignored when the budget is spent,
    /// nothing is active, or there is no recorded history yet.
    pub fn begin(
        &mut self,
        pool: &mut VehiclePool,
        lifecycle: &VehicleLifecycleManager,
        sim: &VehicleSimulator,
    ) -> Vec<SessionEvent> {
        if self.rewinding {
            return Vec::new();
        }
        if self.remaining == 0 {
            debug!("Rewind requested with no budget left");
            return Vec::new();
        }
        let Some(active) = lifecycle.active() else {
            return Vec::new();
        };
        if pool.get(active).map_or(true, |v| v.timeline.is_empty()) {
            return Vec::new();
        }

        for id in pool.live_ids() {
            if let Some(vehicle) = pool.get_mut(id) {
                vehicle.mode = VehicleMode::Rewinding;
                sim.grant_invulnerability(vehicle);
                if id == active {
                    vehicle.player_controlled = false;
                }
            }
        }

        self.rewinding = true;
        self.rewound = Some(active);
        info!(vehicle = %active, remaining = self.remaining, "Rewind started");
        vec![SessionEvent::RewindStarted { vehicle: active }]
    }

    /// Step every rewinding vehicle one entry toward its head. Vehicles
    /// already at the head hold their state.
    pub fn walk_back(&self, pool: &mut VehiclePool) {
        for id in pool.live_ids() {
            if let Some(vehicle) = pool.get_mut(id) {
                if vehicle.mode == VehicleMode::Rewinding {
                    if let Some(snapshot) = vehicle.timeline.step_back() {
                        vehicle.apply(&snapshot);
                    }
                }
            }
        }
    }

    /// Advance a replaying vehicle one entry toward its tail
    pub fn replay(vehicle: &mut VehicleState) -> ReplayStep {
        match vehicle.timeline.step_forward() {
            Some(snapshot) => {
                vehicle.apply(&snapshot);
                ReplayStep::Applied
            }
            None => ReplayStep::ReachedTail,
        }
    }

    /// Finish a rewind by forking the rewound vehicle's timeline.
    ///
    /// The rewound vehicle keeps the frozen clone and replays it as a ghost;
    /// a fresh vehicle takes over at the rewind point with the truncated
    /// original and becomes active. The whole fork happens within this call.
    pub fn release(
        &mut self,
        pool: &mut VehiclePool,
        lifecycle: &mut VehicleLifecycleManager,
        sim: &VehicleSimulator,
    ) -> Vec<SessionEvent> {
        if !self.rewinding {
            return Vec::new();
        }
        self.rewinding = false;
        let rewound = self.rewound.take();
        Self::resume_replay(pool);

        let Some(ghost_id) = rewound else {
            return Vec::new();
        };
        let Some(ghost) = pool.get_mut(ghost_id) else {
            warn!(vehicle = %ghost_id, "Rewound vehicle vanished before release");
            return Vec::new();
        };

        let mut timeline = std::mem::take(&mut ghost.timeline);
        ghost.timeline = if self.keep_branch {
            timeline.cut_keeping_branch()
        } else {
            timeline.cut()
        };
        ghost.mode = VehicleMode::Replaying;
        ghost.player_controlled = false;
        let fork_point = ghost.capture();
        let pose = ghost.pose();

        let new_id = pool.acquire();
        let mut events = lifecycle.activate(
            pool,
            new_id,
            pose,
            fork_point.energy,
            sim.tuning().invulnerable_start_time,
        );
        if let Some(active) = pool.get_mut(new_id) {
            active.apply(&fork_point);
            active.timeline = timeline;
            active.mode = VehicleMode::Recording;
        }

        self.remaining = self.remaining.saturating_sub(1);
        info!(
            ghost = %ghost_id,
            active = %new_id,
            remaining = self.remaining,
            "Rewind released, timeline forked"
        );
        events.push(SessionEvent::RewindReleased {
            ghost: ghost_id,
            active: new_id,
            remaining: self.remaining,
        });
        events
    }

    /// Abort a rewind without forking; the rewound vehicle stays in charge
    pub fn cancel(&mut self, pool: &mut VehiclePool) -> Vec<SessionEvent> {
        if !self.rewinding {
            return Vec::new();
        }
        self.rewinding = false;
        Self::resume_replay(pool);
        if let Some(vehicle) = self.rewound.take().and_then(|id| pool.get_mut(id)) {
            vehicle.timeline.truncate_after_cursor();
            vehicle.mode = VehicleMode::Recording;
            vehicle.player_controlled = true;
        }
        info!("Rewind cancelled");
        vec![SessionEvent::RewindCancelled]
    }

    /// Back to a full budget with no rewind in progress
    pub fn reset(&mut self) {
        self.remaining = self.budget;
        self.rewinding = false;
        self.was_held = false;
        self.rewound = None;
    }

    fn resume_replay(pool: &mut VehiclePool) {
        for id in pool.live_ids() {
            if let Some(vehicle) = pool.get_mut(id) {
                if vehicle.mode == VehicleMode::Rewinding {
                    vehicle.mode = VehicleMode::Replaying;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::VehicleTuning;
    use crate::game::vehicle::Pose;
    use glam::Vec3;

    struct Rig {
        pool: VehiclePool,
        lifecycle: VehicleLifecycleManager,
        sim: VehicleSimulator,
        rewind: RewindCoordinator,
        first: VehicleId,
    }

    /// One active vehicle with `ticks` recorded snapshots moving along +x
    fn rig(ticks: usize, budget: u32, keep_branch: bool) -> Rig {
        let mut pool = VehiclePool::new();
        let mut lifecycle = VehicleLifecycleManager::new();
        lifecycle.spawn(&mut pool, Pose::new(Vec3::ZERO, 0.0), 100.0, 0.0);
        let first = lifecycle.active().unwrap();
        let vehicle = pool.get_mut(first).unwrap();
        for i in 0..ticks {
            vehicle.position = Vec3::new(i as f32, 0.0, 0.0);
            vehicle.record();
        }
        Rig {
            pool,
            lifecycle,
            sim: VehicleSimulator::new(VehicleTuning::default()).unwrap(),
            rewind: RewindCoordinator::new(budget, keep_branch),
            first,
        }
    }

    #[test]
    fn edges_follow_button_level() {
        let mut rewind = RewindCoordinator::new(1, false);
        assert_eq!(rewind.detect(false), None);
        assert_eq!(rewind.detect(true), Some(RewindEdge::Start));
        assert_eq!(rewind.detect(true), None);
        assert_eq!(rewind.detect(false), Some(RewindEdge::Stop));
        assert_eq!(rewind.detect(false), None);
    }

    #[test]
    fn rewinding_walks_back_and_holds_at_head() {
        let mut r = rig(3, 1, false);
        r.rewind.begin(&mut r.pool, &r.lifecycle, &r.sim);
        assert!(r.rewind.rewinding());
        assert!(!r.pool.get(r.first).unwrap().player_controlled);

        for expected in [1.0, 0.0, 0.0, 0.0] {
            r.rewind.walk_back(&mut r.pool);
            assert_eq!(r.pool.get(r.first).unwrap().position.x, expected);
        }
    }

    #[test]
    fn release_forks_into_ghost_and_new_active() {
        let mut r = rig(5, 2, false);
        r.rewind.begin(&mut r.pool, &r.lifecycle, &r.sim);
        r.rewind.walk_back(&mut r.pool);
        r.rewind.walk_back(&mut r.pool);
        let events = r.rewind.release(&mut r.pool, &mut r.lifecycle, &r.sim);

        let active = r.lifecycle.active().unwrap();
        assert_ne!(active, r.first);
        assert!(events.contains(&SessionEvent::RewindReleased {
            ghost: r.first,
            active,
            remaining: 1,
        }));

        let ghost = r.pool.get(r.first).unwrap();
        assert_eq!(ghost.mode, VehicleMode::Replaying);
        assert!(!ghost.player_controlled);
        assert_eq!(ghost.timeline.len(), 3);
        assert_eq!(ghost.timeline.cursor(), Some(2));
        assert!(ghost.invulnerable());

        let new = r.pool.get(active).unwrap();
        assert_eq!(new.mode, VehicleMode::Recording);
        assert!(new.player_controlled);
        assert_eq!(new.position, ghost.position);
        assert_eq!(new.timeline.snapshots(), ghost.timeline.snapshots());
        assert!(new.timeline.at_tail());
    }

    #[test]
    fn keeping_the_branch_lets_the_ghost_replay_its_future() {
        let mut r = rig(5, 1, true);
        r.rewind.begin(&mut r.pool, &r.lifecycle, &r.sim);
        r.rewind.walk_back(&mut r.pool);
        r.rewind.walk_back(&mut r.pool);
        r.rewind.release(&mut r.pool, &mut r.lifecycle, &r.sim);

        let ghost = r.pool.get_mut(r.first).unwrap();
        assert_eq!(ghost.timeline.len(), 5);
        assert_eq!(RewindCoordinator::replay(ghost), ReplayStep::Applied);
        assert_eq!(ghost.position.x, 3.0);
        assert_eq!(RewindCoordinator::replay(ghost), ReplayStep::Applied);
        assert_eq!(RewindCoordinator::replay(ghost), ReplayStep::ReachedTail);
        assert_eq!(ghost.position.x, 4.0);

        let active = r.lifecycle.active().unwrap();
        assert_eq!(r.pool.get(active).unwrap().timeline.len(), 3);
    }

    #[test]
    fn budget_blocks_rewinds_once_spent() {
        let mut r = rig(4, 1, false);
        r.rewind.begin(&mut r.pool, &r.lifecycle, &r.sim);
        r.rewind.release(&mut r.pool, &mut r.lifecycle, &r.sim);
        assert_eq!(r.rewind.remaining(), 0);
        assert_eq!(r.rewind.used(), 1);

        assert!(r.rewind.begin(&mut r.pool, &r.lifecycle, &r.sim).is_empty());
        assert!(!r.rewind.rewinding());
        assert!(r.rewind.release(&mut r.pool, &mut r.lifecycle, &r.sim).is_empty());
        assert_eq!(r.pool.live_count(), 2);
    }

    #[test]
    fn no_history_means_no_rewind() {
        let mut r = rig(0, 3, false);
        assert!(r.rewind.begin(&mut r.pool, &r.lifecycle, &r.sim).is_empty());
        assert!(!r.rewind.rewinding());
    }

    #[test]
    fn cancel_restores_control_without_forking() {
        let mut r = rig(4, 2, false);
        r.rewind.begin(&mut r.pool, &r.lifecycle, &r.sim);
        r.rewind.walk_back(&mut r.pool);
        let events = r.rewind.cancel(&mut r.pool);

        assert_eq!(events, vec![SessionEvent::RewindCancelled]);
        assert_eq!(r.rewind.remaining(), 2);
        assert_eq!(r.pool.live_count(), 1);
        let vehicle = r.pool.get(r.first).unwrap();
        assert!(vehicle.player_controlled);
        assert_eq!(vehicle.mode, VehicleMode::Recording);
        // Future beyond the rewound point is gone
        assert_eq!(vehicle.timeline.len(), 3);
        assert!(vehicle.timeline.at_tail());
        assert_eq!(vehicle.position, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn rewind_start_restarts_invulnerability_for_everyone() {
        let mut r = rig(4, 2, false);
        r.pool.get_mut(r.first).unwrap().invulnerable_timer = 0.0;
        r.rewind.begin(&mut r.pool, &r.lifecycle, &r.sim);
        assert_eq!(
            r.pool.get(r.first).unwrap().invulnerable_timer,
            r.sim.tuning().invulnerable_start_time
        );
    }
}
