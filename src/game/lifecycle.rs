//! Active vehicle tracking, activation history and promotion on destruction

use tracing::{debug, info};

use super::events::SessionEvent;
use super::pool::{VehicleId, VehiclePool};
use super::vehicle::Pose;

/// Owns the single active-vehicle reference and the activation history
#[derive(Debug, Default)]
pub struct VehicleLifecycleManager {
    active: Option<VehicleId>,
    /// Every vehicle ever activated this attempt, oldest first
    history: Vec<VehicleId>,
}

impl VehicleLifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<VehicleId> {
        self.active
    }

    pub fn history(&self) -> &[VehicleId] {
        &self.history
    }

    pub fn is_active(&self, id: VehicleId) -> bool {
        self.active == Some(id)
    }

    /// Take a vehicle from the pool and activate it at `pose`
    pub fn spawn(
        &mut self,
        pool: &mut VehiclePool,
        pose: Pose,
        energy: f32,
        invulnerable_time: f32,
    ) -> Vec<SessionEvent> {
        let id = pool.acquire();
        self.activate(pool, id, pose, energy, invulnerable_time)
    }

    /// Reset `id`, hand it to the player and append it to the history
    pub fn activate(
        &mut self,
        pool: &mut VehiclePool,
        id: VehicleId,
        pose: Pose,
        energy: f32,
        invulnerable_time: f32,
    ) -> Vec<SessionEvent> {
        if let Some(previous) = self.active.and_then(|prev| pool.get_mut(prev)) {
            previous.player_controlled = false;
        }

        pool.reset(id, pose, energy, invulnerable_time);
        let Some(vehicle) = pool.get_mut(id) else {
            return Vec::new();
        };
        vehicle.player_controlled = true;

        self.active = Some(id);
        self.history.push(id);
        info!(vehicle = %id, history = self.history.len(), "Vehicle activated");

        vec![
            SessionEvent::VehicleActivated { vehicle: id },
            SessionEvent::CameraRetarget { vehicle: id },
        ]
    }

    /// Mark destroyed, request the explosion and return the vehicle to the
    /// pool. Destroying the active vehicle promotes another one.
    pub fn destroy(&mut self, pool: &mut VehiclePool, id: VehicleId) -> Vec<SessionEvent> {
        let Some(vehicle) = pool.get_mut(id) else {
            return Vec::new();
        };
        vehicle.destroyed = true;
        vehicle.player_controlled = false;
        let position = vehicle.position;
        pool.release(id);

        info!(vehicle = %id, x = position.x, y = position.y, z = position.z, "Vehicle destroyed");

        let mut events = vec![
            SessionEvent::VehicleDestroyed {
                vehicle: id,
                position,
            },
            SessionEvent::ExplosionRequested { position },
        ];

        if self.active == Some(id) {
            events.extend(self.promote_next(pool));
        }
        events
    }

    /// Hand control to the most recently activated vehicle that is still
    /// alive. Leaves the active reference empty when there is none.
    pub fn promote_next(&mut self, pool: &mut VehiclePool) -> Vec<SessionEvent> {
        let candidate = self
            .history
            .iter()
            .rev()
            .copied()
            .find(|&id| pool.get(id).is_some_and(|v| !v.destroyed));

        self.active = candidate;
        match candidate.and_then(|id| pool.get_mut(id)) {
            Some(vehicle) => {
                vehicle.player_controlled = true;
                info!(vehicle = %vehicle.id, "Promoted vehicle to active");
                vec![SessionEvent::CameraRetarget {
                    vehicle: vehicle.id,
                }]
            }
            None => {
                info!("No vehicle left to promote");
                Vec::new()
            }
        }
    }

    /// Vehicles destroyed by a contact between `a` and `b`.
    ///
    /// Each side acts on the other: a vulnerable actor destroys the other
    /// vehicle unless it is invulnerable or currently active.
    pub fn contact_victims(&self, pool: &VehiclePool, a: VehicleId, b: VehicleId) -> Vec<VehicleId> {
        let mut victims = Vec::new();
        for (actor, other) in [(a, b), (b, a)] {
            let (Some(actor_state), Some(other_state)) = (pool.get(actor), pool.get(other)) else {
                continue;
            };
            if actor_state.invulnerable() || other_state.invulnerable() {
                continue;
            }
            if self.is_active(other) {
                continue;
            }
            debug!(actor = %actor, victim = %other, "Vehicle contact is destructive");
            victims.push(other);
        }
        victims
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn spawn(manager: &mut VehicleLifecycleManager, pool: &mut VehiclePool) -> VehicleId {
        manager.spawn(pool, Pose::new(Vec3::ZERO, 0.0), 100.0, 0.0);
        manager.active().unwrap()
    }

    #[test]
    fn activation_hands_over_control() {
        let mut pool = VehiclePool::new();
        let mut manager = VehicleLifecycleManager::new();
        let a = spawn(&mut manager, &mut pool);
        let b = spawn(&mut manager, &mut pool);

        assert_eq!(manager.active(), Some(b));
        assert_eq!(manager.history(), &[a, b]);
        assert!(!pool.get(a).unwrap().player_controlled);
        assert!(pool.get(b).unwrap().player_controlled);
    }

    #[test]
    fn destroying_active_promotes_latest_survivor() {
        let mut pool = VehiclePool::new();
        let mut manager = VehicleLifecycleManager::new();
        let a = spawn(&mut manager, &mut pool);
        let b = spawn(&mut manager, &mut pool);
        let c = spawn(&mut manager, &mut pool);

        manager.destroy(&mut pool, b);
        assert_eq!(manager.active(), Some(c));

        let events = manager.destroy(&mut pool, c);
        assert_eq!(manager.active(), Some(a));
        assert!(pool.get(a).unwrap().player_controlled);
        assert!(events.contains(&SessionEvent::CameraRetarget { vehicle: a }));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::ExplosionRequested { .. })));
    }

    #[test]
    fn nobody_left_empties_active() {
        let mut pool = VehiclePool::new();
        let mut manager = VehicleLifecycleManager::new();
        let a = spawn(&mut manager, &mut pool);
        let b = spawn(&mut manager, &mut pool);
        let c = spawn(&mut manager, &mut pool);

        manager.destroy(&mut pool, a);
        manager.destroy(&mut pool, b);
        assert_eq!(manager.active(), Some(c));

        manager.destroy(&mut pool, c);
        assert_eq!(manager.active(), None);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn recycled_slots_are_not_promoted() {
        let mut pool = VehiclePool::new();
        let mut manager = VehicleLifecycleManager::new();
        let a = spawn(&mut manager, &mut pool);
        let b = spawn(&mut manager, &mut pool);
        manager.destroy(&mut pool, a);

        // Slot of `a` goes to an unrelated vehicle
        let stranger = pool.acquire();
        assert_ne!(stranger, a);
        assert!(!pool.is_live(a));

        manager.destroy(&mut pool, b);
        assert_eq!(manager.active(), None);
    }

    #[test]
    fn contact_spares_active_and_invulnerable_vehicles() {
        let mut pool = VehiclePool::new();
        let mut manager = VehicleLifecycleManager::new();
        let ghost = spawn(&mut manager, &mut pool);
        let active = spawn(&mut manager, &mut pool);

        assert_eq!(manager.contact_victims(&pool, active, ghost), vec![ghost]);
        assert_eq!(manager.contact_victims(&pool, ghost, active), vec![ghost]);

        pool.get_mut(ghost).unwrap().invulnerable_timer = 0.5;
        assert!(manager.contact_victims(&pool, active, ghost).is_empty());

        pool.get_mut(ghost).unwrap().invulnerable_timer = 0.0;
        pool.get_mut(active).unwrap().invulnerable_timer = 0.5;
        assert!(manager.contact_victims(&pool, active, ghost).is_empty());
    }

    #[test]
    fn two_vulnerable_ghosts_destroy_each_other() {
        let mut pool = VehiclePool::new();
        let mut manager = VehicleLifecycleManager::new();
        let g1 = spawn(&mut manager, &mut pool);
        let g2 = spawn(&mut manager, &mut pool);
        spawn(&mut manager, &mut pool);

        assert_eq!(manager.contact_victims(&pool, g1, g2), vec![g2, g1]);
    }
}
