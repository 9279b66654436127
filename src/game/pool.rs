//! Vehicle pool keyed by generational handles

use std::fmt;

use slotmap::{new_key_type, Key, SlotMap};

use super::vehicle::{Pose, VehicleState};

new_key_type! {
    /// Handle to a pooled vehicle. A removed vehicle's handle never aliases
    /// the vehicle that later reuses its slot.
    pub struct VehicleId;
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.data())
    }
}

/// Reusable storage for vehicles
#[derive(Default)]
pub struct VehiclePool {
    vehicles: SlotMap<VehicleId, VehicleState>,
}

impl VehiclePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh vehicle, reusing a free slot when there is one
    pub fn acquire(&mut self) -> VehicleId {
        self.vehicles.insert_with_key(VehicleState::new)
    }

    /// Deactivate a vehicle. Stale handles are ignored.
    pub fn release(&mut self, id: VehicleId) {
        self.vehicles.remove(id);
    }

    pub fn reset(&mut self, id: VehicleId, pose: Pose, energy: f32, invulnerable_time: f32) {
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            vehicle.reset(pose, energy, invulnerable_time);
        }
    }

    /// Deactivate every vehicle
    pub fn clear(&mut self) {
        self.vehicles.clear();
    }

    pub fn is_live(&self, id: VehicleId) -> bool {
        self.vehicles.contains_key(id)
    }

    pub fn get(&self, id: VehicleId) -> Option<&VehicleState> {
        self.vehicles.get(id)
    }

    pub fn get_mut(&mut self, id: VehicleId) -> Option<&mut VehicleState> {
        self.vehicles.get_mut(id)
    }

    /// Handles of all vehicles currently handed out, in slot order
    pub fn live_ids(&self) -> Vec<VehicleId> {
        self.vehicles.keys().collect()
    }

    pub fn live_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VehicleState> {
        self.vehicles.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut VehicleState> {
        self.vehicles.values_mut()
    }
}
