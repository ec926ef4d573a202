//! Tank registry queries: pure filters over the static pool plus the
//! mutable occupancy field.

use crate::{Stage, Tank, TankRegistry};

impl TankRegistry {
    pub fn new(tanks: Vec<Tank>) -> Self {
        TankRegistry { tanks }
    }

    pub fn tanks(&self) -> &[Tank] {
        &self.tanks
    }

    /// Ferment-capable tanks, in registry order. Membership is static after
    /// initialisation, so this view is computed on demand.
    pub fn fermenters(&self) -> Vec<&Tank> {
        self.tanks.iter().filter(|t| t.duty.can_ferment()).collect()
    }

    /// Condition-capable tanks, in registry order.
    pub fn conditioners(&self) -> Vec<&Tank> {
        self.tanks
            .iter()
            .filter(|t| t.duty.can_condition())
            .collect()
    }

    /// Unoccupied tanks able to host `stage` with room for `volume_litres`,
    /// in registry order. First-fit: callers take the head; there is no
    /// best-fit packing.
    pub fn available_tanks(&self, volume_litres: u32, stage: Stage) -> Vec<&Tank> {
        self.tanks
            .iter()
            .filter(|tank| {
                tank.duty.suits(stage)
                    && tank.occupant.is_none()
                    && volume_litres <= tank.capacity_litres
            })
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Tank> {
        self.tanks.iter().find(|tank| tank.name == name)
    }

    pub(crate) fn find_by_name_mut(&mut self, name: &str) -> Option<&mut Tank> {
        self.tanks.iter_mut().find(|tank| tank.name == name)
    }
}
