//! Ships and planets.

use serde::{Deserialize, Serialize};

use crate::core::config::GameConstants;
use crate::core::types::{EntityIndex, PlayerId};
use crate::geom::{Location, Velocity};

/// Docking state machine of a ship.
///
/// `Undocked -> Docking -> Docked -> Undocking -> Undocked`, each transition
/// taking `dock_turns` turns. Any state other than `Undocked` pins the ship
/// in place with zero velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DockingStatus {
    Undocked,
    Docking,
    Docked,
    Undocking,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ship {
    pub location: Location,
    pub velocity: Velocity,
    pub health: u16,
    pub radius: f64,
    pub weapon_cooldown: u32,
    pub docking_status: DockingStatus,
    pub docking_progress: u32,
    pub docked_planet: EntityIndex,
}

impl Ship {
    pub fn new(location: Location, constants: &GameConstants) -> Self {
        Self {
            location,
            velocity: Velocity::default(),
            health: constants.max_ship_health,
            radius: constants.ship_radius,
            weapon_cooldown: 0,
            docking_status: DockingStatus::Undocked,
            docking_progress: 0,
            docked_planet: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn heal(&mut self, amount: u16, max_health: u16) {
        self.health = self.health.saturating_add(amount).min(max_health);
    }

    /// Whether the ship is close enough to dock at `planet`.
    pub fn can_dock(&self, planet: &Planet, constants: &GameConstants) -> bool {
        self.location.distance(&planet.location) <= planet.radius + constants.dock_radius
    }

    pub fn reset_docking_status(&mut self) {
        self.docking_status = DockingStatus::Undocked;
        self.docking_progress = 0;
        self.docked_planet = 0;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Planet {
    pub location: Location,
    pub radius: f64,
    pub docking_spots: u32,
    pub health: u16,
    pub owned: bool,
    pub owner: PlayerId,
    /// Ship indices attached to this planet, in docking order. Contains
    /// ships that are still `Docking` as well as fully `Docked` ones.
    pub docked_ships: Vec<EntityIndex>,
    pub current_production: u32,
    pub remaining_production: u32,
    /// Set when a same-turn docking contention voids all claims; blocks
    /// docking until the next turn's docking pass clears it.
    pub frozen: bool,
}

impl Planet {
    pub fn new(location: Location, radius: f64, docking_spots: u32, health: u16, remaining_production: u32) -> Self {
        Self {
            location,
            radius,
            docking_spots,
            health,
            owned: false,
            owner: 0,
            docked_ships: Vec::new(),
            current_production: 0,
            remaining_production,
            frozen: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn add_ship(&mut self, ship: EntityIndex) {
        debug_assert!(!self.docked_ships.contains(&ship));
        self.docked_ships.push(ship);
    }

    pub fn remove_ship(&mut self, ship: EntityIndex) {
        self.docked_ships.retain(|&docked| docked != ship);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ship_is_undocked_at_full_health() {
        let constants = GameConstants::default();
        let ship = Ship::new(Location::new(5.0, 5.0), &constants);
        assert_eq!(ship.health, constants.max_ship_health);
        assert_eq!(ship.docking_status, DockingStatus::Undocked);
        assert!(ship.velocity.is_zero());
    }

    #[test]
    fn test_heal_caps_at_max() {
        let constants = GameConstants::default();
        let mut ship = Ship::new(Location::default(), &constants);
        ship.health = 250;
        ship.heal(20, constants.max_ship_health);
        assert_eq!(ship.health, constants.max_ship_health);
    }

    #[test]
    fn test_can_dock_uses_crust_distance() {
        let constants = GameConstants::default();
        let planet = Planet::new(Location::new(0.0, 0.0), 6.0, 3, 1000, 1000);

        let near = Ship::new(Location::new(9.0, 0.0), &constants);
        assert!(near.can_dock(&planet, &constants));

        let far = Ship::new(Location::new(6.0 + constants.dock_radius + 0.1, 0.0), &constants);
        assert!(!far.can_dock(&planet, &constants));
    }

    #[test]
    fn test_docked_ship_bookkeeping() {
        let mut planet = Planet::new(Location::default(), 5.0, 2, 500, 500);
        planet.add_ship(3);
        planet.add_ship(9);
        planet.remove_ship(3);
        assert_eq!(planet.docked_ships, vec![9]);
        // Removing an absent index is a no-op.
        planet.remove_ship(3);
        assert_eq!(planet.docked_ships, vec![9]);
    }
}
