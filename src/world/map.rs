//! The map arena: exclusive owner of every ship and planet.
//!
//! Entities are addressed by `EntityId` (arena-by-index), never by borrowed
//! handles, so the ship <-> planet docking cycle is representable without
//! aliasing. Ships live in per-player `BTreeMap`s keyed by their index;
//! ascending-index iteration is the deterministic order every pipeline stage
//! relies on. Membership in the map equals "alive".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::config::GameConstants;
use crate::core::types::{EntityId, EntityIndex, PlayerId};
use crate::geom::Location;
use crate::world::entity::{Planet, Ship};

/// Read-only view of an entity, for code generic over ships and planets.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Ship(&'a Ship),
    Planet(&'a Planet),
}

impl EntityRef<'_> {
    pub fn location(&self) -> Location {
        match self {
            EntityRef::Ship(ship) => ship.location,
            EntityRef::Planet(planet) => planet.location,
        }
    }

    pub fn radius(&self) -> f64 {
        match self {
            EntityRef::Ship(ship) => ship.radius,
            EntityRef::Planet(planet) => planet.radius,
        }
    }

    pub fn health(&self) -> u16 {
        match self {
            EntityRef::Ship(ship) => ship.health,
            EntityRef::Planet(planet) => planet.health,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMap {
    pub width: f64,
    pub height: f64,
    pub planets: Vec<Planet>,
    /// Ship arenas, one per player, keyed by ship index.
    pub ships: Vec<BTreeMap<EntityIndex, Ship>>,
    next_ship_indices: Vec<EntityIndex>,
    /// Entities killed mid-resolution; removed by `cleanup_entities`.
    kill_queue: Vec<EntityId>,
}

impl GameMap {
    pub fn new(width: f64, height: f64, num_players: usize) -> Self {
        Self {
            width,
            height,
            planets: Vec::new(),
            ships: vec![BTreeMap::new(); num_players],
            next_ship_indices: vec![0; num_players],
            kill_queue: Vec::new(),
        }
    }

    pub fn num_players(&self) -> usize {
        self.ships.len()
    }

    pub fn add_planet(&mut self, planet: Planet) -> EntityIndex {
        self.planets.push(planet);
        (self.planets.len() - 1) as EntityIndex
    }

    /// Create a new ship for `player`. Indices are never reused.
    pub fn spawn_ship(
        &mut self,
        location: Location,
        player: PlayerId,
        constants: &GameConstants,
    ) -> EntityIndex {
        let index = self.next_ship_indices[player as usize];
        self.next_ship_indices[player as usize] += 1;
        self.ships[player as usize].insert(index, Ship::new(location, constants));
        index
    }

    pub fn get_ship(&self, player: PlayerId, index: EntityIndex) -> &Ship {
        &self.ships[player as usize][&index]
    }

    pub fn get_ship_mut(&mut self, player: PlayerId, index: EntityIndex) -> &mut Ship {
        self.ships[player as usize]
            .get_mut(&index)
            .unwrap_or_else(|| panic!("dangling ship reference: player {} index {}", player, index))
    }

    pub fn ship(&self, id: EntityId) -> &Ship {
        match id {
            EntityId::Ship { player, index } => self.get_ship(player, index),
            other => panic!("ship lookup with non-ship id {:?}", other),
        }
    }

    pub fn ship_mut(&mut self, id: EntityId) -> &mut Ship {
        match id {
            EntityId::Ship { player, index } => self.get_ship_mut(player, index),
            other => panic!("ship lookup with non-ship id {:?}", other),
        }
    }

    pub fn get_planet(&self, index: EntityIndex) -> &Planet {
        &self.planets[index as usize]
    }

    pub fn get_planet_mut(&mut self, index: EntityIndex) -> &mut Planet {
        &mut self.planets[index as usize]
    }

    pub fn entity(&self, id: EntityId) -> EntityRef<'_> {
        match id {
            EntityId::Ship { player, index } => EntityRef::Ship(self.get_ship(player, index)),
            EntityId::Planet { index } => EntityRef::Planet(self.get_planet(index)),
            EntityId::Invalid => panic!("entity lookup with invalid id"),
        }
    }

    /// Whether `id` refers to a live entity.
    pub fn is_valid(&self, id: EntityId) -> bool {
        match id {
            EntityId::Ship { player, index } => self
                .ships
                .get(player as usize)
                .and_then(|arena| arena.get(&index))
                .is_some_and(Ship::is_alive),
            EntityId::Planet { index } => self
                .planets
                .get(index as usize)
                .is_some_and(Planet::is_alive),
            EntityId::Invalid => false,
        }
    }

    /// Mark an entity dead without running any death side effects. The
    /// entity stays addressable (at zero health) until `cleanup_entities`.
    pub fn unsafe_kill_entity(&mut self, id: EntityId) {
        match id {
            EntityId::Ship { player, index } => {
                if let Some(ship) = self.ships[player as usize].get_mut(&index) {
                    ship.health = 0;
                    self.kill_queue.push(id);
                }
            }
            EntityId::Planet { index } => {
                self.planets[index as usize].health = 0;
            }
            EntityId::Invalid => panic!("cannot kill invalid entity"),
        }
    }

    /// Commit deferred removals. Dead planets stay in the arena (indices are
    /// stable and their slot records the wreck); dead ships are dropped.
    pub fn cleanup_entities(&mut self) {
        for id in std::mem::take(&mut self.kill_queue) {
            if let EntityId::Ship { player, index } = id {
                self.ships[player as usize].remove(&index);
            }
        }
    }

    pub fn within_bounds(&self, location: &Location) -> bool {
        location.x >= 0.0 && location.y >= 0.0 && location.x < self.width && location.y < self.height
    }

    /// Offset `base` by `(dx, dy)`, reporting whether the result is still
    /// inside the map.
    pub fn location_with_delta(&self, base: &Location, dx: f64, dy: f64) -> Option<Location> {
        let moved = Location::new(base.x + dx, base.y + dy);
        self.within_bounds(&moved).then_some(moved)
    }

    /// Exact scan for entities whose center lies within `radius` of
    /// `location`. Linear over everything; used off the hot path (spawn-site
    /// checks, explosion candidates).
    pub fn test(&self, location: &Location, radius: f64) -> Vec<EntityId> {
        let mut found = Vec::new();
        for (player, arena) in self.ships.iter().enumerate() {
            for (&index, ship) in arena {
                if ship.is_alive() && location.distance(&ship.location) <= radius {
                    found.push(EntityId::for_ship(player as PlayerId, index));
                }
            }
        }
        for (index, planet) in self.planets.iter().enumerate() {
            if planet.is_alive() && location.distance(&planet.location) <= radius {
                found.push(EntityId::for_planet(index as EntityIndex));
            }
        }
        found
    }

    /// Count ships attached to `planet` that have completed docking.
    pub fn count_docked_ships(&self, planet: &Planet) -> usize {
        planet
            .docked_ships
            .iter()
            .filter(|&&index| {
                self.ships[planet.owner as usize]
                    .get(&index)
                    .is_some_and(|ship| {
                        ship.docking_status == crate::world::entity::DockingStatus::Docked
                    })
            })
            .count()
    }
}
