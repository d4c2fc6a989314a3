//! Frame event detection.
//!
//! Walks every live ship against broadphase ship candidates, all planets,
//! and the map boundary, and emits the Attack / Collision / Desertion events
//! whose (quantized) time falls inside the 1-second frame. Events live in a
//! set keyed symmetrically on the entity pair, so the same pair discovered
//! from both endpoints collapses to one record.

use std::hash::{Hash, Hasher};

use ahash::AHashSet;

use crate::core::config::GameConstants;
use crate::core::types::{EntityId, EntityIndex, PlayerId};
use crate::sim::collision::{collision_time_planet, collision_time_ships, round_event_time};
use crate::sim::grid::CollisionGrid;
use crate::world::entity::Ship;
use crate::world::map::GameMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SimulationEventKind {
    Attack,
    Collision,
    Desertion,
}

/// A detected interaction at a quantized instant within the frame.
#[derive(Debug, Clone, Copy)]
pub struct SimulationEvent {
    pub kind: SimulationEventKind,
    pub id1: EntityId,
    pub id2: EntityId,
    /// Quantized; two events are simultaneous iff their times are bitwise
    /// equal.
    pub time: f64,
}

impl PartialEq for SimulationEvent {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.time == other.time
            && ((self.id1 == other.id1 && self.id2 == other.id2)
                || (self.id1 == other.id2 && self.id2 == other.id1))
    }
}

impl Eq for SimulationEvent {}

impl Hash for SimulationEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.time.to_bits().hash(state);
        // Order-independent pair hash, consistent with the symmetric Eq.
        let (lo, hi) = if self.id1 <= self.id2 {
            (self.id1, self.id2)
        } else {
            (self.id2, self.id1)
        };
        lo.hash(state);
        hi.hash(state);
    }
}

fn might_attack(distance: f64, ship1: &Ship, ship2: &Ship, constants: &GameConstants) -> bool {
    distance <= ship1.velocity.magnitude() + ship2.velocity.magnitude() + constants.weapon_radius
}

fn might_collide(distance: f64, ship1: &Ship, ship2: &Ship) -> bool {
    distance
        <= ship1.velocity.magnitude() + ship2.velocity.magnitude() + ship1.radius + ship2.radius
}

/// Emit the events (if any) between one ordered ship pair.
pub fn find_events(
    events: &mut AHashSet<SimulationEvent>,
    id1: EntityId,
    id2: EntityId,
    ship1: &Ship,
    ship2: &Ship,
    constants: &GameConstants,
) {
    let distance = ship1.location.distance(&ship2.location);

    if id1.player() != id2.player() && might_attack(distance, ship1, ship2, constants) {
        let attack_radius = ship1.radius + ship2.radius + constants.weapon_radius;
        match collision_time_ships(attack_radius, ship1, ship2) {
            Some(t) if (0.0..=1.0).contains(&t) => {
                events.insert(SimulationEvent {
                    kind: SimulationEventKind::Attack,
                    id1,
                    id2,
                    time: round_event_time(t, constants.event_time_precision),
                });
            }
            _ => {
                if distance < attack_radius {
                    events.insert(SimulationEvent {
                        kind: SimulationEventKind::Attack,
                        id1,
                        id2,
                        time: 0.0,
                    });
                }
            }
        }
    }

    if id1 != id2 && might_collide(distance, ship1, ship2) {
        let collision_radius = ship1.radius + ship2.radius;
        match collision_time_ships(collision_radius, ship1, ship2) {
            Some(t) => {
                if (0.0..=1.0).contains(&t) {
                    events.insert(SimulationEvent {
                        kind: SimulationEventKind::Collision,
                        id1,
                        id2,
                        time: round_event_time(t, constants.event_time_precision),
                    });
                }
            }
            None => {
                // Overlapping ships with no solver contact means the state
                // is already corrupt.
                assert!(
                    distance >= collision_radius,
                    "overlapping ships {:?}/{:?} produced no collision time",
                    id1,
                    id2
                );
            }
        }
    }
}

/// Detect every event for the current frame, sorted ascending by quantized
/// time with a total tie-break so batches are reproducible.
pub fn detect_events(map: &GameMap, constants: &GameConstants) -> Vec<SimulationEvent> {
    let grid = CollisionGrid::build(map, constants.cell_size);
    let mut events: AHashSet<SimulationEvent> = AHashSet::new();
    let mut candidates: Vec<EntityId> = Vec::new();

    for player in 0..map.num_players() {
        for (&index, ship1) in &map.ships[player] {
            let id1 = EntityId::for_ship(player as PlayerId, index);

            // Query wide enough that the distance gates below, not the
            // grid, decide which pairs are considered: hull plus this
            // frame's travel plus weapon reach.
            let reach = ship1.radius + ship1.velocity.magnitude() + constants.weapon_radius;
            candidates.clear();
            grid.test(&ship1.location, reach, &mut candidates);
            for &id2 in &candidates {
                find_events(&mut events, id1, id2, ship1, map.ship(id2), constants);
            }

            // Planets are scanned linearly; there are few of them and their
            // radii routinely exceed a grid cell.
            for (planet_index, planet) in map.planets.iter().enumerate() {
                if !planet.is_alive() {
                    continue;
                }
                let distance = ship1.location.distance(&planet.location);
                if distance > ship1.velocity.magnitude() + ship1.radius + planet.radius {
                    continue;
                }
                let collision_radius = ship1.radius + planet.radius;
                match collision_time_planet(collision_radius, ship1, planet) {
                    Some(t) => {
                        if (0.0..=1.0).contains(&t) {
                            events.insert(SimulationEvent {
                                kind: SimulationEventKind::Collision,
                                id1,
                                id2: EntityId::for_planet(planet_index as EntityIndex),
                                time: round_event_time(t, constants.event_time_precision),
                            });
                        }
                    }
                    None => {
                        assert!(
                            distance > collision_radius,
                            "ship {:?} overlaps planet {} with no collision time",
                            id1,
                            planet_index
                        );
                    }
                }
            }

            find_desertion(&mut events, id1, ship1, map, constants);
        }
    }

    let mut sorted: Vec<SimulationEvent> = events.into_iter().collect();
    sorted.sort_by(|a, b| {
        a.time
            .total_cmp(&b.time)
            .then(a.kind.cmp(&b.kind))
            .then(a.id1.cmp(&b.id1))
            .then(a.id2.cmp(&b.id2))
    });
    tracing::trace!(events = sorted.len(), "frame events detected");
    sorted
}

/// Emit a Desertion event for a ship whose projected end-of-frame position
/// leaves the map.
///
/// Only positive velocity components are tested against the boundary, so a
/// ship drifting out across the left or bottom edge produces no event here.
/// That asymmetry is observable in replays and deliberately kept; the final
/// position is rejected elsewhere.
fn find_desertion(
    events: &mut AHashSet<SimulationEvent>,
    id: EntityId,
    ship: &Ship,
    map: &GameMap,
    constants: &GameConstants,
) {
    let final_location = ship.location.after(&ship.velocity, 1.0);
    if map.within_bounds(&final_location) {
        return;
    }

    let mut time = f64::INFINITY;
    if ship.velocity.vx > 0.0 {
        let t1 = -ship.location.x / ship.velocity.vx;
        if t1 >= 0.0 && t1 < time {
            time = t1;
        }
        let t2 = (map.width - ship.location.x) / ship.velocity.vx;
        if t2 >= 0.0 && t2 < time {
            time = t2;
        }
    }
    if ship.velocity.vy > 0.0 {
        let t3 = -ship.location.y / ship.velocity.vy;
        if t3 >= 0.0 && t3 < time {
            time = t3;
        }
        let t4 = (map.height - ship.location.y) / ship.velocity.vy;
        if t4 >= 0.0 && t4 < time {
            time = t4;
        }
    }

    if time.is_finite() {
        assert!(
            (0.0..=1.0).contains(&time),
            "desertion time {} outside the frame for {:?}",
            time,
            id
        );
        events.insert(SimulationEvent {
            kind: SimulationEventKind::Desertion,
            id1: id,
            id2: id,
            time: round_event_time(time, constants.event_time_precision),
        });
    }
}
