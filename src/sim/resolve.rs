//! Event resolution: ordering, damage accounting, and death.
//!
//! Events are consumed in ascending quantized time. All events sharing a
//! time form a batch and are resolved atomically: collisions and desertions
//! apply immediately, while attacks are accounted in two passes so that an
//! attacker's damage splits evenly across everything it can hit in the same
//! instant, regardless of the order the events were discovered in.

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::core::config::GameConstants;
use crate::core::types::{EntityId, EntityIndex};
use crate::geom::Location;
use crate::replay::FrameEvent;
use crate::sim::event::{SimulationEvent, SimulationEventKind};
use crate::world::entity::DockingStatus;
use crate::world::map::{EntityRef, GameMap};

/// Accumulated fractional attack damage, per player then ship index.
/// Fractions survive accumulation and are truncated only on application.
type DamageMap = Vec<BTreeMap<EntityIndex, f64>>;

struct AttackAccumulator {
    location: Location,
    time: f64,
    targets: Vec<EntityId>,
    target_locations: Vec<Location>,
}

/// Explosion damage for a target whose hull sits `distance` from the planet
/// center (`distance` already has the target's radius subtracted). Inside
/// the crust is an instant kill; outside, damage falls off linearly and
/// reaches half the ship health cap at the explosion's edge.
pub fn planet_explosion_damage(
    planet_radius: f64,
    distance: f64,
    constants: &GameConstants,
) -> u16 {
    if distance < planet_radius {
        return u16::MAX;
    }
    let distance_from_crust = distance - planet_radius;
    if distance_from_crust <= constants.explosion_radius {
        let max_hp = constants.max_ship_health as f64;
        let damage = max_hp - (distance_from_crust / (2.0 * constants.explosion_radius)) * max_hp;
        return damage as u16;
    }
    0
}

/// Apply `damage` to an entity, killing it when the damage meets or exceeds
/// its remaining health.
pub fn damage_entity(
    map: &mut GameMap,
    constants: &GameConstants,
    frame_events: &mut Vec<FrameEvent>,
    id: EntityId,
    damage: u16,
    time: f64,
) {
    let health = map.entity(id).health();
    if health <= damage {
        kill_entity(map, constants, frame_events, id, time);
    } else {
        match id {
            EntityId::Ship { player, index } => {
                map.get_ship_mut(player, index).health -= damage;
            }
            EntityId::Planet { index } => {
                map.get_planet_mut(index).health -= damage;
            }
            EntityId::Invalid => panic!("damage against invalid entity"),
        }
    }
}

/// Destroy an entity, running its death side effects.
///
/// Idempotent: a second kill in the same batch is a no-op. A dying ship is
/// recorded at its position at the event time, not at the start of the
/// frame. A dying planet releases its docked ships and then applies the
/// area explosion over a snapshot of the entities caught in it, taken
/// before any damage lands.
pub fn kill_entity(
    map: &mut GameMap,
    constants: &GameConstants,
    frame_events: &mut Vec<FrameEvent>,
    id: EntityId,
    time: f64,
) {
    if !map.is_valid(id) {
        return;
    }

    let (mut location, radius) = {
        let entity = map.entity(id);
        (entity.location(), entity.radius())
    };
    if let EntityRef::Ship(ship) = map.entity(id) {
        location.move_by(&ship.velocity, time);
    }
    frame_events.push(FrameEvent::Destroyed {
        id,
        location,
        radius,
        time,
    });

    match id {
        EntityId::Ship { player, index } => {
            let (status, docked_planet) = {
                let ship = map.get_ship(player, index);
                (ship.docking_status, ship.docked_planet)
            };
            if status != DockingStatus::Undocked {
                map.get_planet_mut(docked_planet).remove_ship(index);
                map.get_ship_mut(player, index).reset_docking_status();
            }
        }
        EntityId::Planet { index } => {
            let (owner, docked, planet_location, planet_radius) = {
                let planet = map.get_planet(index);
                (
                    planet.owner,
                    planet.docked_ships.clone(),
                    planet.location,
                    planet.radius,
                )
            };
            for ship_index in docked {
                map.get_ship_mut(owner, ship_index).reset_docking_status();
            }

            // Snapshot the blast candidates before any damage is applied;
            // chained explosions re-snapshot for themselves.
            let caught = map.test(&planet_location, planet_radius + constants.explosion_radius);
            for target_id in caught {
                if target_id == id {
                    continue;
                }
                let (target_location, target_radius) = {
                    let target = map.entity(target_id);
                    (target.location(), target.radius())
                };
                let distance = planet_location.distance(&target_location);
                let damage =
                    planet_explosion_damage(planet_radius, distance - target_radius, constants);
                damage_entity(map, constants, frame_events, target_id, damage, time);
            }
        }
        EntityId::Invalid => panic!("cannot kill invalid entity"),
    }

    map.unsafe_kill_entity(id);
}

/// Damage both parties of a contact event.
///
/// Every ship in a contact dies: it takes its own remaining health. The
/// other party takes the ship's health as well, which for a planet chips
/// its crust and for a ship guarantees mutual destruction.
fn compute_damage(map: &GameMap, self_id: EntityId, other_id: EntityId) -> (u16, u16) {
    match self_id {
        EntityId::Planet { .. } => {
            let other = map.ship(other_id);
            (other.health, other.health)
        }
        EntityId::Ship { .. } => {
            let own = map.ship(self_id).health;
            let other_damage = if other_id.is_ship() {
                map.ship(other_id).health
            } else {
                own
            };
            (own, other_damage)
        }
        EntityId::Invalid => panic!("cannot compute damage against invalid entity"),
    }
}

/// Resolve a frame's events against the map.
///
/// `events` must be sorted ascending by quantized time (as produced by
/// [`detect_events`](crate::sim::event::detect_events)). `damage_dealt` is
/// the per-player lifetime tally credited as attacks land.
pub fn resolve_events(
    map: &mut GameMap,
    constants: &GameConstants,
    events: &[SimulationEvent],
    frame_events: &mut Vec<FrameEvent>,
    damage_dealt: &mut [u64],
) {
    let num_players = map.num_players();
    let mut cursor = 0;

    while cursor < events.len() {
        let batch_time = events[cursor].time;
        let mut batch: Vec<SimulationEvent> = Vec::new();
        while cursor < events.len() && events[cursor].time.to_bits() == batch_time.to_bits() {
            batch.push(events[cursor]);
            cursor += 1;
        }

        // Earlier batches may have removed participants.
        batch.retain(|ev| map.is_valid(ev.id1) && map.is_valid(ev.id2));
        if batch.is_empty() {
            continue;
        }

        let mut damage_map: DamageMap = vec![BTreeMap::new(); num_players];
        let mut target_count: AHashMap<EntityId, u32> = AHashMap::new();
        let mut attackers: BTreeMap<EntityId, AttackAccumulator> = BTreeMap::new();

        // Pass 1: register attack targets without touching cooldowns, and
        // apply contact and desertion damage inline.
        for ev in &batch {
            match ev.kind {
                SimulationEventKind::Collision => {
                    let (damage1, damage2) = compute_damage(map, ev.id1, ev.id2);
                    damage_entity(map, constants, frame_events, ev.id1, damage1, ev.time);
                    damage_entity(map, constants, frame_events, ev.id2, damage2, ev.time);
                }
                SimulationEventKind::Desertion => {
                    let damage = map.entity(ev.id1).health();
                    damage_entity(map, constants, frame_events, ev.id1, damage, ev.time);
                }
                SimulationEventKind::Attack => {
                    update_targets(
                        map,
                        ev.id1,
                        ev.id2,
                        ev.time,
                        &mut attackers,
                        &mut target_count,
                        damage_dealt,
                        constants,
                    );
                    update_targets(
                        map,
                        ev.id2,
                        ev.id1,
                        ev.time,
                        &mut attackers,
                        &mut target_count,
                        damage_dealt,
                        constants,
                    );
                }
            }
        }

        // Pass 2: split each attacker's damage across its targets and start
        // its cooldown (once per batch, however many targets it has).
        for ev in &batch {
            if ev.kind != SimulationEventKind::Attack {
                continue;
            }
            update_damage(map, ev.id1, ev.id2, &target_count, &mut damage_map, constants);
            update_damage(map, ev.id2, ev.id1, &target_count, &mut damage_map, constants);
        }

        for (attacker, record) in attackers {
            frame_events.push(FrameEvent::Attack {
                attacker,
                location: record.location,
                time: record.time,
                targets: record.targets,
                target_locations: record.target_locations,
            });
        }

        for player in 0..num_players {
            let entries: Vec<(EntityIndex, f64)> = damage_map[player]
                .iter()
                .map(|(&index, &damage)| (index, damage))
                .collect();
            for (index, damage) in entries {
                damage_entity(
                    map,
                    constants,
                    frame_events,
                    EntityId::for_ship(player as u8, index),
                    damage as u16,
                    batch_time,
                );
            }
        }

        map.cleanup_entities();
    }
}

#[allow(clippy::too_many_arguments)]
fn update_targets(
    map: &GameMap,
    src: EntityId,
    target: EntityId,
    time: f64,
    attackers: &mut BTreeMap<EntityId, AttackAccumulator>,
    target_count: &mut AHashMap<EntityId, u32>,
    damage_dealt: &mut [u64],
    constants: &GameConstants,
) {
    let attacker = map.ship(src);
    if !attacker.is_alive()
        || attacker.weapon_cooldown > 0
        || attacker.docking_status != DockingStatus::Undocked
    {
        return;
    }

    let location = attacker.location;
    let record = attackers.entry(src).or_insert_with(|| AttackAccumulator {
        location,
        time,
        targets: Vec::new(),
        target_locations: Vec::new(),
    });
    record.targets.push(target);
    record.target_locations.push(map.ship(target).location);

    *target_count.entry(src).or_insert(0) += 1;
    damage_dealt[src.player() as usize] += constants.weapon_damage as u64;
}

fn update_damage(
    map: &mut GameMap,
    src: EntityId,
    target: EntityId,
    target_count: &AHashMap<EntityId, u32>,
    damage_map: &mut DamageMap,
    constants: &GameConstants,
) {
    // Only attackers that registered targets in pass 1 deal damage.
    let Some(&count) = target_count.get(&src) else {
        return;
    };
    let attacker = map.ship_mut(src);
    if !attacker.is_alive() || attacker.docking_status != DockingStatus::Undocked {
        return;
    }
    attacker.weapon_cooldown = constants.weapon_cooldown;

    let split = constants.weapon_damage as f64 / count as f64;
    *damage_map[target.player() as usize]
        .entry(target.index())
        .or_insert(0.0) += split;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PlayerId;
    use crate::geom::Velocity;
    use crate::sim::event::detect_events;
    use crate::world::entity::Planet;

    fn arena(num_players: usize) -> (GameMap, GameConstants) {
        (GameMap::new(240.0, 160.0, num_players), GameConstants::default())
    }

    fn place(
        map: &mut GameMap,
        player: PlayerId,
        x: f64,
        y: f64,
        constants: &GameConstants,
    ) -> EntityId {
        let index = map.spawn_ship(Location::new(x, y), player, constants);
        EntityId::for_ship(player, index)
    }

    fn run_frame(map: &mut GameMap, constants: &GameConstants, damage_dealt: &mut [u64]) -> Vec<FrameEvent> {
        let events = detect_events(map, constants);
        let mut frame_events = Vec::new();
        resolve_events(map, constants, &events, &mut frame_events, damage_dealt);
        frame_events
    }

    #[test]
    fn test_single_attack_pair_trades_full_damage() {
        let (mut map, constants) = arena(2);
        let a = place(&mut map, 0, 100.0, 80.0, &constants);
        let b = place(&mut map, 1, 104.0, 80.0, &constants);

        let mut damage_dealt = vec![0u64; 2];
        run_frame(&mut map, &constants, &mut damage_dealt);

        assert_eq!(map.ship(a).health, 255 - 64);
        assert_eq!(map.ship(b).health, 255 - 64);
        assert_eq!(map.ship(a).weapon_cooldown, constants.weapon_cooldown);
        assert_eq!(map.ship(b).weapon_cooldown, constants.weapon_cooldown);
        assert_eq!(damage_dealt, vec![64, 64]);
    }

    #[test]
    fn test_focus_fire_splits_attacker_damage() {
        // Three allies around one enemy. The enemy has three targets, so
        // each ally takes 64/3 (truncated on application); the enemy takes
        // 64 from each ally.
        let (mut map, constants) = arena(2);
        let enemy = place(&mut map, 1, 100.0, 80.0, &constants);
        let allies = [
            place(&mut map, 0, 104.0, 80.0, &constants),
            place(&mut map, 0, 96.0, 80.0, &constants),
            place(&mut map, 0, 100.0, 84.0, &constants),
        ];

        let mut damage_dealt = vec![0u64; 2];
        run_frame(&mut map, &constants, &mut damage_dealt);

        assert_eq!(map.ship(enemy).health, 255 - 3 * 64);
        for ally in allies {
            assert_eq!(map.ship(ally).health, 255 - 64 / 3);
        }
        assert_eq!(damage_dealt[0], 3 * 64);
        assert_eq!(damage_dealt[1], 3 * 64);
    }

    #[test]
    fn test_docked_and_cooling_ships_do_not_fire() {
        let (mut map, constants) = arena(2);
        let docked = place(&mut map, 0, 100.0, 80.0, &constants);
        let cooling = place(&mut map, 0, 100.0, 84.0, &constants);
        let enemy = place(&mut map, 1, 102.0, 82.0, &constants);

        map.ship_mut(docked).docking_status = DockingStatus::Docked;
        map.ship_mut(cooling).weapon_cooldown = 1;

        let mut damage_dealt = vec![0u64; 2];
        run_frame(&mut map, &constants, &mut damage_dealt);

        // Only the enemy fired; it hit both of ours, splitting its budget.
        assert_eq!(map.ship(enemy).health, 255);
        assert_eq!(map.ship(docked).health, 255 - 32);
        assert_eq!(map.ship(cooling).health, 255 - 32);
        assert_eq!(damage_dealt[0], 0);
        assert_eq!(damage_dealt[1], 128);
    }

    #[test]
    fn test_mutual_collision_kills_both_regardless_of_health() {
        let (mut map, constants) = arena(1);
        let a = place(&mut map, 0, 100.0, 80.0, &constants);
        let b = place(&mut map, 0, 100.8, 80.0, &constants);
        map.ship_mut(a).health = 10;

        let mut damage_dealt = vec![0u64; 1];
        let events = run_frame(&mut map, &constants, &mut damage_dealt);

        assert!(!map.is_valid(a));
        assert!(!map.is_valid(b));
        let destroyed = events
            .iter()
            .filter(|ev| matches!(ev, FrameEvent::Destroyed { .. }))
            .count();
        assert_eq!(destroyed, 2);
    }

    #[test]
    fn test_desertion_records_death_at_event_time() {
        let (mut map, constants) = arena(1);
        let deserter = place(&mut map, 0, 238.0, 80.0, &constants);
        map.ship_mut(deserter).velocity = Velocity::new(5.0, 0.0);

        let mut damage_dealt = vec![0u64; 1];
        let events = run_frame(&mut map, &constants, &mut damage_dealt);

        assert!(!map.is_valid(deserter));
        match &events[0] {
            FrameEvent::Destroyed { location, time, .. } => {
                // Edge crossing at t = 0.4: the wreck sits on the boundary.
                assert!((location.x - 240.0).abs() < 1e-9);
                assert!((*time - 0.4).abs() < 1e-9);
            }
            other => panic!("expected destruction, got {:?}", other),
        }
    }

    #[test]
    fn test_planet_explosion_damage_profile() {
        let constants = GameConstants::default();
        // Inside the crust: instant kill.
        assert_eq!(planet_explosion_damage(8.0, 5.0, &constants), u16::MAX);
        // 1.5 past the crust with radius-10 blast: 255 * (1 - 1.5/20).
        assert_eq!(planet_explosion_damage(8.0, 9.5, &constants), 235);
        // Beyond the blast: nothing.
        assert_eq!(planet_explosion_damage(8.0, 18.5, &constants), 0);
    }

    #[test]
    fn test_planet_death_damages_ring_of_ships() {
        let (mut map, constants) = arena(1);
        let planet_index = map.add_planet(Planet::new(Location::new(120.0, 80.0), 8.0, 4, 500, 500));
        let ring = [
            place(&mut map, 0, 130.0, 80.0, &constants),
            place(&mut map, 0, 110.0, 80.0, &constants),
            place(&mut map, 0, 120.0, 90.0, &constants),
            place(&mut map, 0, 120.0, 70.0, &constants),
        ];

        let mut frame_events = Vec::new();
        kill_entity(
            &mut map,
            &constants,
            &mut frame_events,
            EntityId::for_planet(planet_index),
            0.0,
        );
        map.cleanup_entities();

        for ship in ring {
            // Hull distance 9.5, 1.5 past the crust: 235 damage.
            assert_eq!(map.ship(ship).health, 255 - 235);
        }
        assert!(!map.is_valid(EntityId::for_planet(planet_index)));
    }

    #[test]
    fn test_kill_entity_is_idempotent_within_a_batch() {
        let (mut map, constants) = arena(1);
        let ship = place(&mut map, 0, 100.0, 80.0, &constants);

        let mut frame_events = Vec::new();
        kill_entity(&mut map, &constants, &mut frame_events, ship, 0.0);
        kill_entity(&mut map, &constants, &mut frame_events, ship, 0.0);
        assert_eq!(frame_events.len(), 1);
    }

    #[test]
    fn test_dying_docked_ship_releases_its_berth() {
        let (mut map, constants) = arena(1);
        let planet_index = map.add_planet(Planet::new(Location::new(100.0, 80.0), 6.0, 2, 500, 500));
        let ship = place(&mut map, 0, 104.0, 80.0, &constants);

        {
            let planet = map.get_planet_mut(planet_index);
            planet.owned = true;
            planet.owner = 0;
            planet.add_ship(ship.index());
        }
        {
            let s = map.ship_mut(ship);
            s.docking_status = DockingStatus::Docked;
            s.docked_planet = planet_index;
        }

        let mut frame_events = Vec::new();
        kill_entity(&mut map, &constants, &mut frame_events, ship, 0.0);
        assert!(map.get_planet(planet_index).docked_ships.is_empty());
    }
}
