//! The turn driver.
//!
//! `Game` owns the map, the player controllers and the transcript, and runs
//! the fixed per-turn pipeline: retrieve moves (the only concurrent step) ->
//! docking tick -> micro-steps of {apply moves, detect events, resolve
//! events, advance positions} -> production -> drag -> cooldowns -> snapshot
//! -> termination check.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::core::config::GameConstants;
use crate::core::error::{EngineError, Result};
use crate::core::types::{EntityId, EntityIndex, PlayerId};
use crate::geom::Location;
use crate::players::{Move, MoveQueue, MoveSet, PlayerController, PlayerResponse};
use crate::replay::writer::ReplayHeader;
use crate::replay::{FrameEvent, Transcript};
use crate::sim::event::detect_events;
use crate::sim::resolve::resolve_events;
use crate::world::entity::DockingStatus;
use crate::world::map::GameMap;

pub mod stats;

use stats::{GameStatistics, PlayerStatistics};

pub struct Game {
    constants: GameConstants,
    map: GameMap,
    turn_number: u32,
    seed: u64,
    map_generator: String,
    points_of_interest: Value,
    player_names: Vec<String>,
    controllers: Vec<Box<dyn PlayerController>>,
    /// This turn's queues, one per player, refreshed by `retrieve_moves`.
    player_moves: Vec<MoveQueue>,
    transcript: Transcript,

    // Per-player tallies for rankings and the stats block.
    alive_frame_count: Vec<u32>,
    init_response_times: Vec<u32>,
    total_frame_response_times: Vec<u64>,
    last_ship_count: Vec<u32>,
    last_ship_health_total: Vec<u64>,
    total_ship_count: Vec<u32>,
    damage_dealt: Vec<u64>,
    timeout_tags: BTreeSet<PlayerId>,
}

impl Game {
    pub fn new(
        constants: GameConstants,
        map: GameMap,
        seed: u64,
        map_generator: impl Into<String>,
        points_of_interest: Value,
        controllers: Vec<Box<dyn PlayerController>>,
    ) -> Result<Self> {
        constants.validate().map_err(EngineError::InvalidConfig)?;
        let num_players = controllers.len();
        if num_players == 0 || num_players != map.num_players() {
            return Err(EngineError::InvalidConfig(format!(
                "{} controllers for a {}-player map",
                num_players,
                map.num_players()
            )));
        }

        // Count the starting fleets toward lifetime ship totals.
        let total_ship_count = map.ships.iter().map(|arena| arena.len() as u32).collect();

        let mut transcript = Transcript::new();
        transcript.snapshot(&map);

        Ok(Self {
            player_moves: vec![MoveQueue::empty(constants.max_queued_moves); num_players],
            constants,
            map,
            turn_number: 0,
            seed,
            map_generator: map_generator.into(),
            points_of_interest,
            player_names: vec![String::new(); num_players],
            controllers,
            transcript,
            alive_frame_count: vec![1; num_players],
            init_response_times: vec![0; num_players],
            total_frame_response_times: vec![0; num_players],
            last_ship_count: vec![0; num_players],
            last_ship_health_total: vec![0; num_players],
            total_ship_count,
            damage_dealt: vec![0; num_players],
            timeout_tags: BTreeSet::new(),
        })
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn constants(&self) -> &GameConstants {
        &self.constants
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    pub fn player_names(&self) -> &[String] {
        &self.player_names
    }

    /// Header facts for the replay writer.
    pub fn replay_header(&self) -> ReplayHeader<'_> {
        ReplayHeader {
            seed: self.seed,
            map_generator: &self.map_generator,
            player_names: &self.player_names,
            constants: &self.constants,
            points_of_interest: self.points_of_interest.clone(),
        }
    }

    /// Play the game to completion and return the final standings.
    pub fn run(&mut self) -> Result<GameStatistics> {
        let num_players = self.controllers.len();
        let mut living = vec![true; num_players];
        // Worst player first while the game runs; reversed at the end.
        let mut rankings: Vec<PlayerId> = Vec::new();

        // Initial exchange: names out, readiness back, same fan-out/join
        // discipline as a turn.
        let init_results = {
            let map = &self.map;
            let mut results: Vec<PlayerResponse<String>> = Vec::with_capacity(num_players);
            std::thread::scope(|scope| {
                let handles: Vec<_> = self
                    .controllers
                    .iter_mut()
                    .enumerate()
                    .map(|(player, controller)| {
                        scope.spawn(move || controller.initialize(player as PlayerId, map))
                    })
                    .collect();
                for handle in handles {
                    results.push(handle.join().unwrap_or(PlayerResponse::TimedOut));
                }
            });
            results
        };
        for (player, response) in init_results.into_iter().enumerate() {
            match response {
                PlayerResponse::Answered { value, elapsed_ms } => {
                    self.player_names[player] = value.chars().take(30).collect();
                    self.init_response_times[player] = elapsed_ms;
                }
                PlayerResponse::TimedOut => {
                    self.kill_player(player as PlayerId);
                    living[player] = false;
                    rankings.push(player as PlayerId);
                }
            }
        }

        let max_turn_number = 100 + (self.map.width * self.map.height).sqrt() as u32;
        tracing::info!(
            players = num_players,
            max_turns = max_turn_number,
            seed = self.seed,
            "game starting"
        );

        while !self.game_complete(&living, max_turn_number) {
            self.turn_number += 1;
            tracing::debug!(turn = self.turn_number, "processing turn");

            let new_living = self.process_next_frame(&living);

            let mut eliminated: Vec<PlayerId> = (0..num_players)
                .filter(|&player| living[player] && !new_living[player])
                .map(|player| player as PlayerId)
                .collect();
            eliminated.sort_by(|&a, &b| self.compare_rankings(a, b));
            rankings.extend(eliminated);

            living = new_living;
        }

        let mut survivors: Vec<PlayerId> = (0..num_players)
            .filter(|&player| living[player])
            .map(|player| player as PlayerId)
            .collect();
        survivors.sort_by(|&a, &b| self.compare_rankings(a, b));
        rankings.extend(survivors);
        rankings.reverse();

        tracing::info!(
            turns = self.turn_number,
            final_fleets = ?self.last_ship_count,
            fleet_health = ?self.last_ship_health_total,
            "game over"
        );

        let mut statistics = GameStatistics {
            timeout_tags: self.timeout_tags.clone(),
            ..GameStatistics::default()
        };
        for player in 0..num_players {
            let rank = rankings
                .iter()
                .position(|&ranked| ranked as usize == player)
                .expect("every player is ranked")
                + 1;
            statistics.player_statistics.push(PlayerStatistics {
                tag: player as PlayerId,
                rank,
                last_frame_alive: self.alive_frame_count[player] as i64 - 2
                    + living[player] as i64,
                init_response_time: self.init_response_times[player],
                average_frame_response_time: self.total_frame_response_times[player] as f64
                    / self.alive_frame_count[player] as f64,
                total_ship_count: self.total_ship_count[player],
                damage_dealt: self.damage_dealt[player],
            });
        }
        Ok(statistics)
    }

    fn game_complete(&self, living: &[bool], max_turn_number: u32) -> bool {
        let num_living = living.iter().filter(|&&alive| alive).count();
        let num_players = living.len();
        self.turn_number >= max_turn_number
            || (num_living <= 1 && num_players > 1)
            || (num_living == 0 && num_players == 1)
    }

    /// Fewer lifetime ships ranks worse; ties break on damage dealt.
    fn compare_rankings(&self, player1: PlayerId, player2: PlayerId) -> Ordering {
        self.total_ship_count[player1 as usize]
            .cmp(&self.total_ship_count[player2 as usize])
            .then(self.damage_dealt[player1 as usize].cmp(&self.damage_dealt[player2 as usize]))
    }

    /// Advance the world one turn. Returns the per-player liveness vector
    /// for the termination check.
    fn process_next_frame(&mut self, alive: &[bool]) -> Vec<bool> {
        for (player, &was_alive) in alive.iter().enumerate() {
            if was_alive {
                self.alive_frame_count[player] += 1;
            }
        }

        self.transcript
            .begin_turn(self.controllers.len(), self.constants.max_queued_moves);

        self.retrieve_moves(alive);
        self.process_docking();

        for move_no in 0..self.constants.max_queued_moves {
            self.process_moves(alive, move_no);
            self.process_events();
            self.process_movement();
        }

        self.process_production();
        self.process_drag();
        self.process_cooldowns();

        self.transcript.snapshot(&self.map);

        self.find_living_players()
    }

    /// Fan out one request per living player and join them all before any
    /// world mutation. A timeout (or a panicking controller) kills the
    /// player on the spot.
    fn retrieve_moves(&mut self, alive: &[bool]) {
        let turn = self.turn_number;
        let micro_steps = self.constants.max_queued_moves;

        let results: Vec<Option<PlayerResponse<MoveQueue>>> = {
            let map = &self.map;
            let mut results = Vec::with_capacity(self.controllers.len());
            std::thread::scope(|scope| {
                let handles: Vec<_> = self
                    .controllers
                    .iter_mut()
                    .enumerate()
                    .map(|(player, controller)| {
                        if alive[player] {
                            Some(scope.spawn(move || {
                                controller.play_turn(player as PlayerId, turn, map)
                            }))
                        } else {
                            None
                        }
                    })
                    .collect();
                for handle in handles {
                    results.push(
                        handle.map(|h| h.join().unwrap_or(PlayerResponse::TimedOut)),
                    );
                }
            });
            results
        };

        for (player, result) in results.into_iter().enumerate() {
            match result {
                Some(PlayerResponse::Answered {
                    value: mut queue,
                    elapsed_ms,
                }) => {
                    self.total_frame_response_times[player] += elapsed_ms as u64;
                    queue.normalize(micro_steps);
                    self.player_moves[player] = queue;
                }
                Some(PlayerResponse::TimedOut) => {
                    self.kill_player(player as PlayerId);
                    self.player_moves[player] = MoveQueue::empty(micro_steps);
                }
                None => {
                    self.player_moves[player] = MoveQueue::empty(micro_steps);
                }
            }
        }
    }

    /// Remove a player from the game: ships dropped with no side effects
    /// (no explosions, no events), planets released. Idempotent.
    pub fn kill_player(&mut self, player: PlayerId) {
        tracing::warn!(player, "killing player");
        self.timeout_tags.insert(player);

        let indices: Vec<EntityIndex> = self.map.ships[player as usize].keys().copied().collect();
        for index in indices {
            self.map.unsafe_kill_entity(EntityId::for_ship(player, index));
        }
        self.map.cleanup_entities();

        for planet in &mut self.map.planets {
            if planet.owned && planet.owner == player {
                planet.owned = false;
                planet.docked_ships.clear();
            }
        }
    }

    /// Advance docking state machines, heal docked ships, and clear last
    /// turn's contention freezes.
    fn process_docking(&mut self) {
        let regeneration = self.constants.docked_ship_regeneration;
        let max_health = self.constants.max_ship_health;

        let ships = &mut self.map.ships;
        let planets = &mut self.map.planets;
        for arena in ships.iter_mut() {
            for (&ship_index, ship) in arena.iter_mut() {
                match ship.docking_status {
                    DockingStatus::Docking => {
                        ship.docking_progress -= 1;
                        if ship.docking_progress == 0 {
                            ship.docking_status = DockingStatus::Docked;
                        }
                    }
                    DockingStatus::Undocking => {
                        ship.docking_progress -= 1;
                        if ship.docking_progress == 0 {
                            ship.docking_status = DockingStatus::Undocked;
                            planets[ship.docked_planet as usize].remove_ship(ship_index);
                        }
                    }
                    DockingStatus::Docked => {
                        ship.heal(regeneration, max_health);
                    }
                    DockingStatus::Undocked => {}
                }
            }
        }

        // Freezes last exactly one turn.
        for planet in planets.iter_mut() {
            planet.frozen = false;
        }
    }

    /// Apply one micro-step's worth of queued moves and record them.
    fn process_moves(&mut self, alive: &[bool], move_no: usize) {
        for player in 0..self.controllers.len() {
            if !alive[player] {
                continue;
            }
            let step: MoveSet = self.player_moves[player].steps[move_no].clone();
            let ship_indices: Vec<EntityIndex> =
                self.map.ships[player].keys().copied().collect();

            for ship_index in ship_indices {
                let Some(&mv) = step.get(&ship_index) else {
                    continue;
                };
                match mv {
                    Move::Noop | Move::Error => {}
                    Move::Thrust { thrust, angle } => {
                        let ship = self.map.get_ship_mut(player as PlayerId, ship_index);
                        if ship.docking_status == DockingStatus::Undocked {
                            ship.velocity
                                .accelerate_by(thrust as f64, (angle as f64).to_radians());
                        }
                    }
                    Move::Dock { planet } => {
                        self.apply_dock(player as PlayerId, ship_index, planet);
                    }
                    Move::Undock => {
                        let dock_turns = self.constants.dock_turns;
                        let ship = self.map.get_ship_mut(player as PlayerId, ship_index);
                        if ship.docking_status == DockingStatus::Docked {
                            ship.docking_status = DockingStatus::Undocking;
                            ship.docking_progress = dock_turns;
                        }
                    }
                }
                self.transcript.record_move(player, move_no, ship_index, mv);
            }
        }
    }

    /// Attempt a dock order. Illegal attempts fail silently; a same-turn
    /// contention between players freezes the planet and voids all claims.
    fn apply_dock(&mut self, player: PlayerId, ship_index: EntityIndex, planet_index: EntityIndex) {
        {
            let ship = self.map.get_ship(player, ship_index);
            if ship.docking_status != DockingStatus::Undocked || !ship.velocity.is_zero() {
                return;
            }
        }
        if planet_index as usize >= self.map.planets.len() {
            // Invalid planet id, ignore.
            return;
        }

        let (planet_alive, frozen, in_range) = {
            let planet = self.map.get_planet(planet_index);
            let ship = self.map.get_ship(player, ship_index);
            (
                planet.is_alive(),
                planet.frozen,
                ship.can_dock(planet, &self.constants),
            )
        };
        if !planet_alive || !in_range || frozen {
            if !in_range {
                tracing::debug!(player, ship = ship_index, "ship too far to dock");
            }
            return;
        }

        {
            let planet = self.map.get_planet_mut(planet_index);
            if !planet.owned {
                planet.owned = true;
                planet.owner = player;
            }
        }

        let (owner, has_spot) = {
            let planet = self.map.get_planet(planet_index);
            (
                planet.owner,
                planet.docked_ships.len() < planet.docking_spots as usize,
            )
        };

        if owner == player && has_spot {
            let dock_turns = self.constants.dock_turns;
            {
                let ship = self.map.get_ship_mut(player, ship_index);
                ship.docked_planet = planet_index;
                ship.docking_status = DockingStatus::Docking;
                ship.docking_progress = dock_turns;
            }
            self.map.get_planet_mut(planet_index).add_ship(ship_index);
        } else if owner != player {
            // If every current occupant started docking this very turn, the
            // players raced for the planet: nobody gets it.
            let dock_turns = self.constants.dock_turns;
            let contested = {
                let planet = self.map.get_planet(planet_index);
                planet.docked_ships.iter().all(|&index| {
                    let occupant = self.map.get_ship(owner, index);
                    occupant.docking_status == DockingStatus::Docking
                        && occupant.docking_progress == dock_turns
                })
            };
            if contested {
                let occupants = self.map.get_planet(planet_index).docked_ships.clone();
                for index in occupants {
                    self.map.get_ship_mut(owner, index).reset_docking_status();
                }
                let planet = self.map.get_planet_mut(planet_index);
                planet.frozen = true;
                planet.docked_ships.clear();
                planet.owned = false;
                planet.owner = 0;
            }
        }
    }

    fn process_events(&mut self) {
        let events = detect_events(&self.map, &self.constants);
        resolve_events(
            &mut self.map,
            &self.constants,
            &events,
            self.transcript.events_mut(),
            &mut self.damage_dealt,
        );
    }

    fn process_movement(&mut self) {
        for arena in self.map.ships.iter_mut() {
            for ship in arena.values_mut() {
                let velocity = ship.velocity;
                ship.location.move_by(&velocity, 1.0);
            }
        }
    }

    /// Accrue production on every producing planet and spawn ships while
    /// the stock covers them. Runs after moves so a bot cannot pre-address
    /// a ship spawned this turn.
    fn process_production(&mut self) {
        for planet_index in 0..self.map.planets.len() as EntityIndex {
            let (owner, num_docked) = {
                let planet = self.map.get_planet(planet_index);
                if !planet.is_alive() || !planet.owned {
                    continue;
                }
                (planet.owner, self.map.count_docked_ships(planet))
            };
            if num_docked == 0 {
                continue;
            }

            {
                let base = self.constants.base_productivity;
                let additional = self.constants.additional_productivity;
                let planet = self.map.get_planet_mut(planet_index);
                let production = planet
                    .remaining_production
                    .min(base + (num_docked as u32 - 1) * additional);
                planet.remaining_production -= production;
                planet.current_production += production;
            }

            let production_per_ship = self.constants.production_per_ship;
            while self.map.get_planet(planet_index).current_production >= production_per_ship {
                let Some(location) = self.find_spawn_site(planet_index) else {
                    // No room; production carries over to a later turn.
                    break;
                };

                self.map.get_planet_mut(planet_index).current_production -= production_per_ship;
                let ship_index = self.map.spawn_ship(location, owner, &self.constants);
                self.total_ship_count[owner as usize] += 1;

                let planet_location = self.map.get_planet(planet_index).location;
                self.transcript.events_mut().push(FrameEvent::Spawn {
                    id: EntityId::for_ship(owner, ship_index),
                    location,
                    planet_location,
                });
                tracing::debug!(player = owner, ship = ship_index, "ship produced");
            }
        }
    }

    /// Scan integer offsets around the planet (pushed out past the crust)
    /// and pick the unoccupied in-bounds site closest to the map center.
    fn find_spawn_site(&self, planet_index: EntityIndex) -> Option<Location> {
        let planet = self.map.get_planet(planet_index);
        let planet_location = planet.location;
        let planet_radius = planet.radius;

        let center = Location::new(self.map.width / 2.0, self.map.height / 2.0);
        let open_radius = self.constants.ship_radius * 2.0;
        let max_delta = self.constants.spawn_radius;

        let mut best: Option<(f64, Location)> = None;
        for dx in -max_delta..=max_delta {
            for dy in -max_delta..=max_delta {
                let offset_angle = (dy as f64).atan2(dx as f64);
                let offset_x = dx as f64 + planet_radius * offset_angle.cos();
                let offset_y = dy as f64 + planet_radius * offset_angle.sin();

                let Some(location) =
                    self.map
                        .location_with_delta(&planet_location, offset_x, offset_y)
                else {
                    continue;
                };

                let distance = location.distance(&center);
                if best.is_none_or(|(best_distance, _)| distance < best_distance)
                    && self.map.test(&location, open_radius).is_empty()
                {
                    best = Some((distance, location));
                }
            }
        }
        best.map(|(_, location)| location)
    }

    /// Decelerate every ship by the drag constant, snapping small
    /// velocities to zero.
    fn process_drag(&mut self) {
        let drag = self.constants.drag;
        for arena in self.map.ships.iter_mut() {
            for ship in arena.values_mut() {
                let magnitude = ship.velocity.magnitude();
                if magnitude <= drag {
                    ship.velocity = crate::geom::Velocity::default();
                } else {
                    let angle = ship.velocity.angle();
                    ship.velocity
                        .accelerate_by(drag, angle + std::f64::consts::PI);
                }
            }
        }
    }

    fn process_cooldowns(&mut self) {
        for arena in self.map.ships.iter_mut() {
            for ship in arena.values_mut() {
                if ship.weapon_cooldown > 0 {
                    ship.weapon_cooldown -= 1;
                }
            }
        }
    }

    /// A player lives while they have a ship. If one player holds every
    /// live planet (with at least one fully docked ship), the game ends in
    /// their favor immediately.
    fn find_living_players(&mut self) -> Vec<bool> {
        let num_players = self.controllers.len();
        let mut still_alive = vec![false; num_players];
        self.last_ship_count = vec![0; num_players];

        for player in 0..num_players {
            for ship in self.map.ships[player].values() {
                still_alive[player] = true;
                self.last_ship_count[player] += 1;
                self.last_ship_health_total[player] += ship.health as u64;
            }
        }

        let mut owned_planets = vec![0usize; num_players];
        let mut total_planets = 0usize;
        for planet in &self.map.planets {
            if !planet.is_alive() {
                continue;
            }
            total_planets += 1;
            if planet.owned
                && !planet.docked_ships.is_empty()
                && self.map.count_docked_ships(planet) > 0
            {
                owned_planets[planet.owner as usize] += 1;
            }
        }

        for player in 0..num_players {
            if owned_planets[player] == total_planets {
                // Domination: everyone else is done this frame.
                for flag in still_alive.iter_mut() {
                    *flag = false;
                }
                if num_players > 1 {
                    still_alive[player] = true;
                }
            }
        }
        still_alive
    }
}
