//! Replay artifact assembly and output.
//!
//! Consumes a finished [`Transcript`](super::Transcript) and the game's
//! statistics and emits one JSON document: a header that never changes
//! between frames, per-frame ship/planet/event records, and the applied
//! moves (which have no entry for the final frame).

use std::path::Path;

use serde_json::{json, Map as JsonMap, Value};

use crate::core::config::GameConstants;
use crate::core::error::Result;
use crate::engine::stats::GameStatistics;
use crate::players::Move;
use crate::replay::Transcript;
use crate::world::entity::{DockingStatus, Planet, Ship};
use crate::world::map::GameMap;

pub const REPLAY_VERSION: u32 = 31;

/// Immutable game-level facts for the artifact header.
pub struct ReplayHeader<'a> {
    pub seed: u64,
    pub map_generator: &'a str,
    pub player_names: &'a [String],
    pub constants: &'a GameConstants,
    pub points_of_interest: Value,
}

fn docking_status_str(status: DockingStatus) -> &'static str {
    match status {
        DockingStatus::Undocked => "undocked",
        DockingStatus::Docking => "docking",
        DockingStatus::Docked => "docked",
        DockingStatus::Undocking => "undocking",
    }
}

fn ship_json(ship: &Ship) -> Value {
    let mut docking = JsonMap::new();
    docking.insert(
        "status".into(),
        json!(docking_status_str(ship.docking_status)),
    );
    if ship.docking_status != DockingStatus::Undocked {
        docking.insert("planet_id".into(), json!(ship.docked_planet));
        docking.insert("turns_left".into(), json!(ship.docking_progress));
    }
    json!({
        "health": ship.health,
        "x": ship.location.x,
        "y": ship.location.y,
        "vel_x": ship.velocity.vx,
        "vel_y": ship.velocity.vy,
        "cooldown": ship.weapon_cooldown,
        "docking": Value::Object(docking),
    })
}

fn planet_json(planet: &Planet) -> Value {
    json!({
        "health": planet.health,
        "docked_ships": planet.docked_ships,
        "current_production": planet.current_production,
        "remaining_production": planet.remaining_production,
        "owner": if planet.owned { json!(planet.owner) } else { Value::Null },
    })
}

fn move_json(mv: &Move, ship: u32, micro_step: usize) -> Value {
    match mv {
        Move::Thrust { thrust, angle } => json!({
            "type": "thrust",
            "shipId": ship,
            "queue_number": micro_step,
            "magnitude": thrust,
            "angle": angle,
        }),
        Move::Dock { planet } => json!({
            "type": "dock",
            "shipId": ship,
            "queue_number": micro_step,
            "planet_id": planet,
        }),
        Move::Undock => json!({
            "type": "undock",
            "shipId": ship,
            "queue_number": micro_step,
        }),
        Move::Noop | Move::Error => Value::Null,
    }
}

fn frame_json(map: &GameMap) -> Value {
    let mut ships = JsonMap::new();
    for (player, arena) in map.ships.iter().enumerate() {
        let mut player_ships = JsonMap::new();
        for (index, ship) in arena {
            player_ships.insert(index.to_string(), ship_json(ship));
        }
        ships.insert(player.to_string(), Value::Object(player_ships));
    }

    let mut planets = JsonMap::new();
    for (index, planet) in map.planets.iter().enumerate() {
        if !planet.is_alive() {
            continue;
        }
        planets.insert(index.to_string(), planet_json(planet));
    }

    json!({
        "ships": Value::Object(ships),
        "planets": Value::Object(planets),
    })
}

/// Assemble the whole artifact in memory.
pub fn build_replay(
    header: &ReplayHeader<'_>,
    transcript: &Transcript,
    stats: &GameStatistics,
) -> Result<Value> {
    let initial_map = transcript
        .frames
        .first()
        .expect("transcript holds at least the initial frame");

    let initial_planets: Vec<Value> = initial_map
        .planets
        .iter()
        .enumerate()
        .map(|(index, planet)| {
            json!({
                "id": index,
                "x": planet.location.x,
                "y": planet.location.y,
                "r": planet.radius,
                "health": planet.health,
                "docking_spots": planet.docking_spots,
                "production": planet.remaining_production,
            })
        })
        .collect();

    let mut frames: Vec<Value> = transcript.frames.iter().map(frame_json).collect();
    for (frame_index, events) in transcript.frame_events.iter().enumerate() {
        let records: Vec<Value> = events.iter().map(|event| event.serialize()).collect();
        frames[frame_index]["events"] = Value::Array(records);
    }

    let mut moves: Vec<Value> = Vec::with_capacity(transcript.moves.len());
    for turn_moves in &transcript.moves {
        let mut frame_moves = JsonMap::new();
        for (player, player_steps) in turn_moves.iter().enumerate() {
            let mut all_steps: Vec<Value> = Vec::with_capacity(player_steps.len());
            for (micro_step, move_set) in player_steps.iter().enumerate() {
                let mut step = JsonMap::new();
                for (&ship, mv) in move_set {
                    if matches!(mv, Move::Noop | Move::Error) {
                        continue;
                    }
                    step.insert(ship.to_string(), move_json(mv, ship, micro_step));
                }
                all_steps.push(Value::Object(step));
            }
            frame_moves.insert(player.to_string(), Value::Array(all_steps));
        }
        moves.push(Value::Object(frame_moves));
    }

    Ok(json!({
        "version": REPLAY_VERSION,
        "seed": header.seed,
        "map_generator": header.map_generator,
        "width": initial_map.width,
        "height": initial_map.height,
        "num_players": header.player_names.len(),
        "num_frames": transcript.frames.len(),
        "player_names": header.player_names,
        "constants": serde_json::to_value(header.constants)?,
        "planets": initial_planets,
        "poi": header.points_of_interest,
        "stats": serde_json::to_value(stats)?,
        "frames": frames,
        "moves": moves,
    }))
}

/// Write the artifact to disk as plain JSON.
pub fn write_replay(
    path: &Path,
    header: &ReplayHeader<'_>,
    transcript: &Transcript,
    stats: &GameStatistics,
) -> Result<()> {
    let artifact = build_replay(header, transcript, stats)?;
    std::fs::write(path, serde_json::to_string(&artifact)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GameConstants;
    use crate::geom::Location;

    fn tiny_transcript() -> (Transcript, GameConstants) {
        let constants = GameConstants::default();
        let mut map = GameMap::new(120.0, 80.0, 2);
        map.add_planet(Planet::new(Location::new(60.0, 40.0), 6.0, 2, 1500, 1500));
        map.spawn_ship(Location::new(20.0, 40.0), 0, &constants);
        map.spawn_ship(Location::new(100.0, 40.0), 1, &constants);

        let mut transcript = Transcript::new();
        transcript.snapshot(&map);
        transcript.begin_turn(2, 1);
        transcript.record_move(0, 0, 0, Move::Thrust { thrust: 7, angle: 0 });
        transcript.record_move(1, 0, 0, Move::Noop);
        transcript.snapshot(&map);
        (transcript, constants)
    }

    #[test]
    fn test_artifact_shape() {
        let (transcript, constants) = tiny_transcript();
        let names = vec!["alpha".to_string(), "beta".to_string()];
        let header = ReplayHeader {
            seed: 42,
            map_generator: "solar",
            player_names: &names,
            constants: &constants,
            points_of_interest: Value::Array(Vec::new()),
        };
        let stats = GameStatistics::default();
        let artifact = build_replay(&header, &transcript, &stats).unwrap();

        assert_eq!(artifact["version"], REPLAY_VERSION);
        assert_eq!(artifact["num_frames"], 2);
        assert_eq!(artifact["frames"].as_array().unwrap().len(), 2);
        // Moves exist for every turn but not the trailing frame.
        assert_eq!(artifact["moves"].as_array().unwrap().len(), 1);
        assert_eq!(artifact["planets"][0]["r"], 6.0);
    }

    #[test]
    fn test_noop_moves_are_omitted() {
        let (transcript, constants) = tiny_transcript();
        let names = vec!["alpha".to_string(), "beta".to_string()];
        let header = ReplayHeader {
            seed: 42,
            map_generator: "solar",
            player_names: &names,
            constants: &constants,
            points_of_interest: Value::Array(Vec::new()),
        };
        let stats = GameStatistics::default();
        let artifact = build_replay(&header, &transcript, &stats).unwrap();

        let player0_moves = &artifact["moves"][0]["0"][0];
        assert!(player0_moves.get("0").is_some());
        let player1_moves = &artifact["moves"][0]["1"][0];
        assert!(player1_moves.as_object().unwrap().is_empty());
    }
}
