//! Transcript recording.
//!
//! The engine pushes one map snapshot, one frame-event bucket and one
//! applied-moves record per turn; nothing in here interprets them. The
//! external artifact format lives in [`writer`].

use serde_json::{json, Value};

use crate::core::types::EntityId;
use crate::geom::Location;
use crate::players::{Move, MoveSet};
use crate::world::map::GameMap;

pub mod writer;

/// A notable occurrence within one frame, recorded for the replay.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    Destroyed {
        id: EntityId,
        location: Location,
        radius: f64,
        time: f64,
    },
    Attack {
        attacker: EntityId,
        location: Location,
        time: f64,
        /// Parallel arrays: `targets[i]` was at `target_locations[i]`.
        targets: Vec<EntityId>,
        target_locations: Vec<Location>,
    },
    Spawn {
        id: EntityId,
        location: Location,
        planet_location: Location,
    },
}

fn entity_json(id: &EntityId) -> Value {
    match id {
        EntityId::Ship { player, index } => json!({
            "type": "ship",
            "owner": player,
            "id": index,
        }),
        EntityId::Planet { index } => json!({
            "type": "planet",
            "id": index,
        }),
        EntityId::Invalid => Value::Null,
    }
}

impl FrameEvent {
    /// Single serialization dispatch for all variants.
    pub fn serialize(&self) -> Value {
        match self {
            FrameEvent::Destroyed {
                id,
                location,
                radius,
                time,
            } => json!({
                "event": "destroyed",
                "entity": entity_json(id),
                "x": location.x,
                "y": location.y,
                "radius": radius,
                "time": time,
            }),
            FrameEvent::Attack {
                attacker,
                location,
                time,
                targets,
                target_locations,
            } => json!({
                "event": "attack",
                "entity": entity_json(attacker),
                "x": location.x,
                "y": location.y,
                "time": time,
                "targets": targets.iter().map(entity_json).collect::<Vec<_>>(),
                "target_locations": target_locations
                    .iter()
                    .map(|loc| json!([loc.x, loc.y]))
                    .collect::<Vec<_>>(),
            }),
            FrameEvent::Spawn {
                id,
                location,
                planet_location,
            } => json!({
                "event": "spawned",
                "entity": entity_json(id),
                "x": location.x,
                "y": location.y,
                "planet_x": planet_location.x,
                "planet_y": planet_location.y,
            }),
        }
    }
}

/// The full record of a game, in simulation order.
///
/// `frames` holds one snapshot per turn plus the initial state, so it is one
/// longer than `frame_events` and `moves`.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub frames: Vec<GameMap>,
    pub frame_events: Vec<Vec<FrameEvent>>,
    /// `moves[turn][player][micro_step]` maps ship index to applied move.
    pub moves: Vec<Vec<Vec<MoveSet>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the buckets for a new turn.
    pub fn begin_turn(&mut self, num_players: usize, micro_steps: usize) {
        self.frame_events.push(Vec::new());
        self.moves
            .push(vec![vec![MoveSet::new(); micro_steps]; num_players]);
    }

    /// Event bucket of the turn in progress.
    pub fn events_mut(&mut self) -> &mut Vec<FrameEvent> {
        self.frame_events
            .last_mut()
            .expect("begin_turn must run before events are recorded")
    }

    pub fn record_move(&mut self, player: usize, micro_step: usize, ship: u32, mv: Move) {
        let turn = self
            .moves
            .last_mut()
            .expect("begin_turn must run before moves are recorded");
        turn[player][micro_step].insert(ship, mv);
    }

    pub fn snapshot(&mut self, map: &GameMap) {
        self.frames.push(map.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GameConstants;

    #[test]
    fn test_transcript_shape() {
        let constants = GameConstants::default();
        let mut map = GameMap::new(100.0, 100.0, 2);
        map.spawn_ship(Location::new(10.0, 10.0), 0, &constants);

        let mut transcript = Transcript::new();
        transcript.snapshot(&map);
        for _ in 0..3 {
            transcript.begin_turn(2, 1);
            transcript.record_move(0, 0, 0, Move::Undock);
            transcript.snapshot(&map);
        }

        assert_eq!(transcript.frames.len(), 4);
        assert_eq!(transcript.frame_events.len(), 3);
        assert_eq!(transcript.moves.len(), 3);
        assert_eq!(transcript.moves[0][0][0].len(), 1);
        assert!(transcript.moves[0][1][0].is_empty());
    }

    #[test]
    fn test_event_serialization_tags() {
        let destroyed = FrameEvent::Destroyed {
            id: EntityId::for_ship(1, 4),
            location: Location::new(3.0, 4.0),
            radius: 0.5,
            time: 0.25,
        };
        let value = destroyed.serialize();
        assert_eq!(value["event"], "destroyed");
        assert_eq!(value["entity"]["type"], "ship");
        assert_eq!(value["entity"]["owner"], 1);
        assert_eq!(value["time"], 0.25);

        let spawn = FrameEvent::Spawn {
            id: EntityId::for_ship(0, 9),
            location: Location::new(1.0, 2.0),
            planet_location: Location::new(5.0, 6.0),
        };
        assert_eq!(spawn.serialize()["event"], "spawned");
    }

    #[test]
    fn test_attack_serialization_keeps_parallel_arrays() {
        let attack = FrameEvent::Attack {
            attacker: EntityId::for_ship(0, 1),
            location: Location::new(0.0, 0.0),
            time: 0.0,
            targets: vec![EntityId::for_ship(1, 2), EntityId::for_ship(1, 3)],
            target_locations: vec![Location::new(4.0, 0.0), Location::new(0.0, 4.0)],
        };
        let value = attack.serialize();
        assert_eq!(value["targets"].as_array().unwrap().len(), 2);
        assert_eq!(value["target_locations"].as_array().unwrap().len(), 2);
        assert_eq!(value["target_locations"][1][1], 4.0);
    }
}
