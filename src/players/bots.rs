//! In-process controllers: a do-nothing baseline, a scripted harness for
//! tests, and a simple settler so the binary can run full games without
//! external processes.

use std::collections::VecDeque;

use crate::core::config::GameConstants;
use crate::core::types::PlayerId;
use crate::geom::Location;
use crate::players::{Move, MoveQueue, MoveSet, PlayerController, PlayerResponse};
use crate::world::entity::DockingStatus;
use crate::world::map::GameMap;

/// Answers every turn with empty queues.
pub struct IdleController {
    pub name: String,
}

impl IdleController {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl PlayerController for IdleController {
    fn initialize(&mut self, _player: PlayerId, _map: &GameMap) -> PlayerResponse<String> {
        PlayerResponse::Answered {
            value: self.name.clone(),
            elapsed_ms: 1,
        }
    }

    fn play_turn(
        &mut self,
        _player: PlayerId,
        _turn: u32,
        map: &GameMap,
    ) -> PlayerResponse<MoveQueue> {
        let _ = map;
        PlayerResponse::Answered {
            value: MoveQueue::default(),
            elapsed_ms: 1,
        }
    }
}

/// Replays a pre-built sequence of move queues, then idles. Turns after the
/// script runs out answer with empty queues. Used by the integration tests
/// to drive exact scenarios.
pub struct ScriptedController {
    pub name: String,
    script: VecDeque<MoveQueue>,
    /// When set, the controller times out on this (1-based) turn.
    timeout_on_turn: Option<u32>,
}

impl ScriptedController {
    pub fn new(name: impl Into<String>, script: Vec<MoveQueue>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            timeout_on_turn: None,
        }
    }

    pub fn with_timeout_on(mut self, turn: u32) -> Self {
        self.timeout_on_turn = Some(turn);
        self
    }
}

impl PlayerController for ScriptedController {
    fn initialize(&mut self, _player: PlayerId, _map: &GameMap) -> PlayerResponse<String> {
        PlayerResponse::Answered {
            value: self.name.clone(),
            elapsed_ms: 1,
        }
    }

    fn play_turn(
        &mut self,
        _player: PlayerId,
        turn: u32,
        _map: &GameMap,
    ) -> PlayerResponse<MoveQueue> {
        if self.timeout_on_turn == Some(turn) {
            return PlayerResponse::TimedOut;
        }
        PlayerResponse::Answered {
            value: self.script.pop_front().unwrap_or_default(),
            elapsed_ms: 1,
        }
    }
}

/// Steers every undocked ship toward the nearest planet with a free docking
/// spot and docks on arrival. No combat; it exists to exercise the full
/// docking and production pipeline.
pub struct SettlerController {
    pub name: String,
    constants: GameConstants,
}

impl SettlerController {
    pub fn new(name: impl Into<String>, constants: GameConstants) -> Self {
        Self {
            name: name.into(),
            constants,
        }
    }

    fn nearest_open_planet(&self, player: PlayerId, from: &Location, map: &GameMap) -> Option<u32> {
        let mut best: Option<(f64, u32)> = None;
        for (index, planet) in map.planets.iter().enumerate() {
            if !planet.is_alive() || planet.frozen {
                continue;
            }
            if planet.owned && planet.owner != player {
                continue;
            }
            if planet.docked_ships.len() >= planet.docking_spots as usize {
                continue;
            }
            let distance = from.distance(&planet.location);
            if best.is_none_or(|(best_distance, _)| distance < best_distance) {
                best = Some((distance, index as u32));
            }
        }
        best.map(|(_, index)| index)
    }
}

impl PlayerController for SettlerController {
    fn initialize(&mut self, _player: PlayerId, _map: &GameMap) -> PlayerResponse<String> {
        PlayerResponse::Answered {
            value: self.name.clone(),
            elapsed_ms: 1,
        }
    }

    fn play_turn(
        &mut self,
        player: PlayerId,
        _turn: u32,
        map: &GameMap,
    ) -> PlayerResponse<MoveQueue> {
        let mut moves = MoveSet::new();

        for (&index, ship) in &map.ships[player as usize] {
            if ship.docking_status != DockingStatus::Undocked {
                continue;
            }
            let Some(planet_index) = self.nearest_open_planet(player, &ship.location, map) else {
                continue;
            };
            let planet = map.get_planet(planet_index);

            if ship.velocity.is_zero() && ship.can_dock(planet, &self.constants) {
                moves.insert(index, Move::Dock { planet: planet_index });
                continue;
            }

            let distance = ship.location.distance(&planet.location);
            let gap = distance - planet.radius - self.constants.dock_radius;
            if gap <= 0.0 {
                continue;
            }
            let thrust = gap.min(7.0).ceil().min(7.0) as i32;
            let dx = planet.location.x - ship.location.x;
            let dy = planet.location.y - ship.location.y;
            let angle = dy.atan2(dx).to_degrees().round() as i32;
            moves.insert(index, Move::Thrust { thrust, angle });
        }

        PlayerResponse::Answered {
            value: MoveQueue::single(moves),
            elapsed_ms: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::entity::Planet;

    #[test]
    fn test_settler_docks_when_in_range_and_still() {
        let constants = GameConstants::default();
        let mut map = GameMap::new(240.0, 160.0, 1);
        map.add_planet(Planet::new(Location::new(100.0, 80.0), 6.0, 2, 2000, 2000));
        map.spawn_ship(Location::new(108.0, 80.0), 0, &constants);

        let mut bot = SettlerController::new("settler", constants);
        let PlayerResponse::Answered { value, .. } = bot.play_turn(0, 1, &map) else {
            panic!("settler timed out");
        };
        assert_eq!(value.steps[0].get(&0), Some(&Move::Dock { planet: 0 }));
    }

    #[test]
    fn test_settler_thrusts_toward_distant_planet() {
        let constants = GameConstants::default();
        let mut map = GameMap::new(240.0, 160.0, 1);
        map.add_planet(Planet::new(Location::new(200.0, 80.0), 6.0, 2, 2000, 2000));
        map.spawn_ship(Location::new(20.0, 80.0), 0, &constants);

        let mut bot = SettlerController::new("settler", constants);
        let PlayerResponse::Answered { value, .. } = bot.play_turn(0, 1, &map) else {
            panic!("settler timed out");
        };
        match value.steps[0].get(&0) {
            Some(Move::Thrust { thrust, angle }) => {
                assert_eq!(*thrust, 7);
                assert_eq!(*angle, 0);
            }
            other => panic!("expected thrust, got {:?}", other),
        }
    }

    #[test]
    fn test_scripted_controller_times_out_on_cue() {
        let mut bot = ScriptedController::new("scripted", Vec::new()).with_timeout_on(3);
        let map = GameMap::new(100.0, 100.0, 1);
        assert!(matches!(bot.play_turn(0, 1, &map), PlayerResponse::Answered { .. }));
        assert!(matches!(bot.play_turn(0, 2, &map), PlayerResponse::Answered { .. }));
        assert!(matches!(bot.play_turn(0, 3, &map), PlayerResponse::TimedOut));
    }
}
