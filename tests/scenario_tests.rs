//! End-to-end scenarios through the public engine API.

use serde_json::Value;

use voidclash::core::config::GameConstants;
use voidclash::core::types::PlayerId;
use voidclash::engine::Game;
use voidclash::geom::Location;
use voidclash::players::bots::{IdleController, ScriptedController};
use voidclash::players::{Move, MoveQueue, MoveSet, PlayerController};
use voidclash::replay::FrameEvent;
use voidclash::world::entity::Planet;
use voidclash::world::map::GameMap;

fn single_move(ship: u32, mv: Move) -> MoveQueue {
    let mut set = MoveSet::new();
    set.insert(ship, mv);
    MoveQueue::single(set)
}

fn new_game(
    constants: GameConstants,
    map: GameMap,
    controllers: Vec<Box<dyn PlayerController>>,
) -> Game {
    Game::new(constants, map, 1, "test", Value::Array(Vec::new()), controllers)
        .expect("valid game setup")
}

#[test]
fn test_head_on_collision_destroys_both_ships() {
    // Enemy ships 40 apart thrust straight at each other at 7/turn. They
    // close 14 per turn and meet mid-frame on turn 3 at t = 11/14.
    let mut constants = GameConstants::default();
    constants.weapon_radius = 0.0;

    let mut map = GameMap::new(240.0, 160.0, 2);
    map.spawn_ship(Location::new(100.0, 80.0), 0, &constants);
    map.spawn_ship(Location::new(140.0, 80.0), 1, &constants);

    let east = single_move(0, Move::Thrust { thrust: 7, angle: 0 });
    let west = single_move(0, Move::Thrust { thrust: 7, angle: 180 });
    let controllers: Vec<Box<dyn PlayerController>> = vec![
        Box::new(ScriptedController::new(
            "east",
            vec![east.clone(), east.clone(), east],
        )),
        Box::new(ScriptedController::new(
            "west",
            vec![west.clone(), west.clone(), west],
        )),
    ];

    let mut game = new_game(constants, map, controllers);
    game.run().unwrap();

    assert_eq!(game.turn_number(), 3, "both fleets die on turn 3");
    assert!(game.map().ships.iter().all(|arena| arena.is_empty()));

    // Turns 1 and 2 are quiet; turn 3 carries both destructions.
    let events = &game.transcript().frame_events;
    assert!(events[0].iter().all(|ev| !matches!(ev, FrameEvent::Destroyed { .. })));
    assert!(events[1].iter().all(|ev| !matches!(ev, FrameEvent::Destroyed { .. })));

    let deaths: Vec<_> = events[2]
        .iter()
        .filter_map(|ev| match ev {
            FrameEvent::Destroyed { location, time, .. } => Some((*location, *time)),
            _ => None,
        })
        .collect();
    assert_eq!(deaths.len(), 2);
    for (location, time) in deaths {
        // Deaths sit on the approach line, between the turn-3 start points,
        // at the quantized contact time.
        assert!((location.y - 80.0).abs() < 1e-9);
        assert!(location.x > 114.0 && location.x < 126.0);
        assert!((time - 0.7857).abs() < 1e-9);
    }
}

#[test]
fn test_stationary_standoff_trades_full_damage_until_death() {
    // Two enemies four units apart, in weapon range, neither moving. Each
    // deals its full budget every turn; both fall on turn 4.
    let constants = GameConstants::default();
    let mut map = GameMap::new(240.0, 160.0, 2);
    map.spawn_ship(Location::new(100.0, 80.0), 0, &constants);
    map.spawn_ship(Location::new(104.0, 80.0), 1, &constants);

    let controllers: Vec<Box<dyn PlayerController>> = vec![
        Box::new(IdleController::new("left")),
        Box::new(IdleController::new("right")),
    ];

    let mut game = new_game(constants, map, controllers);
    let stats = game.run().unwrap();

    assert_eq!(game.turn_number(), 4);
    assert!(game.map().ships.iter().all(|arena| arena.is_empty()));
    for player in &stats.player_statistics {
        assert_eq!(player.damage_dealt, 4 * 64);
    }
}

#[test]
fn test_planet_domination_wins_immediately() {
    // Player 0 docks the only planet; once docking completes, the game
    // ends even though player 1 still has a ship.
    let constants = GameConstants::default();
    let mut map = GameMap::new(240.0, 160.0, 2);
    map.add_planet(Planet::new(Location::new(120.0, 80.0), 6.0, 3, 2000, 2000));
    map.spawn_ship(Location::new(112.0, 80.0), 0, &constants);
    map.spawn_ship(Location::new(30.0, 30.0), 1, &constants);

    let dock_turns = constants.dock_turns;
    let controllers: Vec<Box<dyn PlayerController>> = vec![
        Box::new(ScriptedController::new(
            "settler",
            vec![single_move(0, Move::Dock { planet: 0 })],
        )),
        Box::new(IdleController::new("bystander")),
    ];

    let mut game = new_game(constants, map, controllers);
    let stats = game.run().unwrap();

    // One turn to issue the dock, dock_turns ticks to complete it.
    assert_eq!(game.turn_number(), 1 + dock_turns);
    let winner = stats
        .player_statistics
        .iter()
        .find(|player| player.rank == 1)
        .unwrap();
    assert_eq!(winner.tag, 0);
    assert!(stats.timeout_tags.is_empty());
}

#[test]
fn test_timeout_kills_player_and_ends_game() {
    let constants = GameConstants::default();
    let mut map = GameMap::new(240.0, 160.0, 2);
    map.add_planet(Planet::new(Location::new(120.0, 80.0), 6.0, 3, 2000, 2000));
    map.spawn_ship(Location::new(40.0, 80.0), 0, &constants);
    map.spawn_ship(Location::new(200.0, 80.0), 1, &constants);

    let controllers: Vec<Box<dyn PlayerController>> = vec![
        Box::new(IdleController::new("steady")),
        Box::new(ScriptedController::new("flaky", Vec::new()).with_timeout_on(2)),
    ];

    let mut game = new_game(constants, map, controllers);
    let stats = game.run().unwrap();

    assert_eq!(game.turn_number(), 2);
    assert!(stats.timeout_tags.contains(&1));
    assert!(game.map().ships[1].is_empty());
    assert!(!game.map().ships[0].is_empty());

    let ranks: Vec<(PlayerId, usize)> = stats
        .player_statistics
        .iter()
        .map(|player| (player.tag, player.rank))
        .collect();
    assert!(ranks.contains(&(0, 1)));
    assert!(ranks.contains(&(1, 2)));
}

#[test]
fn test_docked_ships_have_zero_velocity_between_turns() {
    // Universal invariant: whatever happens, a non-undocked ship never
    // carries velocity into the next turn.
    let constants = GameConstants::default();
    let mut map = GameMap::new(240.0, 160.0, 2);
    map.add_planet(Planet::new(Location::new(120.0, 80.0), 6.0, 3, 2000, 2000));
    map.spawn_ship(Location::new(112.0, 80.0), 0, &constants);
    map.spawn_ship(Location::new(128.0, 80.0), 1, &constants);

    let controllers: Vec<Box<dyn PlayerController>> = vec![
        Box::new(ScriptedController::new(
            "docker",
            vec![single_move(0, Move::Dock { planet: 0 })],
        )),
        Box::new(IdleController::new("idle")),
    ];

    let mut game = new_game(constants, map, controllers);
    game.run().unwrap();

    let max_health = game.constants().max_ship_health;
    for frame in &game.transcript().frames {
        for arena in &frame.ships {
            for ship in arena.values() {
                assert!(ship.health > 0 && ship.health <= max_health);
                if ship.docking_status != voidclash::world::entity::DockingStatus::Undocked {
                    assert!(ship.velocity.is_zero());
                }
            }
        }
    }
}
