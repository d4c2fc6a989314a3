//! The player seam: structured moves in, read-only snapshots out.
//!
//! The engine never parses anything. A `PlayerController` (normally a proxy
//! for an external bot process) answers each turn with a queue of structured
//! moves and how long it took, or reports a timeout. Controllers only ever
//! see shared borrows of the map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityIndex, PlayerId};
use crate::world::map::GameMap;

pub mod bots;

/// One order for one ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Move {
    Noop,
    /// Integer thrust magnitude along an integer heading in degrees.
    Thrust { thrust: i32, angle: i32 },
    Dock { planet: EntityIndex },
    Undock,
    /// Produced by the transport layer for unparseable input; ignored.
    Error,
}

/// Orders for one micro-step, keyed by ship index.
pub type MoveSet = BTreeMap<EntityIndex, Move>;

/// A full turn's orders: one `MoveSet` per micro-step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveQueue {
    pub steps: Vec<MoveSet>,
}

impl MoveQueue {
    pub fn empty(micro_steps: usize) -> Self {
        Self {
            steps: vec![MoveSet::new(); micro_steps],
        }
    }

    /// Force the queue to exactly `micro_steps` entries, dropping extras and
    /// padding shortfalls with empty sets.
    pub fn normalize(&mut self, micro_steps: usize) {
        self.steps.resize(micro_steps, MoveSet::new());
    }

    /// Convenience for single-micro-step rulesets.
    pub fn single(moves: MoveSet) -> Self {
        Self { steps: vec![moves] }
    }
}

/// Outcome of one exchange with a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerResponse<T> {
    Answered { value: T, elapsed_ms: u32 },
    TimedOut,
}

/// The contract between the engine and whatever drives a player.
///
/// `initialize` runs once before turn 1 and returns the player's name;
/// `play_turn` runs once per turn. A `TimedOut` answer from either kills the
/// player. Calls for different players may run concurrently, so
/// implementations must be `Send`; the engine joins all calls before
/// touching the world.
pub trait PlayerController: Send {
    fn initialize(&mut self, player: PlayerId, map: &GameMap) -> PlayerResponse<String>;

    fn play_turn(&mut self, player: PlayerId, turn: u32, map: &GameMap)
        -> PlayerResponse<MoveQueue>;
}
