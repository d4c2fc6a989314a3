//! Core identifier types used throughout the engine.

use serde::{Deserialize, Serialize};

/// Player slot, `0..N-1`. Doubles as the index into per-player tables.
pub type PlayerId = u8;

/// Arena index of a ship or planet. Stable for the lifetime of the entity
/// and never reused within a game.
pub type EntityIndex = u32;

/// Tagged handle to an entity in the map arena.
///
/// Ship handles carry their owning player so the resolver can credit damage
/// and look the ship up without a reverse index. `Invalid` exists so code
/// holding a reference that failed validation has something to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    Ship { player: PlayerId, index: EntityIndex },
    Planet { index: EntityIndex },
    Invalid,
}

impl EntityId {
    pub fn for_ship(player: PlayerId, index: EntityIndex) -> Self {
        EntityId::Ship { player, index }
    }

    pub fn for_planet(index: EntityIndex) -> Self {
        EntityId::Planet { index }
    }

    pub fn is_ship(&self) -> bool {
        matches!(self, EntityId::Ship { .. })
    }

    pub fn is_planet(&self) -> bool {
        matches!(self, EntityId::Planet { .. })
    }

    /// Owning player of a ship handle.
    ///
    /// Only ship handles reach the call sites (the resolver filters event
    /// endpoints first), so anything else is an engine bug and aborts.
    pub fn player(&self) -> PlayerId {
        match self {
            EntityId::Ship { player, .. } => *player,
            other => panic!("player() on non-ship entity id {:?}", other),
        }
    }

    /// Arena index of the entity. Aborts on `Invalid`.
    pub fn index(&self) -> EntityIndex {
        match self {
            EntityId::Ship { index, .. } | EntityId::Planet { index } => *index,
            EntityId::Invalid => panic!("index() on invalid entity id"),
        }
    }
}
