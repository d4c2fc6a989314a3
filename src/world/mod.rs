//! World model: entities and the map arena that owns them.

pub mod entity;
pub mod map;

pub use entity::{DockingStatus, Planet, Ship};
pub use map::{EntityRef, GameMap};
