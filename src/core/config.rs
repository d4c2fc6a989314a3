//! Game balance constants with documented defaults.
//!
//! The constants record is built once at startup and threaded through the
//! engine's constructors; nothing reads a global. Every value can be
//! overridden from a TOML file, so partial files overlay the defaults.

use serde::{Deserialize, Serialize};

/// Tunable rules of the game.
///
/// The defaults reproduce the standard competitive ruleset. Changing them is
/// supported but changes replay semantics, so the full record is embedded in
/// every replay header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConstants {
    /// Initial and maximum ship hit points.
    pub max_ship_health: u16,

    /// Collision radius of every ship (world units).
    pub ship_radius: f64,

    /// Extra reach added on top of the hull radii when testing for attacks.
    pub weapon_radius: f64,

    /// Total damage budget an attacker spends per resolution batch. Split
    /// evenly across all of its targets in that batch.
    pub weapon_damage: u32,

    /// Turns a ship must wait after firing before it can fire again.
    pub weapon_cooldown: u32,

    /// Per-turn deceleration magnitude. Velocities at or below this snap to
    /// zero instead of overshooting past it.
    pub drag: f64,

    /// Turns a dock or undock transition takes to complete.
    pub dock_turns: u32,

    /// Distance beyond the planet's crust from which docking is allowed.
    pub dock_radius: f64,

    /// Hit points regained per turn while docked.
    pub docked_ship_regeneration: u16,

    /// Production contributed by the first docked ship each turn.
    pub base_productivity: u32,

    /// Production contributed by each docked ship after the first.
    pub additional_productivity: u32,

    /// Accumulated production required to spawn one ship.
    pub production_per_ship: u32,

    /// Half-extent of the integer offset scan when searching for a spawn
    /// site around a producing planet.
    pub spawn_radius: i32,

    /// Extent of the area explosion past the crust when a planet dies.
    pub explosion_radius: f64,

    /// Micro-steps simulated per turn. The current ruleset uses 1, but the
    /// inner loop honors any value.
    pub max_queued_moves: usize,

    /// Event-time quantization divisor. Two events are simultaneous iff
    /// their times rounded to `1/precision` are bitwise equal.
    pub event_time_precision: u32,

    /// Broadphase grid cell size. Must be at least `2 * ship_radius` plus
    /// the largest velocity magnitude a ship can reach, so that a one-cell
    /// spill covers every candidate pair.
    pub cell_size: f64,
}

impl Default for GameConstants {
    fn default() -> Self {
        Self {
            max_ship_health: 255,
            ship_radius: 0.5,
            weapon_radius: 5.0,
            weapon_damage: 64,
            weapon_cooldown: 1,
            drag: 10.0,
            dock_turns: 5,
            dock_radius: 4.0,
            docked_ship_regeneration: 0,
            base_productivity: 6,
            additional_productivity: 6,
            production_per_ship: 72,
            spawn_radius: 2,
            explosion_radius: 10.0,
            max_queued_moves: 1,
            event_time_precision: 10000,
            cell_size: 8.0,
        }
    }
}

impl GameConstants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) TOML document over the defaults.
    pub fn from_toml_str(text: &str) -> crate::core::error::Result<Self> {
        let constants: GameConstants = toml::from_str(text)?;
        Ok(constants)
    }

    /// Check the record for internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.cell_size <= 0.0 {
            return Err("cell_size must be positive".into());
        }
        if self.cell_size < 2.0 * self.ship_radius {
            return Err(format!(
                "cell_size ({}) must be >= 2 * ship_radius ({})",
                self.cell_size,
                2.0 * self.ship_radius
            ));
        }
        if self.max_queued_moves == 0 {
            return Err("max_queued_moves must be at least 1".into());
        }
        if self.event_time_precision == 0 {
            return Err("event_time_precision must be at least 1".into());
        }
        if self.production_per_ship == 0 {
            return Err("production_per_ship must be positive".into());
        }
        if self.dock_turns == 0 {
            return Err("dock_turns must be at least 1".into());
        }
        if self.max_ship_health == 0 {
            return Err("max_ship_health must be positive".into());
        }
        if self.ship_radius <= 0.0 {
            return Err("ship_radius must be positive".into());
        }
        if self.drag < 0.0 || self.weapon_radius < 0.0 || self.explosion_radius < 0.0 {
            return Err("radii and drag must be non-negative".into());
        }
        if self.spawn_radius < 0 {
            return Err("spawn_radius must be non-negative".into());
        }
        Ok(())
    }
}
