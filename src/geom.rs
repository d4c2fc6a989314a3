//! Continuous-space geometry primitives.
//!
//! Positions and velocities are plain `f64` pairs. All of the engine's
//! determinism rests on these operations being evaluated the same way on
//! every run, so they stay as straightforward arithmetic with no epsilon
//! tricks.

use serde::{Deserialize, Serialize};

/// A point in the map plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Location) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Advance this point along a velocity for `time` seconds.
    pub fn move_by(&mut self, velocity: &Velocity, time: f64) {
        self.x += velocity.vx * time;
        self.y += velocity.vy * time;
    }

    /// The location reached after travelling along `velocity` for `time`.
    pub fn after(&self, velocity: &Velocity, time: f64) -> Location {
        let mut moved = *self;
        moved.move_by(velocity, time);
        moved
    }
}

/// A velocity in the map plane, in units per turn.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
}

impl Velocity {
    pub fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    pub fn magnitude(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    /// Heading in radians, measured from the positive x axis.
    pub fn angle(&self) -> f64 {
        self.vy.atan2(self.vx)
    }

    /// Add an acceleration of the given magnitude along `angle_rad`.
    pub fn accelerate_by(&mut self, thrust: f64, angle_rad: f64) {
        self.vx += thrust * angle_rad.cos();
        self.vy += thrust * angle_rad.sin();
    }

    pub fn is_zero(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0
    }
}
