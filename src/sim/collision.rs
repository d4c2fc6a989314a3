//! Closed-form time-to-contact between moving disks.

use crate::geom::{Location, Velocity};
use crate::world::entity::{Planet, Ship};

/// Earliest `t` at which two points, moving linearly, reach separation `r`.
///
/// Solves `a t^2 + b t + c = 0` for the relative motion. The branch
/// structure below is observable in replays and must not be "cleaned up":
/// with a double root the single solution is returned even when negative,
/// and with two negative roots the larger is returned (still negative).
/// Callers filter to `0 <= t <= 1`; `None` means the separation is never
/// reached.
pub fn collision_time(
    r: f64,
    loc1: &Location,
    loc2: &Location,
    vel1: &Velocity,
    vel2: &Velocity,
) -> Option<f64> {
    let dx = loc1.x - loc2.x;
    let dy = loc1.y - loc2.y;
    let dvx = vel1.vx - vel2.vx;
    let dvy = vel1.vy - vel2.vy;

    let a = dvx * dvx + dvy * dvy;
    let b = 2.0 * (dx * dvx + dy * dvy);
    let c = dx * dx + dy * dy - r * r;

    if a == 0.0 {
        if b == 0.0 {
            if c <= 0.0 {
                // Already within r of each other.
                return Some(0.0);
            }
            return None;
        }
        let t = -c / b;
        if t >= 0.0 {
            return Some(t);
        }
        return None;
    }

    let disc = b * b - 4.0 * a * c;
    if disc == 0.0 {
        return Some(-b / (2.0 * a));
    }
    if disc > 0.0 {
        let t1 = -b + disc.sqrt();
        let t2 = -b - disc.sqrt();

        if t1 >= 0.0 && t2 >= 0.0 {
            return Some(t1.min(t2) / (2.0 * a));
        }
        return Some(t1.max(t2) / (2.0 * a));
    }
    None
}

pub fn collision_time_ships(r: f64, ship1: &Ship, ship2: &Ship) -> Option<f64> {
    collision_time(r, &ship1.location, &ship2.location, &ship1.velocity, &ship2.velocity)
}

pub fn collision_time_planet(r: f64, ship: &Ship, planet: &Planet) -> Option<f64> {
    collision_time(
        r,
        &ship.location,
        &planet.location,
        &ship.velocity,
        &Velocity::default(),
    )
}

/// Quantize an event time so simultaneity is decidable by bit equality.
pub fn round_event_time(t: f64, precision: u32) -> f64 {
    (t * precision as f64).round() / precision as f64
}
