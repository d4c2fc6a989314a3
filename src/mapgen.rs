//! Seeded starting-map generation.
//!
//! The engine treats map generation as an external concern: any layout that
//! satisfies the world invariants works. This generator places a planet
//! cluster around the center and a rotationally symmetric band of planets
//! and starting fleets, so no player is advantaged by geometry.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;

use crate::core::config::GameConstants;
use crate::core::types::PlayerId;
use crate::geom::Location;
use crate::world::entity::Planet;
use crate::world::map::GameMap;

/// A generated starting position plus the metadata the replay header wants.
pub struct GeneratedMap {
    pub map: GameMap,
    pub generator: String,
    pub points_of_interest: Value,
}

fn planet_for(location: Location, radius: f64) -> Planet {
    // Bigger planets hold more ships, more health and more production stock.
    let docking_spots = 2 + (radius / 3.0) as u32;
    let health = (radius * 255.0).min(f64::from(u16::MAX)) as u16;
    let remaining_production = (radius * 144.0) as u32;
    Planet::new(location, radius, docking_spots, health, remaining_production)
}

fn overlaps_any(map: &GameMap, location: &Location, radius: f64, gap: f64) -> bool {
    map.planets
        .iter()
        .any(|planet| planet.location.distance(location) < planet.radius + radius + gap)
}

/// Generate a symmetric solar-system layout with three starting ships per
/// player.
pub fn solar_system(
    constants: &GameConstants,
    width: f64,
    height: f64,
    num_players: usize,
    seed: u64,
) -> GeneratedMap {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut map = GameMap::new(width, height, num_players);

    let center = Location::new(width / 2.0, height / 2.0);
    let extent = width.min(height);
    let sector = std::f64::consts::TAU / num_players as f64;

    // Starting fleet anchors, fixed before planet placement so planets can
    // be kept clear of them.
    let spawn_band = 0.46 * extent;
    let spawn_bases: Vec<Location> = (0..num_players)
        .map(|player| {
            let angle = sector * player as f64;
            Location::new(
                (center.x + spawn_band * angle.cos()).clamp(4.0, width - 4.0),
                (center.y + spawn_band * angle.sin()).clamp(4.0, height - 4.0),
            )
        })
        .collect();

    // Central cluster: a diamond around the middle, never a planet exactly
    // at the center (production sites hug the crust on the center-facing
    // side, which a dead-center planet would not have).
    let cluster_offset = extent / 8.0;
    let cluster_radius = extent / 20.0;
    for (ox, oy) in [(1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)] {
        let location = Location::new(
            center.x + cluster_offset * ox,
            center.y + cluster_offset * oy,
        );
        map.add_planet(planet_for(location, cluster_radius));
    }

    // A band of planets, repeated under rotational symmetry so every player
    // sees the same neighborhood.
    let planets_per_player = 4;
    for _ in 0..planets_per_player {
        let radius = rng.gen_range(3.0..6.0);
        // Rejection-sample an offset that fits in every rotated copy.
        for _attempt in 0..64 {
            let band = rng.gen_range(0.20..0.42) * extent;
            let theta = rng.gen_range(0.0..sector);
            let mut placed = Vec::with_capacity(num_players);
            let mut ok = true;
            for player in 0..num_players {
                let angle = theta + sector * player as f64;
                let location = Location::new(
                    center.x + band * angle.cos(),
                    center.y + band * angle.sin(),
                );
                if !map.within_bounds(&Location::new(location.x - radius, location.y - radius))
                    || !map.within_bounds(&Location::new(location.x + radius, location.y + radius))
                    || overlaps_any(&map, &location, radius, 2.0)
                    || placed
                        .iter()
                        .any(|other: &Location| other.distance(&location) < 2.0 * radius + 2.0)
                    || spawn_bases
                        .iter()
                        .any(|base| base.distance(&location) < radius + 6.0)
                {
                    ok = false;
                    break;
                }
                placed.push(location);
            }
            if ok {
                for location in placed {
                    map.add_planet(planet_for(location, radius));
                }
                break;
            }
        }
    }

    // Three ships per player in a short column on their anchor.
    for (player, base) in spawn_bases.iter().enumerate() {
        for slot in 0..3 {
            let location = Location::new(base.x, base.y + 2.0 * (slot as f64 - 1.0));
            map.spawn_ship(location, player as PlayerId, constants);
        }
    }

    GeneratedMap {
        map,
        generator: "solar".to_string(),
        points_of_interest: Value::Array(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(seed: u64) -> GeneratedMap {
        solar_system(&GameConstants::default(), 240.0, 160.0, 2, seed)
    }

    #[test]
    fn test_layout_is_in_bounds_and_populated() {
        let generated = generate(11);
        assert!(!generated.map.planets.is_empty());
        for planet in &generated.map.planets {
            assert!(generated.map.within_bounds(&planet.location));
        }
        for arena in &generated.map.ships {
            assert_eq!(arena.len(), 3);
            for ship in arena.values() {
                assert!(generated.map.within_bounds(&ship.location));
            }
        }
    }

    #[test]
    fn test_planets_do_not_overlap() {
        let generated = generate(23);
        let planets = &generated.map.planets;
        for i in 0..planets.len() {
            for j in (i + 1)..planets.len() {
                let distance = planets[i].location.distance(&planets[j].location);
                assert!(
                    distance >= planets[i].radius + planets[j].radius,
                    "planets {i} and {j} overlap"
                );
            }
        }
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let a = generate(99);
        let b = generate(99);
        assert_eq!(a.map.planets.len(), b.map.planets.len());
        for (pa, pb) in a.map.planets.iter().zip(&b.map.planets) {
            assert_eq!(pa.location, pb.location);
            assert_eq!(pa.radius, pb.radius);
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = generate(1);
        let b = generate(2);
        let same = a.map.planets.len() == b.map.planets.len()
            && a.map
                .planets
                .iter()
                .zip(&b.map.planets)
                .all(|(pa, pb)| pa.location == pb.location);
        assert!(!same);
    }
}
