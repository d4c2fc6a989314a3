//! Broadphase spatial hash over the ship population.
//!
//! A uniform grid of `cell_size` cells covering the map. Only ships are
//! binned; planets are few enough (and fat enough to straddle cells) that
//! the detector scans them linearly. The grid is rebuilt from scratch at the
//! top of every detection pass and never mutated during resolution.

use crate::core::types::{EntityId, PlayerId};
use crate::geom::Location;
use crate::world::map::GameMap;

pub struct CollisionGrid {
    cell_size: f64,
    width: i32,
    height: i32,
    cells: Vec<Vec<EntityId>>,
}

impl CollisionGrid {
    /// Build the grid from the current ship positions.
    pub fn build(map: &GameMap, cell_size: f64) -> Self {
        let width = (map.width / cell_size).ceil() as i32;
        let height = (map.height / cell_size).ceil() as i32;
        let mut grid = Self {
            cell_size,
            width,
            height,
            cells: vec![Vec::new(); (width * height) as usize],
        };

        for (player, arena) in map.ships.iter().enumerate() {
            for (&index, ship) in arena {
                let (cx, cy) = grid.cell_of(&ship.location);
                let id = EntityId::for_ship(player as PlayerId, index);
                grid.cell_mut(cx, cy).push(id);
            }
        }
        grid
    }

    /// Home cell of a location. Clamped: a ship that has drifted off the
    /// map (the boundary test misses negative-velocity exits) bins into the
    /// nearest edge cell instead of indexing out of range.
    fn cell_of(&self, location: &Location) -> (i32, i32) {
        let cx = ((location.x / self.cell_size) as i32).clamp(0, self.width - 1);
        let cy = ((location.y / self.cell_size) as i32).clamp(0, self.height - 1);
        (cx, cy)
    }

    fn cell(&self, x: i32, y: i32) -> &Vec<EntityId> {
        &self.cells[(y * self.width + x) as usize]
    }

    fn cell_mut(&mut self, x: i32, y: i32) -> &mut Vec<EntityId> {
        &mut self.cells[(y * self.width + x) as usize]
    }

    /// Append every ship whose home cell overlaps the disk `(location,
    /// radius)`. Examines the owning cell plus the cardinal neighbors the
    /// disk spills into; a diagonal neighbor is visited only when both of
    /// its cardinals spill. `cell_size` is sized so one-cell spill covers
    /// every reachable pair.
    pub fn test(&self, location: &Location, radius: f64, out: &mut Vec<EntityId>) {
        let (cell_x, cell_y) = self.cell_of(location);
        let real_x = self.cell_size * cell_x as f64;
        let real_y = self.cell_size * cell_y as f64;

        let exceeds_left = location.x - radius < real_x && cell_x > 0;
        let exceeds_right =
            location.x + radius >= real_x + self.cell_size && cell_x + 1 < self.width;
        let exceeds_top = location.y - radius < real_y && cell_y > 0;
        let exceeds_bottom =
            location.y + radius >= real_y + self.cell_size && cell_y + 1 < self.height;

        out.extend_from_slice(self.cell(cell_x, cell_y));

        if exceeds_left {
            out.extend_from_slice(self.cell(cell_x - 1, cell_y));
            if exceeds_top {
                out.extend_from_slice(self.cell(cell_x - 1, cell_y - 1));
            }
            if exceeds_bottom {
                out.extend_from_slice(self.cell(cell_x - 1, cell_y + 1));
            }
        }

        if exceeds_top {
            out.extend_from_slice(self.cell(cell_x, cell_y - 1));
        }
        if exceeds_bottom {
            out.extend_from_slice(self.cell(cell_x, cell_y + 1));
        }

        if exceeds_right {
            out.extend_from_slice(self.cell(cell_x + 1, cell_y));
            if exceeds_top {
                out.extend_from_slice(self.cell(cell_x + 1, cell_y - 1));
            }
            if exceeds_bottom {
                out.extend_from_slice(self.cell(cell_x + 1, cell_y + 1));
            }
        }
    }
}
