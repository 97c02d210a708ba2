//! Pathfinding and steering contract.
//!
//! The simulation only integrates velocities and advances waypoints; how
//! a path is found and how agents avoid each other is up to the
//! [`Pathfinder`] plugged into the world. [`DirectPathfinder`] is the
//! reference implementation: straight lines, no search.

use std::fmt;

use crate::map::{TileCoord, TileGrid};
use crate::math::{Fixed, Vec2Fixed};

/// Path computation and local steering service.
pub trait Pathfinder: fmt::Debug {
    /// Tiles from `start` (exclusive) to `goal` (inclusive), or `None` if
    /// the goal cannot be reached.
    fn find_path(
        &self,
        grid: &TileGrid,
        start: TileCoord,
        goal: TileCoord,
        pass_mask: u8,
    ) -> Option<Vec<TileCoord>>;

    /// Remove redundant waypoints from a path.
    fn smooth_path(&self, grid: &TileGrid, path: Vec<TileCoord>, pass_mask: u8) -> Vec<TileCoord>;

    /// Velocity for an agent heading to `path[path_index]`.
    fn steer(
        &self,
        position: Vec2Fixed,
        speed: Fixed,
        path: &[TileCoord],
        path_index: usize,
        nearby_agents: &[Vec2Fixed],
    ) -> Vec2Fixed;
}

/// Straight-line pathfinder.
///
/// Walks diagonally then straight toward the goal and gives up if any tile
/// on the way is impassable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPathfinder;

impl Pathfinder for DirectPathfinder {
    fn find_path(
        &self,
        grid: &TileGrid,
        start: TileCoord,
        goal: TileCoord,
        pass_mask: u8,
    ) -> Option<Vec<TileCoord>> {
        if !grid.is_passable(goal, pass_mask) {
            return None;
        }
        if start == goal {
            return Some(vec![goal]);
        }

        let mut path = Vec::new();
        let mut current = start;
        while current != goal {
            current = TileCoord::new(
                current.x + (goal.x - current.x).signum(),
                current.y + (goal.y - current.y).signum(),
            );
            if !grid.is_passable(current, pass_mask) {
                return None;
            }
            path.push(current);
        }
        Some(path)
    }

    fn smooth_path(&self, _grid: &TileGrid, path: Vec<TileCoord>, _pass_mask: u8) -> Vec<TileCoord> {
        if path.len() < 3 {
            return path;
        }

        let mut smoothed = Vec::with_capacity(path.len());
        for (i, tile) in path.iter().enumerate() {
            let keep = match (i.checked_sub(1).and_then(|p| path.get(p)), path.get(i + 1)) {
                (Some(prev), Some(next)) => {
                    let incoming = (tile.x - prev.x, tile.y - prev.y);
                    let outgoing = (next.x - tile.x, next.y - tile.y);
                    incoming != outgoing
                }
                _ => true,
            };
            if keep {
                smoothed.push(*tile);
            }
        }
        smoothed
    }

    fn steer(
        &self,
        position: Vec2Fixed,
        speed: Fixed,
        path: &[TileCoord],
        path_index: usize,
        _nearby_agents: &[Vec2Fixed],
    ) -> Vec2Fixed {
        match path.get(path_index) {
            Some(waypoint) => (waypoint.center() - position).normalize().scale(speed),
            None => Vec2Fixed::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Terrain, PASS_GROUND};

    #[test]
    fn test_direct_path_diagonal_then_straight() {
        let grid = TileGrid::new(10, 10);
        let path = DirectPathfinder
            .find_path(&grid, TileCoord::new(0, 0), TileCoord::new(3, 1), PASS_GROUND)
            .expect("open map");
        assert_eq!(
            path,
            vec![TileCoord::new(1, 1), TileCoord::new(2, 1), TileCoord::new(3, 1)]
        );
    }

    #[test]
    fn test_direct_path_blocked() {
        let mut grid = TileGrid::new(10, 1);
        grid.set_terrain(TileCoord::new(2, 0), Terrain::Rock);
        assert!(DirectPathfinder
            .find_path(&grid, TileCoord::new(0, 0), TileCoord::new(5, 0), PASS_GROUND)
            .is_none());
    }

    #[test]
    fn test_path_to_own_tile() {
        let grid = TileGrid::new(4, 4);
        let path = DirectPathfinder.find_path(&grid, TileCoord::new(1, 1), TileCoord::new(1, 1), PASS_GROUND);
        assert_eq!(path, Some(vec![TileCoord::new(1, 1)]));
    }

    #[test]
    fn test_smooth_drops_collinear_points() {
        let grid = TileGrid::new(10, 10);
        let path: Vec<_> = (1..=5).map(|x| TileCoord::new(x, 0)).collect();
        let smoothed = DirectPathfinder.smooth_path(&grid, path, PASS_GROUND);
        assert_eq!(smoothed, vec![TileCoord::new(1, 0), TileCoord::new(5, 0)]);
    }

    #[test]
    fn test_steer_toward_waypoint() {
        let path = [TileCoord::new(2, 0)];
        let velocity = DirectPathfinder.steer(
            TileCoord::new(0, 0).center(),
            Fixed::from_num(2),
            &path,
            0,
            &[],
        );
        assert_eq!(velocity, Vec2Fixed::new(Fixed::from_num(2), Fixed::ZERO));
        let idle = DirectPathfinder.steer(Vec2Fixed::ZERO, Fixed::from_num(2), &path, 1, &[]);
        assert_eq!(idle, Vec2Fixed::ZERO);
    }
}
