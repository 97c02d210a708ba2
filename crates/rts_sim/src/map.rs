//! Tile grid: terrain, ore fields and building occupancy.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Pass-mask bit for ground units.
pub const PASS_GROUND: u8 = 0b01;
/// Pass-mask bit for naval units.
pub const PASS_WATER: u8 = 0b10;

/// Integer tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TileCoord {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing a world position.
    #[must_use]
    pub fn containing(pos: Vec2Fixed) -> Self {
        Self::new(pos.x.floor().to_num(), pos.y.floor().to_num())
    }

    /// World position of the tile centre.
    #[must_use]
    pub fn center(self) -> Vec2Fixed {
        let half = Fixed::from_num(1) / Fixed::from_num(2);
        Vec2Fixed::new(Fixed::from_num(self.x) + half, Fixed::from_num(self.y) + half)
    }

    /// Squared tile distance, integer.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }
}

/// Terrain of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Open ground.
    #[default]
    Clear,
    /// Ore field.
    Ore,
    /// Gem field.
    Gems,
    /// Impassable rock.
    Rock,
    /// Water.
    Water,
}

impl Terrain {
    /// Pass-mask bits that may enter this terrain.
    #[must_use]
    pub const fn pass_bits(self) -> u8 {
        match self {
            Self::Clear | Self::Ore | Self::Gems => PASS_GROUND,
            Self::Rock => 0,
            Self::Water => PASS_WATER,
        }
    }
}

/// One map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tile {
    /// Terrain type.
    pub terrain: Terrain,
    /// Harvestable resource left.
    #[serde(with = "fixed_serde")]
    pub ore_amount: Fixed,
    /// Covered by a building footprint.
    pub occupied: bool,
}

/// Mutation of occupancy flags by building placement and removal.
pub trait TileOccupancy {
    /// Mark a tile as covered or free. Out-of-bounds tiles are ignored.
    fn set_occupied(&mut self, x: i32, y: i32, occupied: bool);
}

/// Row-major tile map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileGrid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Clear map of the given size.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            tiles: vec![Tile::default(); (width as usize) * (height as usize)],
        }
    }

    /// Columns.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Rows.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Whether the coordinate is on the map.
    #[must_use]
    pub const fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y)
            .then(|| (y as usize) * (self.width as usize) + (x as usize))
    }

    /// Tile at a coordinate.
    #[must_use]
    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        let index = self.index(coord.x, coord.y)?;
        self.tiles.get(index)
    }

    /// Mutable tile at a coordinate.
    pub fn tile_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        let index = self.index(coord.x, coord.y)?;
        self.tiles.get_mut(index)
    }

    /// Seed a resource field on a tile.
    pub fn set_resource(&mut self, coord: TileCoord, terrain: Terrain, amount: Fixed) {
        if let Some(tile) = self.tile_mut(coord) {
            tile.terrain = terrain;
            tile.ore_amount = amount;
        }
    }

    /// Change the terrain of a tile.
    pub fn set_terrain(&mut self, coord: TileCoord, terrain: Terrain) {
        if let Some(tile) = self.tile_mut(coord) {
            tile.terrain = terrain;
        }
    }

    /// Whether a unit with `pass_mask` may stand on the tile.
    #[must_use]
    pub fn is_passable(&self, coord: TileCoord, pass_mask: u8) -> bool {
        self.tile(coord)
            .is_some_and(|t| !t.occupied && t.terrain.pass_bits() & pass_mask != 0)
    }

    /// Whether every footprint tile is on the map and free.
    #[must_use]
    pub fn can_place(&self, origin: TileCoord, width: u8, height: u8) -> bool {
        (0..i32::from(height)).all(|dy| {
            (0..i32::from(width)).all(|dx| {
                self.tile(TileCoord::new(origin.x + dx, origin.y + dy))
                    .is_some_and(|t| {
                        !t.occupied && matches!(t.terrain, Terrain::Clear | Terrain::Ore | Terrain::Gems)
                    })
            })
        })
    }

    /// Nearest tile with resources left. Ties go to the first tile in
    /// row-major order.
    #[must_use]
    pub fn nearest_ore(&self, from: TileCoord) -> Option<TileCoord> {
        let mut best: Option<(i64, TileCoord)> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                let coord = TileCoord::new(x, y);
                let has_ore = self.tile(coord).is_some_and(|t| t.ore_amount > Fixed::ZERO);
                if !has_ore {
                    continue;
                }
                let dist = coord.distance_squared(from);
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, coord));
                }
            }
        }
        best.map(|(_, coord)| coord)
    }

    /// Total resources left on the map.
    #[must_use]
    pub fn total_ore(&self) -> Fixed {
        self.tiles
            .iter()
            .fold(Fixed::ZERO, |acc, t| acc.saturating_add(t.ore_amount))
    }
}

impl TileOccupancy for TileGrid {
    fn set_occupied(&mut self, x: i32, y: i32, occupied: bool) {
        if let Some(tile) = self.tile_mut(TileCoord::new(x, y)) {
            tile.occupied = occupied;
        }
    }
}
