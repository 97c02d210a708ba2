//! Fog of war bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{ComponentKind, FogVision, Owner, Position};
use crate::map::TileCoord;
use crate::math::Fixed;
use crate::players::PlayerId;
use crate::world::{System, World};

use super::FOG_PRIORITY;

/// Visibility of one player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FogLayer {
    visible: Vec<bool>,
    explored: Vec<bool>,
}

/// Per-player visible and explored tiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FogOfWar {
    width: i32,
    height: i32,
    layers: BTreeMap<PlayerId, FogLayer>,
}

impl FogOfWar {
    /// Fog for a map of the given size.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(0),
            height: height.max(0),
            layers: BTreeMap::new(),
        }
    }

    fn index(&self, coord: TileCoord) -> Option<usize> {
        (coord.x >= 0 && coord.y >= 0 && coord.x < self.width && coord.y < self.height)
            .then(|| (coord.y as usize) * (self.width as usize) + (coord.x as usize))
    }

    fn layer_mut(&mut self, player: PlayerId) -> &mut FogLayer {
        let size = (self.width as usize) * (self.height as usize);
        self.layers.entry(player).or_insert_with(|| FogLayer {
            visible: vec![false; size],
            explored: vec![false; size],
        })
    }

    /// Whether the player currently sees the tile.
    #[must_use]
    pub fn is_visible(&self, player: PlayerId, coord: TileCoord) -> bool {
        self.lookup(player, coord, |layer| layer.visible.as_slice())
    }

    /// Whether the player has ever seen the tile.
    #[must_use]
    pub fn is_explored(&self, player: PlayerId, coord: TileCoord) -> bool {
        self.lookup(player, coord, |layer| layer.explored.as_slice())
    }

    /// Number of tiles the player currently sees.
    #[must_use]
    pub fn visible_count(&self, player: PlayerId) -> usize {
        self.layers
            .get(&player)
            .map_or(0, |layer| layer.visible.iter().filter(|v| **v).count())
    }

    fn lookup(&self, player: PlayerId, coord: TileCoord, pick: fn(&FogLayer) -> &[bool]) -> bool {
        let Some(index) = self.index(coord) else {
            return false;
        };
        self.layers
            .get(&player)
            .and_then(|layer| pick(layer).get(index).copied())
            .unwrap_or(false)
    }

    fn clear_visible(&mut self, player: PlayerId) {
        self.layer_mut(player).visible.fill(false);
    }

    fn reveal(&mut self, player: PlayerId, center: TileCoord, radius: i32) {
        let radius = radius.max(0);
        let radius_sq = i64::from(radius) * i64::from(radius);
        for y in center.y - radius..=center.y + radius {
            for x in center.x - radius..=center.x + radius {
                let coord = TileCoord::new(x, y);
                if coord.distance_squared(center) > radius_sq {
                    continue;
                }
                let Some(index) = self.index(coord) else {
                    continue;
                };
                let layer = self.layer_mut(player);
                if let Some(v) = layer.visible.get_mut(index) {
                    *v = true;
                }
                if let Some(e) = layer.explored.get_mut(index) {
                    *e = true;
                }
            }
        }
    }
}

/// Recomputes what each player can see from their `FogVision` entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct FogSystem;

impl System for FogSystem {
    fn name(&self) -> &'static str {
        "fog"
    }

    fn priority(&self) -> i32 {
        FOG_PRIORITY
    }

    fn update(&mut self, world: &mut World, _dt: Fixed) {
        let sources: Vec<(PlayerId, TileCoord, i32)> = world
            .query(&[ComponentKind::FogVision, ComponentKind::Position, ComponentKind::Owner])
            .into_iter()
            .filter_map(|id| {
                let vision = world.get::<FogVision>(id)?;
                let position = world.get::<Position>(id)?;
                let owner = world.get::<Owner>(id)?;
                Some((owner.player_id, position.tile(), vision.radius))
            })
            .collect();

        let players = world.players().ids();
        let fog = world.fog_mut();
        for player in players {
            fog.clear_visible(player);
        }
        for (player, tile, radius) in sources {
            fog.reveal(player, tile, radius);
        }
    }
}
