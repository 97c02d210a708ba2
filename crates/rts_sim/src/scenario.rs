//! Ready-made starting positions.

use crate::components::Building;
use crate::config::SimConfig;
use crate::error::{GameError, Result};
use crate::map::{Terrain, TileCoord, TileGrid};
use crate::math::Fixed;
use crate::players::{Player, PlayerId};
use crate::spawn::{spawn_building_by_key, spawn_unit_by_key};
use crate::tech::{TechTree, CONSTRUCTION_YARD, HARVESTER, REFINERY};
use crate::world::World;

/// Smallest map the skirmish layout fits on.
pub const MIN_SKIRMISH_SIZE: i32 = 24;

/// Ore per tile in each base's field.
const BASE_ORE: i32 = 400;
/// Gems per tile in the contested centre.
const CENTRE_GEMS: i32 = 200;

/// Two players on the west and east edges, each with a construction yard,
/// power plant, refinery, harvester and two riflemen next to an ore field.
/// Gems sit in the middle of the map.
///
/// The east base mirrors the west one left to right.
///
/// ```
/// use rts_sim::config::SimConfig;
/// use rts_sim::scenario::skirmish_1v1;
///
/// let world = skirmish_1v1(&SimConfig::default()).unwrap();
/// assert_eq!(world.players().len(), 2);
/// ```
pub fn skirmish_1v1(config: &SimConfig) -> Result<World> {
    skirmish_1v1_with_tech(config, TechTree::standard())
}

/// [`skirmish_1v1`] with a custom tech tree. The tree must define the
/// structures and units the layout places.
pub fn skirmish_1v1_with_tech(config: &SimConfig, tech: TechTree) -> Result<World> {
    let (width, height) = (config.map_width, config.map_height);
    if width < MIN_SKIRMISH_SIZE || height < MIN_SKIRMISH_SIZE {
        return Err(GameError::InvalidState(format!(
            "Skirmish map must be at least {MIN_SKIRMISH_SIZE}x{MIN_SKIRMISH_SIZE}, got {width}x{height}"
        )));
    }

    let mut world = World::new(TileGrid::new(width, height), tech).with_standard_systems();
    world
        .players_mut()
        .insert(Player::new(1, "Player 1", 1, config.starting_credits));
    world
        .players_mut()
        .insert(Player::new(2, "Player 2", 2, config.starting_credits));

    build_base(&mut world, 1, Side::West)?;
    build_base(&mut world, 2, Side::East { width })?;

    let centre = TileCoord::new(width / 2 - 1, height / 2 - 1);
    for dy in 0..2 {
        for dx in 0..2 {
            world.grid_mut().set_resource(
                TileCoord::new(centre.x + dx, centre.y + dy),
                Terrain::Gems,
                Fixed::from_num(CENTRE_GEMS),
            );
        }
    }

    tracing::info!(
        width,
        height,
        entities = world.entity_count(),
        "Skirmish scenario ready"
    );
    Ok(world)
}

/// Which edge a base is laid out against. Layout coordinates are written
/// for the west side; the east side flips them horizontally.
#[derive(Debug, Clone, Copy)]
enum Side {
    West,
    East { width: i32 },
}

impl Side {
    /// A single tile.
    const fn tile(self, x: i32, y: i32) -> TileCoord {
        match self {
            Self::West => TileCoord::new(x, y),
            Self::East { width } => TileCoord::new(width - 1 - x, y),
        }
    }

    /// Origin of a footprint `w` tiles wide.
    const fn footprint(self, x: i32, y: i32, w: i32) -> TileCoord {
        match self {
            Self::West => TileCoord::new(x, y),
            Self::East { width } => TileCoord::new(width - x - w, y),
        }
    }
}

fn build_base(world: &mut World, player: PlayerId, side: Side) -> Result<()> {
    spawn_building_by_key(world, CONSTRUCTION_YARD, player, side.footprint(2, 2, 3), true)?;
    spawn_building_by_key(world, "power_plant", player, side.footprint(6, 2, 2), true)?;
    let refinery = spawn_building_by_key(world, REFINERY, player, side.footprint(2, 7, 3), true)?;

    let exit = world
        .get::<Building>(refinery)
        .map(Building::exit_tile)
        .ok_or(GameError::EntityNotFound(refinery))?;
    spawn_unit_by_key(world, HARVESTER, player, exit)?;
    spawn_unit_by_key(world, "rifleman", player, side.tile(6, 5))?;
    spawn_unit_by_key(world, "rifleman", player, side.tile(7, 5))?;

    for dy in 0..4 {
        for dx in 0..4 {
            world
                .grid_mut()
                .set_resource(side.tile(6 + dx, 9 + dy), Terrain::Ore, Fixed::from_num(BASE_ORE));
        }
    }
    Ok(())
}
