//! Entity factories for units and structures.
//!
//! Production, construction, MCV deployment and scenarios all build
//! entities through here so a unit always has the same component set.

use crate::components::{
    Armor, Building, BuildingConstruction, BuildingName, EntityId, FogVision, Harvester, Health,
    Mcv, Movable, Position, Production, Selectable, Sprite, Weapon,
};
use crate::error::{GameError, Result};
use crate::map::{TileCoord, TileOccupancy};
use crate::math::{Fixed, Vec2Fixed};
use crate::players::PlayerId;
use crate::tech::{TechDefinition, TechKind};
use crate::world::World;

/// Facing given to freshly spawned entities (south, toward the camera).
const SPAWN_FACING: u8 = 4;

/// Spawn a unit at the centre of `tile`.
///
/// Units get Position, Sprite, Health, Movable, Selectable, Owner,
/// FogVision and Armor, plus Weapon, Harvester or Mcv when the definition
/// calls for them.
pub fn spawn_unit(
    world: &mut World,
    def: &TechDefinition,
    player: PlayerId,
    tile: TileCoord,
) -> EntityId {
    let owner = world.owner_for(player);
    let id = world.spawn();
    world.attach(id, Position::new(tile.center()));
    world.attach(
        id,
        Sprite {
            key: def.key.clone(),
            facing: SPAWN_FACING,
        },
    );
    world.attach(id, Health::new(def.hit_points.max(1)));
    world.attach(id, Movable::new(def.speed, def.pass_mask));
    world.attach(id, Selectable);
    world.attach(id, owner);
    world.attach(id, FogVision { radius: def.vision });
    world.attach(
        id,
        Armor {
            armor_type: def.armor_type,
            value: def.armor_value,
        },
    );

    if def.is_armed() {
        let mut weapon = Weapon::new(def.damage, def.range, def.cooldown, def.damage_type);
        if let Some(kind) = def.projectile {
            weapon = weapon.with_projectile(kind, def.splash);
        }
        world.attach(id, weapon);
    }
    if def.is_harvester() {
        world.attach(id, Harvester::new(def.harvest_capacity, def.harvest_rate));
    }
    if def.mcv {
        world.attach(id, Mcv);
    }

    tracing::debug!(entity = id, key = %def.key, player, x = tile.x, y = tile.y, "Spawned unit");
    id
}

/// Spawn a unit by tech key.
pub fn spawn_unit_by_key(
    world: &mut World,
    key: &str,
    player: PlayerId,
    tile: TileCoord,
) -> Result<EntityId> {
    let def = world
        .tech()
        .get(key)
        .filter(|d| d.kind == TechKind::Unit)
        .cloned()
        .ok_or_else(|| GameError::UnknownTech(key.to_string()))?;
    Ok(spawn_unit(world, &def, player, tile))
}

/// Spawn a structure with its footprint at `origin` and mark the tiles
/// occupied.
///
/// An incomplete structure starts at 1 hit point and grows with
/// construction progress.
pub fn spawn_building(
    world: &mut World,
    def: &TechDefinition,
    player: PlayerId,
    origin: TileCoord,
    complete: bool,
) -> EntityId {
    let owner = world.owner_for(player);
    let building = Building {
        power_gen: def.power_gen,
        power_draw: def.power_draw,
        width: def.width.max(1),
        height: def.height.max(1),
        tile: origin,
    };
    let center = Vec2Fixed::new(
        Fixed::from_num(origin.x) + Fixed::from_num(building.width) / Fixed::from_num(2),
        Fixed::from_num(origin.y) + Fixed::from_num(building.height) / Fixed::from_num(2),
    );

    let id = world.spawn();
    world.attach(id, Position::new(center));
    world.attach(
        id,
        Sprite {
            key: def.key.clone(),
            facing: SPAWN_FACING,
        },
    );
    let max = def.hit_points.max(1);
    world.attach(
        id,
        Health {
            current: if complete { max } else { 1 },
            max,
        },
    );
    world.attach(
        id,
        Armor {
            armor_type: def.armor_type,
            value: def.armor_value,
        },
    );
    world.attach(id, Selectable);
    world.attach(id, owner);
    world.attach(id, FogVision { radius: def.vision });
    world.attach(id, building);
    world.attach(
        id,
        BuildingName {
            key: def.key.clone(),
        },
    );
    world.attach(
        id,
        if complete {
            BuildingConstruction::completed(def.build_time)
        } else {
            BuildingConstruction::new(def.build_time)
        },
    );
    if def.produces_units {
        world.attach(id, Production::default());
    }
    if def.is_armed() {
        world.attach(
            id,
            Weapon::new(def.damage, def.range, def.cooldown, def.damage_type),
        );
    }

    for tile in building.footprint() {
        world.grid_mut().set_occupied(tile.x, tile.y, true);
    }

    tracing::debug!(entity = id, key = %def.key, player, x = origin.x, y = origin.y, complete, "Spawned building");
    id
}

/// Spawn a structure by tech key.
pub fn spawn_building_by_key(
    world: &mut World,
    key: &str,
    player: PlayerId,
    origin: TileCoord,
    complete: bool,
) -> Result<EntityId> {
    let def = world
        .tech()
        .get(key)
        .filter(|d| d.kind == TechKind::Building)
        .cloned()
        .ok_or_else(|| GameError::UnknownTech(key.to_string()))?;
    Ok(spawn_building(world, &def, player, origin, complete))
}
