//! Player commands applied to the world.
//!
//! This is the boundary where lockstep commands become world mutations.
//! Every order validates ownership, tech requirements, credits and
//! placement first and only then mutates, so a rejected command leaves the
//! world exactly as it was.
//!
//! Orders normally arrive through [`World::schedule`] and are applied at the
//! start of their tick, but they can be called directly as well:
//!
//! ```
//! use rts_sim::map::TileCoord;
//! use rts_sim::orders;
//! use rts_sim::players::Player;
//! use rts_sim::spawn::spawn_building_by_key;
//! use rts_sim::world::World;
//!
//! let mut world = World::default();
//! world.players_mut().insert(Player::new(1, "Red", 1, 5000));
//! spawn_building_by_key(&mut world, "construction_yard", 1, TileCoord::new(0, 0), true).unwrap();
//!
//! orders::place_building(&mut world, 1, "power_plant", TileCoord::new(5, 0)).unwrap();
//! assert_eq!(world.players().get(1).unwrap().credits, 4700);
//! ```

use crate::components::{
    BuildingName, ComponentData, EntityId, Mcv, Movable, Owner, Position, Production, Weapon,
};
use crate::error::{GameError, Result};
use crate::events::GameEvent;
use crate::map::TileCoord;
use crate::players::PlayerId;
use crate::protocol::{CommandType, NetCommand};
use crate::spawn::spawn_building;
use crate::tech::{TechDefinition, TechKind, CONSTRUCTION_YARD};
use crate::world::World;

/// Apply one decoded lockstep command.
///
/// # Errors
///
/// Returns the reason the command was rejected. The world is unchanged in
/// that case.
pub fn apply_command(world: &mut World, command: &NetCommand) -> Result<()> {
    let player = command.player_id;
    if world.players().get(player).is_none() {
        return Err(GameError::PlayerNotFound(player));
    }
    let entity = command.entity_id;
    let tile = TileCoord::new(command.target_x, command.target_y);

    match command.command_type {
        CommandType::MoveUnit => move_unit(world, player, entity, tile),
        CommandType::AttackUnit => attack_unit(world, player, entity, command.target_entity()),
        CommandType::StopUnit => stop_unit(world, player, entity),
        CommandType::BuildUnit => build_unit(world, player, entity, param(command)?),
        CommandType::PlaceBuilding => {
            place_building(world, player, param(command)?, tile).map(|_| ())
        }
        CommandType::SellBuilding => sell_building(world, player, entity),
        CommandType::SetRally => set_rally(world, player, entity, tile),
        CommandType::Chat => chat(world, player, param(command)?),
        CommandType::DeployMcv => deploy_mcv(world, player, entity).map(|_| ()),
    }
}

fn param(command: &NetCommand) -> Result<&str> {
    command
        .param_str()
        .map_err(|e| GameError::InvalidCommand(format!("Parameter is not UTF-8: {e}")))
}

/// Fails unless `entity` is alive and owned by `player`.
fn check_owner(world: &World, player: PlayerId, entity: EntityId) -> Result<()> {
    if !world.contains(entity) || world.is_pending_destroy(entity) {
        return Err(GameError::EntityNotFound(entity));
    }
    match world.get::<Owner>(entity) {
        Some(owner) if owner.player_id == player => Ok(()),
        _ => Err(GameError::NotOwner { player, entity }),
    }
}

fn require<T: ComponentData>(world: &World, entity: EntityId) -> Result<&T> {
    world.get::<T>(entity).ok_or(GameError::MissingComponent {
        entity,
        component: T::KIND.name(),
    })
}

fn check_prerequisites(world: &World, player: PlayerId, key: &str) -> Result<()> {
    let completed = world.completed_buildings(player);
    match world.tech().missing_prerequisite(key, &completed) {
        Some(missing) => Err(GameError::TechRequirementNotMet(format!(
            "{key} requires {missing}"
        ))),
        None => Ok(()),
    }
}

fn definition(world: &World, key: &str, kind: TechKind) -> Result<TechDefinition> {
    world
        .tech()
        .get(key)
        .filter(|d| d.kind == kind)
        .cloned()
        .ok_or_else(|| GameError::UnknownTech(key.to_string()))
}

/// Deduct `cost` from the player, failing without change if they cannot
/// pay.
fn charge(world: &mut World, player: PlayerId, cost: i64) -> Result<()> {
    let account = world
        .players_mut()
        .get_mut(player)
        .ok_or(GameError::PlayerNotFound(player))?;
    if account.credits < cost {
        return Err(GameError::InsufficientCredits {
            required: cost,
            available: account.credits,
        });
    }
    account.credits -= cost;
    Ok(())
}

/// Send a unit toward a tile.
///
/// # Errors
///
/// Fails if the unit is not the player's, cannot move, or has no route.
pub fn move_unit(world: &mut World, player: PlayerId, entity: EntityId, goal: TileCoord) -> Result<()> {
    check_owner(world, player, entity)?;
    require::<Movable>(world, entity)?;
    if !world.issue_move(entity, goal) {
        return Err(GameError::InvalidCommand(format!(
            "No route for {entity} to ({}, {})",
            goal.x, goal.y
        )));
    }
    if let Some(weapon) = world.get_mut::<Weapon>(entity) {
        weapon.target = None;
    }
    Ok(())
}

/// Order a unit to attack an enemy, closing in if it is out of range.
///
/// # Errors
///
/// Fails if the unit is not the player's, is unarmed, or the target is not
/// a live enemy.
pub fn attack_unit(world: &mut World, player: PlayerId, entity: EntityId, target: EntityId) -> Result<()> {
    check_owner(world, player, entity)?;
    let range = require::<Weapon>(world, entity)?.range;
    let attacker_owner = *require::<Owner>(world, entity)?;

    if !world.contains(target) || world.is_pending_destroy(target) {
        return Err(GameError::EntityNotFound(target));
    }
    let hostile = world
        .get::<Owner>(target)
        .is_some_and(|o| world.are_enemies(&attacker_owner, o));
    if !hostile {
        return Err(GameError::InvalidCommand(format!(
            "{target} is not an enemy of player {player}"
        )));
    }

    if let Some(weapon) = world.get_mut::<Weapon>(entity) {
        weapon.target = Some(target);
    }
    let (Some(from), Some(to)) = (
        world.get::<Position>(entity).map(|p| p.value),
        world.get::<Position>(target).map(|p| p.value),
    ) else {
        return Ok(());
    };
    if from.distance_squared(to) > range * range && world.has(entity, Movable::KIND) {
        world.issue_move(entity, TileCoord::containing(to));
    }
    Ok(())
}

/// Stop a unit and clear its attack order.
///
/// # Errors
///
/// Fails if the unit is not the player's or can neither move nor shoot.
pub fn stop_unit(world: &mut World, player: PlayerId, entity: EntityId) -> Result<()> {
    check_owner(world, player, entity)?;
    if !world.has(entity, Movable::KIND) && !world.has(entity, Weapon::KIND) {
        return Err(GameError::MissingComponent {
            entity,
            component: Movable::KIND.name(),
        });
    }
    if let Some(movable) = world.get_mut::<Movable>(entity) {
        movable.stop();
    }
    if let Some(weapon) = world.get_mut::<Weapon>(entity) {
        weapon.target = None;
    }
    Ok(())
}

/// Queue a unit at a production building and pay for it.
///
/// # Errors
///
/// Fails if the building is not the player's, is unfinished or does not
/// produce, if the unit is unknown or its prerequisites are missing, or if
/// the player cannot pay.
pub fn build_unit(world: &mut World, player: PlayerId, building: EntityId, key: &str) -> Result<()> {
    check_owner(world, player, building)?;
    require::<Production>(world, building)?;
    if !world.is_complete(building) {
        return Err(GameError::InvalidCommand(format!(
            "Building {building} is still under construction"
        )));
    }
    let def = definition(world, key, TechKind::Unit)?;
    check_prerequisites(world, player, key)?;
    charge(world, player, def.cost)?;

    if let Some(production) = world.get_mut::<Production>(building) {
        production.queue.push_back(def.key);
    }
    Ok(())
}

/// Place a new structure and pay for it. It starts under construction.
///
/// # Errors
///
/// Fails without a completed Construction Yard, on unmet prerequisites,
/// a blocked footprint, or insufficient credits.
pub fn place_building(world: &mut World, player: PlayerId, key: &str, origin: TileCoord) -> Result<EntityId> {
    let def = definition(world, key, TechKind::Building)?;
    if !world.completed_buildings(player).contains(CONSTRUCTION_YARD) {
        return Err(GameError::NoConstructionYard(player));
    }
    check_prerequisites(world, player, key)?;
    if !world.grid().can_place(origin, def.width, def.height) {
        return Err(GameError::PlacementBlocked {
            key: def.key,
            x: origin.x,
            y: origin.y,
        });
    }
    charge(world, player, def.cost)?;

    let id = spawn_building(world, &def, player, origin, false);
    tracing::info!(entity = id, key = %def.key, player, x = origin.x, y = origin.y, "Building placed");
    world.emit(GameEvent::BuildingPlaced {
        entity: id,
        player,
        key: def.key,
    });
    Ok(id)
}

/// Sell a structure for half its cost. Its tiles free up when it is swept
/// at the end of the tick.
///
/// # Errors
///
/// Fails if the building is not the player's.
pub fn sell_building(world: &mut World, player: PlayerId, building: EntityId) -> Result<()> {
    check_owner(world, player, building)?;
    let key = require::<BuildingName>(world, building)?.key.clone();
    let refund = world.tech().get(&key).map_or(0, |d| d.cost / 2);

    if let Some(account) = world.players_mut().get_mut(player) {
        account.credits = account.credits.saturating_add(refund);
    }
    world.destroy(building);
    tracing::info!(entity = building, key = %key, player, refund, "Building sold");
    world.emit(GameEvent::BuildingSold {
        entity: building,
        player,
        refund,
    });
    Ok(())
}

/// Set where a production building sends its units.
///
/// # Errors
///
/// Fails if the building is not the player's, does not produce, or the tile
/// is off the map.
pub fn set_rally(world: &mut World, player: PlayerId, building: EntityId, tile: TileCoord) -> Result<()> {
    check_owner(world, player, building)?;
    require::<Production>(world, building)?;
    if !world.grid().in_bounds(tile.x, tile.y) {
        return Err(GameError::InvalidCommand(format!(
            "Rally point ({}, {}) is off the map",
            tile.x, tile.y
        )));
    }
    if let Some(production) = world.get_mut::<Production>(building) {
        production.rally = Some(tile);
    }
    Ok(())
}

/// Broadcast a chat line.
///
/// # Errors
///
/// Never fails once the text is decoded.
pub fn chat(world: &mut World, player: PlayerId, text: &str) -> Result<()> {
    world.emit(GameEvent::ChatMessage {
        player,
        text: text.to_string(),
    });
    Ok(())
}

/// Turn an MCV into a finished Construction Yard whose footprint starts at
/// the MCV's tile.
///
/// # Errors
///
/// Fails if the entity is not the player's MCV or the footprint is blocked.
pub fn deploy_mcv(world: &mut World, player: PlayerId, entity: EntityId) -> Result<EntityId> {
    check_owner(world, player, entity)?;
    require::<Mcv>(world, entity)?;
    let origin = require::<Position>(world, entity)?.tile();
    let def = definition(world, CONSTRUCTION_YARD, TechKind::Building)?;
    if !world.grid().can_place(origin, def.width, def.height) {
        return Err(GameError::PlacementBlocked {
            key: def.key,
            x: origin.x,
            y: origin.y,
        });
    }

    world.destroy(entity);
    let yard = spawn_building(world, &def, player, origin, true);
    tracing::info!(mcv = entity, yard, player, x = origin.x, y = origin.y, "MCV deployed");
    world.emit(GameEvent::BuildingPlaced {
        entity: yard,
        player,
        key: def.key,
    });
    Ok(yard)
}
