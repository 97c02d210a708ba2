//! Harvester state machine.
//!
//! ```text
//! Idle -> MovingToOre -> Harvesting -> Returning -> Unloading -> Idle
//! ```
//!
//! Any step that finds the world changed under it (ore gone, no building
//! to return to, no route) drops back to `Idle` and starts over next tick.

use crate::components::{
    Building, ComponentKind, EntityId, Harvester, HarvesterState, Movable, Owner, Position,
    ResourceKind,
};
use crate::events::GameEvent;
use crate::map::{Terrain, TileCoord};
use crate::math::Fixed;
use crate::world::{System, World};

use super::HARVESTER_PRIORITY;

/// A tick extracts `rate * dt * EXTRACTION_SCALE` units.
const EXTRACTION_SCALE: i32 = 20;

/// Drives every harvester through its gather cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarvesterSystem;

impl System for HarvesterSystem {
    fn name(&self) -> &'static str {
        "harvester"
    }

    fn priority(&self) -> i32 {
        HARVESTER_PRIORITY
    }

    fn update(&mut self, world: &mut World, dt: Fixed) {
        for id in world.query(&[ComponentKind::Harvester, ComponentKind::Position, ComponentKind::Owner]) {
            if world.is_pending_destroy(id) {
                continue;
            }
            let Some(harvester) = world.get::<Harvester>(id).copied() else {
                continue;
            };

            let next = match harvester.state {
                HarvesterState::Idle => seek_ore(world, id, &harvester),
                HarvesterState::MovingToOre => arrive_at_ore(world, id, &harvester),
                HarvesterState::Harvesting => harvest(world, id, &harvester, dt),
                HarvesterState::Returning if arrived(world, id) => HarvesterState::Unloading,
                HarvesterState::Returning => HarvesterState::Returning,
                HarvesterState::Unloading => unload(world, id, &harvester),
            };

            if next != harvester.state {
                tracing::trace!(entity = id, from = ?harvester.state, to = ?next, "Harvester state");
            }
            if let Some(h) = world.get_mut::<Harvester>(id) {
                h.state = next;
            }
        }
    }
}

fn arrived(world: &World, id: EntityId) -> bool {
    world.get::<Movable>(id).map_or(true, Movable::path_finished)
}

fn tile_of(world: &World, id: EntityId) -> Option<TileCoord> {
    world.get::<Position>(id).map(Position::tile)
}

fn seek_ore(world: &mut World, id: EntityId, harvester: &Harvester) -> HarvesterState {
    if harvester.current > Fixed::ZERO && harvester.current >= harvester.capacity {
        return start_return(world, id);
    }
    let Some(here) = tile_of(world, id) else {
        return HarvesterState::Idle;
    };
    let Some(ore) = world.grid().nearest_ore(here) else {
        return HarvesterState::Idle;
    };
    if !world.issue_move(id, ore) {
        tracing::debug!(entity = id, x = ore.x, y = ore.y, "Harvester has no route to ore");
        return HarvesterState::Idle;
    }
    if let Some(h) = world.get_mut::<Harvester>(id) {
        h.target = Some(ore);
    }
    HarvesterState::MovingToOre
}

fn arrive_at_ore(world: &World, id: EntityId, harvester: &Harvester) -> HarvesterState {
    if !arrived(world, id) {
        return HarvesterState::MovingToOre;
    }
    let Some(target) = harvester.target else {
        return HarvesterState::Idle;
    };
    let on_target = tile_of(world, id) == Some(target);
    let has_ore = world
        .grid()
        .tile(target)
        .is_some_and(|t| t.ore_amount > Fixed::ZERO);
    if on_target && has_ore {
        HarvesterState::Harvesting
    } else {
        HarvesterState::Idle
    }
}

fn harvest(world: &mut World, id: EntityId, harvester: &Harvester, dt: Fixed) -> HarvesterState {
    let Some(target) = harvester.target else {
        return HarvesterState::Idle;
    };
    let Some(tile) = world.grid_mut().tile_mut(target) else {
        return HarvesterState::Idle;
    };

    let amount = (harvester.rate * dt * Fixed::from_num(EXTRACTION_SCALE))
        .min(tile.ore_amount)
        .min(harvester.capacity - harvester.current)
        .max(Fixed::ZERO);
    let kind = if tile.terrain == Terrain::Gems {
        ResourceKind::Gems
    } else {
        ResourceKind::Ore
    };
    tile.ore_amount -= amount;
    let exhausted = tile.ore_amount <= Fixed::ZERO;
    if exhausted {
        tile.ore_amount = Fixed::ZERO;
        tile.terrain = Terrain::Clear;
    }

    let current = harvester.current + amount;
    if let Some(h) = world.get_mut::<Harvester>(id) {
        if h.current == Fixed::ZERO && amount > Fixed::ZERO {
            h.cargo = kind;
        }
        h.current = current;
    }

    if current >= harvester.capacity || (exhausted && current > Fixed::ZERO) {
        start_return(world, id)
    } else if exhausted {
        HarvesterState::Idle
    } else {
        HarvesterState::Harvesting
    }
}

/// Head for the exit tile of the nearest building the harvester's owner
/// has. Ties go to the lowest building id.
fn start_return(world: &mut World, id: EntityId) -> HarvesterState {
    let (Some(position), Some(owner)) = (
        world.get::<Position>(id).map(|p| p.value),
        world.get::<Owner>(id).map(|o| o.player_id),
    ) else {
        return HarvesterState::Idle;
    };

    let mut best: Option<(Fixed, TileCoord)> = None;
    for building in world.query(&[ComponentKind::Building, ComponentKind::Owner, ComponentKind::Position]) {
        if world.is_pending_destroy(building)
            || world.get::<Owner>(building).map(|o| o.player_id) != Some(owner)
        {
            continue;
        }
        let (Some(pos), Some(exit)) = (
            world.get::<Position>(building).map(|p| p.value),
            world.get::<Building>(building).map(Building::exit_tile),
        ) else {
            continue;
        };
        let dist = position.distance_squared(pos);
        if best.map_or(true, |(d, _)| dist < d) {
            best = Some((dist, exit));
        }
    }

    match best {
        Some((_, exit)) if world.issue_move(id, exit) => HarvesterState::Returning,
        Some((_, exit)) => {
            tracing::debug!(entity = id, x = exit.x, y = exit.y, "Harvester has no route home");
            HarvesterState::Idle
        }
        None => {
            tracing::debug!(entity = id, player = owner, "Harvester has no building to return to");
            HarvesterState::Idle
        }
    }
}

fn unload(world: &mut World, id: EntityId, harvester: &Harvester) -> HarvesterState {
    let credits = (harvester.current * Fixed::from_num(harvester.cargo.value_per_unit())).to_num::<i64>();
    let player = world.get::<Owner>(id).map(|o| o.player_id);

    if let Some(h) = world.get_mut::<Harvester>(id) {
        h.current = Fixed::ZERO;
        h.cargo = ResourceKind::Ore;
        h.target = None;
    }

    if let Some(player) = player {
        if let Some(account) = world.players_mut().get_mut(player) {
            account.credits = account.credits.saturating_add(credits);
        }
        if credits > 0 {
            world.emit(GameEvent::ResourceHarvested {
                harvester: id,
                player,
                credits,
            });
        }
    }
    HarvesterState::Idle
}
