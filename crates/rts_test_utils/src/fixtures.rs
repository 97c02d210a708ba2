//! Test fixtures and helpers.
//!
//! Pre-built worlds and entity configurations
//! for consistent testing.

use fixed::types::I32F32;
use rts_sim::components::EntityId;
use rts_sim::map::{Terrain, TileCoord, TileGrid};
use rts_sim::math::Fixed;
use rts_sim::players::{Player, PlayerId};
use rts_sim::spawn::{spawn_building_by_key, spawn_unit_by_key};
use rts_sim::tech::TechTree;
use rts_sim::world::World;

/// Credits both fixture players start with.
pub const FIXTURE_CREDITS: i64 = 5000;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Tick length used by the fixtures: 1/16 s, which keeps speeds and
/// timers exact in binary fixed point.
#[must_use]
pub fn dt() -> Fixed {
    Fixed::from_num(1) / Fixed::from_num(16)
}

/// 32x32 world with the standard tech tree and systems, and two players
/// on opposing teams. No entities.
#[must_use]
pub fn two_player_world() -> World {
    world_with_tech(TechTree::standard())
}

/// Like [`two_player_world`] over a custom tech tree.
#[must_use]
pub fn world_with_tech(tech: TechTree) -> World {
    let mut world = World::new(TileGrid::new(32, 32), tech).with_standard_systems();
    world
        .players_mut()
        .insert(Player::new(1, "Red", 1, FIXTURE_CREDITS));
    world
        .players_mut()
        .insert(Player::new(2, "Blue", 2, FIXTURE_CREDITS));
    world
}

/// Fill a rectangle of tiles with ore.
pub fn ore_field(world: &mut World, origin: TileCoord, width: i32, height: i32, amount: i32) {
    for dy in 0..height {
        for dx in 0..width {
            world.grid_mut().set_resource(
                TileCoord::new(origin.x + dx, origin.y + dy),
                Terrain::Ore,
                Fixed::from_num(amount),
            );
        }
    }
}

/// Spawn a unit from the world's tech tree.
///
/// # Panics
///
/// Panics if the key is not a unit in the tech tree.
pub fn spawn_unit_at(world: &mut World, key: &str, player: PlayerId, x: i32, y: i32) -> EntityId {
    spawn_unit_by_key(world, key, player, TileCoord::new(x, y))
        .unwrap_or_else(|e| panic!("fixture unit '{key}': {e}"))
}

/// Spawn a finished structure from the world's tech tree.
///
/// # Panics
///
/// Panics if the key is not a building in the tech tree.
pub fn spawn_completed_building(
    world: &mut World,
    key: &str,
    player: PlayerId,
    x: i32,
    y: i32,
) -> EntityId {
    spawn_building_by_key(world, key, player, TileCoord::new(x, y), true)
        .unwrap_or_else(|e| panic!("fixture building '{key}': {e}"))
}

/// Advance `world` by `ticks` fixed steps, dispatching events after each.
pub fn run_ticks(world: &mut World, ticks: u64) {
    for _ in 0..ticks {
        world.tick(dt());
        world.dispatch_events();
    }
}

/// Credits held by `player`, or zero if unknown.
#[must_use]
pub fn credits(world: &World, player: PlayerId) -> i64 {
    world.players().get(player).map_or(0, |p| p.credits)
}
