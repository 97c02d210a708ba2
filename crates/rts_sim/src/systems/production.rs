//! Unit production queues.

use crate::components::{Building, ComponentKind, EntityId, Owner, Position, Production};
use crate::events::GameEvent;
use crate::map::TileCoord;
use crate::math::Fixed;
use crate::spawn::spawn_unit;
use crate::tech::TechKind;
use crate::world::{System, World};

use super::PRODUCTION_PRIORITY;

/// Builds the head of every production queue.
///
/// Buildings still under construction do not produce. Queue entries with no
/// unit definition are discarded with a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionSystem;

impl System for ProductionSystem {
    fn name(&self) -> &'static str {
        "production"
    }

    fn priority(&self) -> i32 {
        PRODUCTION_PRIORITY
    }

    fn update(&mut self, world: &mut World, dt: Fixed) {
        for id in world.query(&[ComponentKind::Production, ComponentKind::Owner]) {
            if world.is_pending_destroy(id) || !world.is_complete(id) {
                continue;
            }
            let (Some(head), Some(owner)) = (
                world
                    .get::<Production>(id)
                    .and_then(|p| p.queue.front().cloned()),
                world.get::<Owner>(id).copied(),
            ) else {
                continue;
            };

            let Some(def) = world
                .tech()
                .get(&head)
                .filter(|d| d.kind == TechKind::Unit)
                .cloned()
            else {
                tracing::warn!(entity = id, key = %head, "Dropping unknown unit from production queue");
                if let Some(production) = world.get_mut::<Production>(id) {
                    production.queue.pop_front();
                    production.progress = Fixed::ZERO;
                }
                continue;
            };

            let rate = if world.players().has_power(owner.player_id) {
                Fixed::ONE
            } else {
                Fixed::ONE / Fixed::from_num(2)
            };
            let step = if def.build_time > Fixed::ZERO {
                dt / def.build_time * rate
            } else {
                Fixed::ONE
            };

            let Some(production) = world.get_mut::<Production>(id) else {
                continue;
            };
            production.progress += step;
            if production.progress < Fixed::ONE {
                continue;
            }
            production.progress = Fixed::ZERO;
            production.queue.pop_front();
            let rally = production.rally;

            let tile = rally.unwrap_or_else(|| default_exit(world, id));
            let unit = spawn_unit(world, &def, owner.player_id, tile);
            tracing::debug!(building = id, unit, key = %def.key, "Unit produced");
            world.emit(GameEvent::UnitCreated {
                entity: unit,
                player: owner.player_id,
                key: def.key,
            });
        }
    }
}

fn default_exit(world: &World, id: EntityId) -> TileCoord {
    world
        .get::<Building>(id)
        .map(Building::exit_tile)
        .or_else(|| world.get::<Position>(id).map(Position::tile))
        .unwrap_or_default()
}
