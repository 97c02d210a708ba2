//! Building construction progress.

use crate::components::{
    Building, BuildingConstruction, BuildingName, ComponentKind, EntityId, Health, Owner,
};
use crate::events::GameEvent;
use crate::math::Fixed;
use crate::spawn::spawn_unit;
use crate::tech::{HARVESTER, REFINERY};
use crate::world::{System, World};

use super::CONSTRUCTION_PRIORITY;

/// Advances incomplete structures.
///
/// Progress grows by `dt / build_time`, halved while the owner lacks power.
/// Health tracks `max * progress` so damage taken mid-build matters. A
/// finished refinery delivers a free harvester.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstructionSystem;

impl System for ConstructionSystem {
    fn name(&self) -> &'static str {
        "construction"
    }

    fn priority(&self) -> i32 {
        CONSTRUCTION_PRIORITY
    }

    fn update(&mut self, world: &mut World, dt: Fixed) {
        for id in world.query(&[ComponentKind::BuildingConstruction, ComponentKind::Health]) {
            if world.is_pending_destroy(id) {
                continue;
            }
            let Some(site) = world.get::<BuildingConstruction>(id).copied() else {
                continue;
            };
            if site.complete {
                continue;
            }

            let owner = world.get::<Owner>(id).copied();
            let powered = owner.map_or(true, |o| world.players().has_power(o.player_id));
            let rate = if powered { Fixed::ONE } else { Fixed::ONE / Fixed::from_num(2) };
            let step = if site.build_time > Fixed::ZERO {
                dt / site.build_time * rate
            } else {
                Fixed::ONE
            };
            let progress = (site.progress + step).min(Fixed::ONE);
            let complete = progress >= Fixed::ONE;

            if let Some(site) = world.get_mut::<BuildingConstruction>(id) {
                site.progress = progress;
                site.complete = complete;
            }
            if let Some(health) = world.get_mut::<Health>(id) {
                let max = health.max.max(0);
                health.current = if complete {
                    max
                } else {
                    (Fixed::from_num(max) * progress)
                        .to_num::<i32>()
                        .clamp(max.min(1), max)
                };
            }

            if complete {
                on_complete(world, id, owner);
            }
        }
    }
}

fn on_complete(world: &mut World, id: EntityId, owner: Option<Owner>) {
    let key = world
        .get::<BuildingName>(id)
        .map(|n| n.key.clone())
        .unwrap_or_default();
    tracing::info!(entity = id, key = %key, tick = world.tick_count(), "Building completed");

    let Some(owner) = owner else {
        return;
    };
    world.emit(GameEvent::BuildingCompleted {
        entity: id,
        player: owner.player_id,
        key: key.clone(),
    });

    if key == REFINERY {
        let exit = world.get::<Building>(id).map(|b| b.exit_tile());
        let def = world.tech().get(HARVESTER).cloned();
        match (exit, def) {
            (Some(exit), Some(def)) => {
                let harvester = spawn_unit(world, &def, owner.player_id, exit);
                world.emit(GameEvent::UnitCreated {
                    entity: harvester,
                    player: owner.player_id,
                    key: def.key,
                });
            }
            _ => tracing::warn!(entity = id, "Refinery finished but no harvester could be spawned"),
        }
    }
}
