//! Power bookkeeping.

use std::collections::BTreeMap;

use crate::components::{Building, ComponentKind, Owner};
use crate::math::Fixed;
use crate::players::PlayerId;
use crate::world::{System, World};

use super::POWER_PRIORITY;

/// Recomputes every player's `power` and `power_use` from scratch.
///
/// Every owned [`Building`] counts, finished or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerSystem;

impl System for PowerSystem {
    fn name(&self) -> &'static str {
        "power"
    }

    fn priority(&self) -> i32 {
        POWER_PRIORITY
    }

    fn update(&mut self, world: &mut World, _dt: Fixed) {
        let mut totals: BTreeMap<PlayerId, (i32, i32)> = BTreeMap::new();
        for id in world.query(&[ComponentKind::Building, ComponentKind::Owner]) {
            let (Some(building), Some(owner)) = (world.get::<Building>(id), world.get::<Owner>(id))
            else {
                continue;
            };
            let entry = totals.entry(owner.player_id).or_default();
            entry.0 = entry.0.saturating_add(building.power_gen);
            entry.1 = entry.1.saturating_add(building.power_draw);
        }

        for player in world.players_mut().iter_mut() {
            let (power, power_use) = totals.get(&player.id).copied().unwrap_or_default();
            player.power = power;
            player.power_use = power_use;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::TileCoord;
    use crate::players::Player;

    fn building(world: &mut World, player: PlayerId, gen: i32, draw: i32) -> u64 {
        let id = world.spawn();
        world.attach(
            id,
            Building {
                power_gen: gen,
                power_draw: draw,
                width: 1,
                height: 1,
                tile: TileCoord::new(0, 0),
            },
        );
        let owner = world.owner_for(player);
        world.attach(id, owner);
        id
    }

    #[test]
    fn test_full_recompute_each_tick() {
        let mut world = World::default();
        world.players_mut().insert(Player::new(1, "Red", 1, 0));
        world.players_mut().insert(Player::new(2, "Blue", 2, 0));
        building(&mut world, 1, 100, 0);
        let barracks = building(&mut world, 1, 0, 20);
        building(&mut world, 2, 0, 50);

        let mut system = PowerSystem;
        system.update(&mut world, Fixed::ONE);
        system.update(&mut world, Fixed::ONE);

        let red = world.players().get(1).expect("red");
        assert_eq!((red.power, red.power_use), (100, 20));
        let blue = world.players().get(2).expect("blue");
        assert_eq!((blue.power, blue.power_use), (0, 50));
        assert!(!blue.has_power());

        world.detach(barracks, ComponentKind::Building);
        system.update(&mut world, Fixed::ONE);
        assert_eq!(world.players().get(1).map(|p| p.power_use), Some(0));
    }
}
