//! Gameplay systems.
//!
//! Each system is a small struct implementing [`System`]. The world runs
//! them every tick in ascending priority:
//!
//! | System       | Priority |
//! |--------------|----------|
//! | Power        | 5        |
//! | Construction | 6        |
//! | Fog          | 8        |
//! | Movement     | 10       |
//! | Combat       | 20       |
//! | Projectile   | 25       |
//! | Harvester    | 30       |
//! | Production   | 35       |
//! | Animation    | 60       |
//! | GameOver     | 100      |
//!
//! Power must be current before construction and production read it,
//! combat runs before projectiles so a shot can land the same tick, and
//! game-over runs last to see the tick's final counts.

use crate::world::{System, World};

pub mod animation;
pub mod combat;
pub mod construction;
pub mod fog;
pub mod game_over;
pub mod harvester;
pub mod movement;
pub mod power;
pub mod production;
pub mod projectile;

pub use animation::AnimationSystem;
pub use combat::{apply_damage, CombatSystem};
pub use construction::ConstructionSystem;
pub use fog::FogSystem;
pub use game_over::GameOverSystem;
pub use harvester::HarvesterSystem;
pub use movement::MovementSystem;
pub use power::PowerSystem;
pub use production::ProductionSystem;
pub use projectile::ProjectileSystem;

/// Priority of [`PowerSystem`].
pub const POWER_PRIORITY: i32 = 5;
/// Priority of [`ConstructionSystem`].
pub const CONSTRUCTION_PRIORITY: i32 = 6;
/// Priority of [`FogSystem`].
pub const FOG_PRIORITY: i32 = 8;
/// Priority of [`MovementSystem`].
pub const MOVEMENT_PRIORITY: i32 = 10;
/// Priority of [`CombatSystem`].
pub const COMBAT_PRIORITY: i32 = 20;
/// Priority of [`ProjectileSystem`].
pub const PROJECTILE_PRIORITY: i32 = 25;
/// Priority of [`HarvesterSystem`].
pub const HARVESTER_PRIORITY: i32 = 30;
/// Priority of [`ProductionSystem`].
pub const PRODUCTION_PRIORITY: i32 = 35;
/// Priority of [`AnimationSystem`].
pub const ANIMATION_PRIORITY: i32 = 60;
/// Priority of [`GameOverSystem`].
pub const GAME_OVER_PRIORITY: i32 = 100;

/// Every standard system, boxed, in no particular order.
#[must_use]
pub fn standard_systems() -> Vec<Box<dyn System>> {
    vec![
        Box::new(GameOverSystem),
        Box::new(AnimationSystem),
        Box::new(ProductionSystem),
        Box::new(HarvesterSystem),
        Box::new(ProjectileSystem),
        Box::new(CombatSystem),
        Box::new(MovementSystem),
        Box::new(FogSystem),
        Box::new(ConstructionSystem),
        Box::new(PowerSystem),
    ]
}

/// Register every standard system on a world.
pub fn install_standard_systems(world: &mut World) {
    for system in standard_systems() {
        world.add_boxed_system(system);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_order() {
        let mut world = World::default();
        install_standard_systems(&mut world);
        assert_eq!(
            world.system_names(),
            vec![
                "power",
                "construction",
                "fog",
                "movement",
                "combat",
                "projectile",
                "harvester",
                "production",
                "animation",
                "game_over",
            ]
        );
    }
}
