//! Projectile flight and impact.

use crate::components::{ComponentKind, EntityId, Health, Position, Projectile, Sprite};
use crate::events::GameEvent;
use crate::math::{Fixed, Vec2Fixed};
use crate::world::{System, World};

use super::combat::apply_damage;
use super::PROJECTILE_PRIORITY;

/// Projectiles closer than this to their target detonate.
fn impact_distance() -> Fixed {
    Fixed::from_num(3) / Fixed::from_num(10)
}

/// Moves projectiles toward their targets and resolves hits.
///
/// Splash damage falls off linearly from the impact point and does not
/// spare the shooter's own side.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectileSystem;

impl System for ProjectileSystem {
    fn name(&self) -> &'static str {
        "projectile"
    }

    fn priority(&self) -> i32 {
        PROJECTILE_PRIORITY
    }

    fn update(&mut self, world: &mut World, dt: Fixed) {
        for id in world.query(&[ComponentKind::Position, ComponentKind::Projectile]) {
            if world.is_pending_destroy(id) {
                continue;
            }
            let (Some(position), Some(mut shell)) = (
                world.get::<Position>(id).map(|p| p.value),
                world.get::<Projectile>(id).copied(),
            ) else {
                continue;
            };

            if let Some(tracked) = world.get::<Position>(shell.target) {
                shell.target_pos = tracked.value;
            }

            if position.distance(shell.target_pos) < impact_distance() {
                detonate(world, id, &shell);
                continue;
            }

            let next = position.move_towards(shell.target_pos, shell.speed * dt);
            if let Some(p) = world.get_mut::<Position>(id) {
                p.value = next;
            }
            if let Some(p) = world.get_mut::<Projectile>(id) {
                p.target_pos = shell.target_pos;
            }
            if let (Some(facing), Some(sprite)) =
                ((shell.target_pos - position).facing(), world.get_mut::<Sprite>(id))
            {
                sprite.facing = facing;
            }
        }
    }
}

fn detonate(world: &mut World, id: EntityId, shell: &Projectile) {
    let mut hits = 0u32;
    if shell.splash > Fixed::ZERO {
        for (victim, dist) in splash_victims(world, shell.target_pos, shell.splash) {
            let scale = Fixed::ONE - dist / shell.splash;
            let damage = (Fixed::from_num(shell.damage) * scale)
                .round()
                .to_num::<i32>()
                .max(1);
            if apply_damage(world, victim, damage, shell.damage_type).is_some() {
                hits += 1;
            }
        }
    } else if apply_damage(world, shell.target, shell.damage, shell.damage_type).is_some() {
        hits = 1;
    }

    world.emit(GameEvent::ProjectileHit {
        projectile: id,
        target: shell.target,
        hits,
    });
    world.destroy(id);
}

fn splash_victims(world: &World, center: Vec2Fixed, radius: Fixed) -> Vec<(EntityId, Fixed)> {
    world
        .query(&[ComponentKind::Position, ComponentKind::Health])
        .into_iter()
        .filter(|&victim| world.get::<Health>(victim).is_some_and(|h| h.current > 0))
        .filter_map(|victim| {
            let dist = world.get::<Position>(victim)?.value.distance(center);
            (dist <= radius).then_some((victim, dist))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{DamageType, Owner};
    use crate::players::Player;

    fn dt() -> Fixed {
        Fixed::from_num(1) / Fixed::from_num(16)
    }

    fn at(x: f64, y: f64) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    fn world() -> World {
        let mut world = World::default();
        world.players_mut().insert(Player::new(1, "Red", 1, 0));
        world.players_mut().insert(Player::new(2, "Blue", 2, 0));
        world
    }

    fn target(world: &mut World, pos: Vec2Fixed, hp: i32, player: i32) -> EntityId {
        let id = world.spawn();
        world.attach(id, Position::new(pos));
        world.attach(id, Health::new(hp));
        world.attach(
            id,
            Owner {
                player_id: player,
                team_id: player,
            },
        );
        id
    }

    fn shell(world: &mut World, from: Vec2Fixed, to: EntityId, damage: i32, splash: f64) -> EntityId {
        let target_pos = world.get::<Position>(to).map(|p| p.value).unwrap_or_default();
        let id = world.spawn();
        world.attach(id, Position::new(from));
        world.attach(id, Sprite::default());
        world.attach(
            id,
            Projectile {
                source: 0,
                target: to,
                target_pos,
                speed: Fixed::from_num(8),
                damage,
                splash: Fixed::from_num(splash),
                damage_type: DamageType::Kinetic,
            },
        );
        id
    }

    #[test]
    fn test_flies_then_hits() {
        let mut world = world();
        let victim = target(&mut world, at(2.5, 0.5), 100, 2);
        let id = shell(&mut world, at(0.5, 0.5), victim, 30, 0.0);

        // 2 tiles at 0.5 per tick
        for _ in 0..4 {
            ProjectileSystem.update(&mut world, dt());
        }
        assert_eq!(world.get::<Health>(victim).map(|h| h.current), Some(100));
        assert_eq!(world.get::<Sprite>(id).map(|s| s.facing), Some(2));

        ProjectileSystem.update(&mut world, dt());
        assert_eq!(world.get::<Health>(victim).map(|h| h.current), Some(70));
        assert!(world.is_pending_destroy(id));
        assert!(world
            .pending_events()
            .iter()
            .any(|e| matches!(e, GameEvent::ProjectileHit { hits: 1, .. })));
    }

    #[test]
    fn test_tracks_moving_target() {
        let mut world = world();
        let victim = target(&mut world, at(4.5, 0.5), 100, 2);
        let id = shell(&mut world, at(0.5, 0.5), victim, 10, 0.0);
        if let Some(p) = world.get_mut::<Position>(victim) {
            p.value = at(0.5, 4.5);
        }
        ProjectileSystem.update(&mut world, dt());
        assert_eq!(world.get::<Position>(id).map(|p| p.value), Some(at(0.5, 1.0)));
        assert_eq!(world.get::<Projectile>(id).map(|p| p.target_pos), Some(at(0.5, 4.5)));
    }

    #[test]
    fn test_splash_falls_off_linearly() {
        let mut world = world();
        let primary = target(&mut world, at(5.0, 5.0), 200, 2);
        let secondary = target(&mut world, at(6.5, 5.0), 200, 2);
        let friendly = target(&mut world, at(5.0, 6.0), 200, 1);
        let outside = target(&mut world, at(9.0, 5.0), 200, 2);
        shell(&mut world, at(5.0, 5.0), primary, 100, 3.0);

        ProjectileSystem.update(&mut world, dt());

        let hp = |id| world.get::<Health>(id).map(|h| h.current);
        assert_eq!(hp(primary), Some(100));
        assert_eq!(hp(secondary), Some(150));
        // 100 * (1 - 1/3) rounds to 67
        assert_eq!(hp(friendly), Some(133));
        assert_eq!(hp(outside), Some(200));
    }

    #[test]
    fn test_lost_target_detonates_at_last_position() {
        let mut world = world();
        let victim = target(&mut world, at(1.0, 0.5), 10, 2);
        let id = shell(&mut world, at(0.5, 0.5), victim, 10, 0.0);
        world.destroy(victim);
        world.tick(dt());
        assert!(!world.contains(victim));

        ProjectileSystem.update(&mut world, dt());
        ProjectileSystem.update(&mut world, dt());
        assert!(world.is_pending_destroy(id));
        assert!(world
            .pending_events()
            .iter()
            .any(|e| matches!(e, GameEvent::ProjectileHit { hits: 0, .. })));
    }
}
