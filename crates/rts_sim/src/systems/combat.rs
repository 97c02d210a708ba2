//! Target acquisition, firing and damage resolution.

use crate::components::{
    damage_multiplier, Armor, ComponentKind, DamageType, EntityId, Health, Owner, Position,
    Projectile, Sprite, Weapon,
};
use crate::events::GameEvent;
use crate::math::{Fixed, Vec2Fixed};
use crate::world::{System, World};

use super::COMBAT_PRIORITY;

/// Flight speed of every projectile, in tiles per second.
pub const PROJECTILE_SPEED: Fixed = Fixed::const_from_int(8);

/// Resolve one hit of `base` damage on `target`.
///
/// ```text
/// mitigated = max(1, base - armor.value)
/// final     = max(1, round(mitigated * multiplier[damage_type][armor_type]))
/// ```
///
/// Entities without [`Armor`] take the base damage unmodified. Returns the
/// hit points removed, or `None` if the target has no health left to lose.
/// The lethal hit marks the entity for destruction and emits a single
/// [`GameEvent::UnitDestroyed`].
pub fn apply_damage(
    world: &mut World,
    target: EntityId,
    base: i32,
    damage_type: DamageType,
) -> Option<i32> {
    if world.get::<Health>(target)?.current <= 0 {
        return None;
    }

    let (armor_value, multiplier) = world.get::<Armor>(target).map_or(
        (0, Fixed::ONE),
        |armor| {
            (
                armor.value,
                damage_multiplier(damage_type.index(), armor.armor_type.index()),
            )
        },
    );
    let mitigated = base.saturating_sub(armor_value).max(1);
    let amount = (Fixed::from_num(mitigated) * multiplier)
        .round()
        .to_num::<i32>()
        .max(1);

    let health = world.get_mut::<Health>(target)?;
    let before = health.current;
    let lethal = health.apply_damage(amount);
    let removed = before - health.current;

    world.emit(GameEvent::Damaged {
        entity: target,
        amount: removed,
        damage_type,
    });

    if lethal {
        let owner = world.get::<Owner>(target).map(|o| o.player_id);
        if world.destroy(target) {
            tracing::debug!(entity = target, ?owner, tick = world.tick_count(), "Unit destroyed");
            world.emit(GameEvent::UnitDestroyed {
                entity: target,
                owner,
            });
        }
    }
    Some(removed)
}

/// Fires every ready weapon at the nearest enemy in range.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatSystem;

impl System for CombatSystem {
    fn name(&self) -> &'static str {
        "combat"
    }

    fn priority(&self) -> i32 {
        COMBAT_PRIORITY
    }

    fn update(&mut self, world: &mut World, dt: Fixed) {
        let candidates = world.query(&[
            ComponentKind::Position,
            ComponentKind::Health,
            ComponentKind::Owner,
        ]);

        for id in world.query(&[ComponentKind::Position, ComponentKind::Weapon, ComponentKind::Owner]) {
            if world.is_pending_destroy(id) || !world.is_complete(id) {
                continue;
            }
            let (Some(weapon), Some(position), Some(owner)) = (
                world.get::<Weapon>(id).cloned(),
                world.get::<Position>(id).map(|p| p.value),
                world.get::<Owner>(id).copied(),
            ) else {
                continue;
            };

            if weapon.cooldown_now > Fixed::ZERO {
                if let Some(w) = world.get_mut::<Weapon>(id) {
                    w.cooldown_now = (w.cooldown_now - dt).max(Fixed::ZERO);
                }
                continue;
            }

            if let Some(ordered) = weapon.target {
                if !world.contains(ordered) || world.is_pending_destroy(ordered) {
                    if let Some(w) = world.get_mut::<Weapon>(id) {
                        w.target = None;
                    }
                }
            }

            let range_sq = weapon.range * weapon.range;
            let ordered = weapon.target.and_then(|t| {
                let (pos, dist) = target_distance(world, id, &owner, position, t)?;
                (dist <= range_sq).then_some((t, pos))
            });
            let target = ordered.or_else(|| {
                let mut best: Option<(EntityId, Vec2Fixed, Fixed)> = None;
                for &candidate in &candidates {
                    let Some((pos, dist)) = target_distance(world, id, &owner, position, candidate)
                    else {
                        continue;
                    };
                    if dist > range_sq {
                        continue;
                    }
                    // Strict comparison keeps the lowest id on ties
                    if best.map_or(true, |(_, _, d)| dist < d) {
                        best = Some((candidate, pos, dist));
                    }
                }
                best.map(|(candidate, pos, _)| (candidate, pos))
            });

            let Some((target, target_pos)) = target else {
                continue;
            };
            fire(world, id, &weapon, position, target, target_pos);
        }
    }
}

/// Position and squared distance of `target` if it is a live enemy of
/// `owner` other than the shooter itself.
fn target_distance(
    world: &World,
    shooter: EntityId,
    owner: &Owner,
    from: Vec2Fixed,
    target: EntityId,
) -> Option<(Vec2Fixed, Fixed)> {
    if target == shooter || world.is_pending_destroy(target) {
        return None;
    }
    if world.get::<Health>(target)?.current <= 0 {
        return None;
    }
    if !world.are_enemies(owner, world.get::<Owner>(target)?) {
        return None;
    }
    let pos = world.get::<Position>(target)?.value;
    Some((pos, from.distance_squared(pos)))
}

fn fire(
    world: &mut World,
    shooter: EntityId,
    weapon: &Weapon,
    position: Vec2Fixed,
    target: EntityId,
    target_pos: Vec2Fixed,
) {
    let projectile = weapon.projectile;
    match projectile {
        Some(kind) => {
            let shell = world.spawn();
            world.attach(shell, Position::new(position));
            world.attach(
                shell,
                Sprite {
                    key: kind.sprite_key().to_string(),
                    facing: (target_pos - position).facing().unwrap_or_default(),
                },
            );
            world.attach(
                shell,
                Projectile {
                    source: shooter,
                    target,
                    target_pos,
                    speed: PROJECTILE_SPEED,
                    damage: weapon.damage,
                    splash: weapon.splash,
                    damage_type: weapon.damage_type,
                },
            );
        }
        None => {
            apply_damage(world, target, weapon.damage, weapon.damage_type);
        }
    }

    if let Some(w) = world.get_mut::<Weapon>(shooter) {
        w.cooldown_now = w.cooldown;
    }
    world.emit(GameEvent::Attack {
        attacker: shooter,
        target,
        projectile: projectile.is_some(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ArmorType, ProjectileKind};
    use crate::players::{Player, PlayerId};

    fn dt() -> Fixed {
        Fixed::from_num(1) / Fixed::from_num(16)
    }

    fn world() -> World {
        let mut world = World::default();
        world.players_mut().insert(Player::new(1, "Red", 1, 0));
        world.players_mut().insert(Player::new(2, "Blue", 2, 0));
        world.players_mut().insert(Player::new(3, "Pink", 1, 0));
        world
    }

    fn unit(world: &mut World, player: PlayerId, x: i32, y: i32, hp: i32) -> EntityId {
        let id = world.spawn();
        world.attach(id, Position::new(Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))));
        world.attach(id, Health::new(hp));
        let owner = world.owner_for(player);
        world.attach(id, owner);
        id
    }

    fn rifle() -> Weapon {
        Weapon::new(10, Fixed::from_num(5), Fixed::ONE, DamageType::Kinetic)
    }

    fn events_of(world: &World, pred: impl Fn(&GameEvent) -> bool) -> usize {
        world.pending_events().iter().filter(|e| pred(e)).count()
    }

    #[test]
    fn test_damage_formula() {
        let mut world = world();
        let target = unit(&mut world, 2, 0, 0, 100);
        world.attach(
            target,
            Armor {
                armor_type: ArmorType::Light,
                value: 10,
            },
        );
        assert_eq!(apply_damage(&mut world, target, 50, DamageType::Kinetic), Some(40));
        assert_eq!(world.get::<Health>(target).map(|h| h.current), Some(60));
    }

    #[test]
    fn test_minimum_damage_is_one() {
        let mut world = world();
        let target = unit(&mut world, 2, 0, 0, 100);
        world.attach(
            target,
            Armor {
                armor_type: ArmorType::Structure,
                value: 50,
            },
        );
        assert_eq!(apply_damage(&mut world, target, 5, DamageType::Kinetic), Some(1));
        assert_eq!(world.get::<Health>(target).map(|h| h.current), Some(99));
    }

    #[test]
    fn test_lethal_hit_destroys_once() {
        let mut world = world();
        let target = unit(&mut world, 2, 0, 0, 30);
        assert_eq!(apply_damage(&mut world, target, 50, DamageType::Explosive), Some(30));
        assert_eq!(apply_damage(&mut world, target, 50, DamageType::Explosive), None);
        assert!(world.is_pending_destroy(target));
        assert_eq!(
            events_of(&world, |e| matches!(e, GameEvent::UnitDestroyed { .. })),
            1
        );
        assert_eq!(world.get::<Health>(target).map(|h| h.current), Some(0));
    }

    #[test]
    fn test_targets_nearest_enemy_not_ally() {
        let mut world = world();
        let shooter = unit(&mut world, 1, 0, 0, 100);
        world.attach(shooter, rifle());
        let ally = unit(&mut world, 3, 1, 0, 100);
        let far = unit(&mut world, 2, 4, 0, 100);
        let near = unit(&mut world, 2, 0, 2, 100);

        CombatSystem.update(&mut world, dt());

        assert_eq!(world.get::<Health>(near).map(|h| h.current), Some(90));
        assert_eq!(world.get::<Health>(far).map(|h| h.current), Some(100));
        assert_eq!(world.get::<Health>(ally).map(|h| h.current), Some(100));
        assert_eq!(world.get::<Weapon>(shooter).map(|w| w.cooldown_now), Some(Fixed::ONE));
    }

    #[test]
    fn test_equal_distance_picks_lowest_id() {
        let mut world = world();
        let shooter = unit(&mut world, 1, 5, 5, 100);
        world.attach(shooter, rifle());
        let first = unit(&mut world, 2, 7, 5, 100);
        let second = unit(&mut world, 2, 5, 3, 100);

        CombatSystem.update(&mut world, dt());

        assert_eq!(world.get::<Health>(first).map(|h| h.current), Some(90));
        assert_eq!(world.get::<Health>(second).map(|h| h.current), Some(100));
    }

    #[test]
    fn test_cooldown_gates_fire() {
        let mut world = world();
        let shooter = unit(&mut world, 1, 0, 0, 100);
        world.attach(shooter, rifle());
        let target = unit(&mut world, 2, 1, 0, 1000);

        // Fires, then 16 ticks of cooldown at dt = 1/16
        for _ in 0..17 {
            CombatSystem.update(&mut world, dt());
        }
        assert_eq!(world.get::<Health>(target).map(|h| h.current), Some(990));
        CombatSystem.update(&mut world, dt());
        assert_eq!(world.get::<Health>(target).map(|h| h.current), Some(980));
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut world = world();
        let shooter = unit(&mut world, 1, 0, 0, 100);
        world.attach(shooter, rifle());
        let target = unit(&mut world, 2, 6, 0, 100);
        CombatSystem.update(&mut world, dt());
        assert_eq!(world.get::<Health>(target).map(|h| h.current), Some(100));
        assert_eq!(world.get::<Weapon>(shooter).map(|w| w.cooldown_now), Some(Fixed::ZERO));
    }

    #[test]
    fn test_ordered_target_preferred() {
        let mut world = world();
        let shooter = unit(&mut world, 1, 0, 0, 100);
        let near = unit(&mut world, 2, 1, 0, 100);
        let ordered = unit(&mut world, 2, 3, 0, 100);
        let mut weapon = rifle();
        weapon.target = Some(ordered);
        world.attach(shooter, weapon);

        CombatSystem.update(&mut world, dt());
        assert_eq!(world.get::<Health>(ordered).map(|h| h.current), Some(90));
        assert_eq!(world.get::<Health>(near).map(|h| h.current), Some(100));
    }

    #[test]
    fn test_projectile_weapon_spawns_projectile() {
        let mut world = world();
        let shooter = unit(&mut world, 1, 0, 0, 100);
        world.attach(shooter, rifle().with_projectile(ProjectileKind::Rocket, Fixed::ZERO));
        let target = unit(&mut world, 2, 3, 0, 100);

        CombatSystem.update(&mut world, dt());

        assert_eq!(world.get::<Health>(target).map(|h| h.current), Some(100));
        let shells = world.query(&[ComponentKind::Projectile]);
        assert_eq!(shells.len(), 1);
        let shell = world.get::<Projectile>(shells[0]).copied().expect("projectile");
        assert_eq!(shell.source, shooter);
        assert_eq!(shell.target, target);
        assert_eq!(shell.speed, PROJECTILE_SPEED);
        assert_eq!(world.get::<Sprite>(shells[0]).map(|s| s.facing), Some(2));
        assert_eq!(
            events_of(&world, |e| matches!(e, GameEvent::Attack { projectile: true, .. })),
            1
        );
    }
}
