//! Path following.
//!
//! The pathfinder decides the route and the steering velocity; this system
//! only advances waypoints and integrates `position += velocity * dt`.

use crate::components::{ComponentKind, EntityId, Movable, Position, Sprite};
use crate::math::{Fixed, Vec2Fixed};
use crate::world::{System, World};

use super::MOVEMENT_PRIORITY;

/// Agents closer than this (in tiles) are passed to steering as neighbours.
const NEIGHBOUR_RADIUS: i32 = 2;

/// A waypoint counts as reached inside 0.15 tiles.
fn waypoint_radius_sq() -> Fixed {
    Fixed::from_num(225) / Fixed::from_num(10_000)
}

/// Moves every `Position + Movable` entity along its path.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn priority(&self) -> i32 {
        MOVEMENT_PRIORITY
    }

    fn update(&mut self, world: &mut World, dt: Fixed) {
        let movers = world.query(&[ComponentKind::Position, ComponentKind::Movable]);
        let snapshot: Vec<(EntityId, Vec2Fixed)> = movers
            .iter()
            .filter_map(|&id| world.get::<Position>(id).map(|p| (id, p.value)))
            .collect();
        let neighbour_sq = Fixed::from_num(NEIGHBOUR_RADIUS * NEIGHBOUR_RADIUS);

        for (id, position) in snapshot.iter().copied() {
            if world.is_pending_destroy(id) {
                continue;
            }
            let Some(movable) = world.get::<Movable>(id) else {
                continue;
            };

            let mut index = movable.path_index;
            while let Some(waypoint) = movable.path.get(index) {
                if position.distance_squared(waypoint.center()) < waypoint_radius_sq() {
                    index += 1;
                } else {
                    break;
                }
            }

            let Some(waypoint) = movable.path.get(index).map(|w| w.center()) else {
                if let Some(movable) = world.get_mut::<Movable>(id) {
                    movable.path_index = index;
                    movable.velocity = Vec2Fixed::ZERO;
                }
                continue;
            };

            let nearby: Vec<Vec2Fixed> = snapshot
                .iter()
                .filter(|(other, pos)| *other != id && pos.distance_squared(position) < neighbour_sq)
                .map(|(_, pos)| *pos)
                .collect();
            let velocity =
                world
                    .pathfinder()
                    .steer(position, movable.speed, &movable.path, index, &nearby);

            let step = velocity.scale(dt);
            let next = if step.dot(step) >= position.distance_squared(waypoint) {
                waypoint
            } else {
                position + step
            };

            if let Some(movable) = world.get_mut::<Movable>(id) {
                movable.path_index = index;
                movable.velocity = velocity;
            }
            if let Some(pos) = world.get_mut::<Position>(id) {
                pos.value = next;
            }
            if let (Some(facing), Some(sprite)) = (velocity.facing(), world.get_mut::<Sprite>(id)) {
                sprite.facing = facing;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{TileCoord, PASS_GROUND};

    fn dt() -> Fixed {
        Fixed::from_num(1) / Fixed::from_num(16)
    }

    fn mover(world: &mut World, tile: TileCoord, speed: i32, path: Vec<TileCoord>) -> EntityId {
        let id = world.spawn();
        world.attach(id, Position::new(tile.center()));
        world.attach(id, Sprite::default());
        let mut movable = Movable::new(Fixed::from_num(speed), PASS_GROUND);
        movable.set_path(path);
        world.attach(id, movable);
        id
    }

    #[test]
    fn test_integrates_velocity() {
        let mut world = World::default();
        let id = mover(&mut world, TileCoord::new(0, 0), 2, vec![TileCoord::new(5, 0)]);
        MovementSystem.update(&mut world, dt());
        let pos = world.get::<Position>(id).map(|p| p.value).expect("position");
        assert_eq!(pos, Vec2Fixed::new(Fixed::from_num(0.625), Fixed::from_num(0.5)));
        assert_eq!(world.get::<Sprite>(id).map(|s| s.facing), Some(2));
    }

    #[test]
    fn test_advances_inside_waypoint_radius() {
        let mut world = World::default();
        let path = vec![TileCoord::new(1, 0), TileCoord::new(1, 1)];
        let id = mover(&mut world, TileCoord::new(0, 0), 1, path);

        for _ in 0..14 {
            MovementSystem.update(&mut world, dt());
        }
        assert_eq!(
            world.get::<Position>(id).map(|p| p.value.x),
            Some(Fixed::from_num(1.375))
        );
        assert_eq!(world.get::<Movable>(id).map(|m| m.path_index), Some(0));

        // 0.125 tiles out is inside the waypoint radius
        MovementSystem.update(&mut world, dt());
        assert_eq!(world.get::<Movable>(id).map(|m| m.path_index), Some(1));
        assert_eq!(world.get::<Sprite>(id).map(|s| s.facing), Some(4));
    }

    #[test]
    fn test_never_overshoots_waypoint() {
        let mut world = World::default();
        let id = mover(&mut world, TileCoord::new(0, 0), 20, vec![TileCoord::new(1, 0)]);
        MovementSystem.update(&mut world, dt());
        assert_eq!(
            world.get::<Position>(id).map(|p| p.value),
            Some(TileCoord::new(1, 0).center())
        );
    }

    #[test]
    fn test_finished_path_stops() {
        let mut world = World::default();
        let id = mover(&mut world, TileCoord::new(2, 2), 3, vec![TileCoord::new(2, 2)]);
        MovementSystem.update(&mut world, dt());
        let movable = world.get::<Movable>(id).expect("movable");
        assert!(movable.path_finished());
        assert_eq!(movable.velocity, Vec2Fixed::ZERO);
        assert_eq!(
            world.get::<Position>(id).map(|p| p.value),
            Some(TileCoord::new(2, 2).center())
        );
    }
}
