//! Sprite animation cursors.

use crate::components::{Animation, ComponentKind};
use crate::math::Fixed;
use crate::world::{System, World};

use super::ANIMATION_PRIORITY;

/// Steps every [`Animation`] by `dt`, wrapping looping clips and holding
/// the last frame of one-shot clips.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimationSystem;

impl System for AnimationSystem {
    fn name(&self) -> &'static str {
        "animation"
    }

    fn priority(&self) -> i32 {
        ANIMATION_PRIORITY
    }

    fn update(&mut self, world: &mut World, dt: Fixed) {
        for id in world.query(&[ComponentKind::Animation]) {
            if let Some(animation) = world.get_mut::<Animation>(id) {
                advance(animation, dt);
            }
        }
    }
}

fn advance(animation: &mut Animation, dt: Fixed) {
    if animation.frame_count == 0 || animation.frame_time <= Fixed::ZERO {
        return;
    }
    animation.elapsed += dt;
    while animation.elapsed >= animation.frame_time {
        animation.elapsed -= animation.frame_time;
        if animation.frame + 1 < animation.frame_count {
            animation.frame += 1;
        } else if animation.looping {
            animation.frame = 0;
        } else {
            animation.elapsed = Fixed::ZERO;
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarter() -> Fixed {
        Fixed::from_num(1) / Fixed::from_num(4)
    }

    #[test]
    fn test_looping_wraps() {
        let mut clip = Animation::new(3, quarter(), true);
        for _ in 0..3 {
            advance(&mut clip, quarter());
        }
        assert_eq!(clip.frame, 0);
        advance(&mut clip, quarter());
        assert_eq!(clip.frame, 1);
    }

    #[test]
    fn test_one_shot_holds_last_frame() {
        let mut clip = Animation::new(3, quarter(), false);
        advance(&mut clip, Fixed::from_num(10));
        assert_eq!(clip.frame, 2);
        assert_eq!(clip.elapsed, Fixed::ZERO);
    }

    #[test]
    fn test_large_step_skips_frames() {
        let mut clip = Animation::new(8, quarter(), true);
        advance(&mut clip, Fixed::from_num(0.75));
        assert_eq!(clip.frame, 3);
    }

    #[test]
    fn test_system_updates_entities() {
        let mut world = World::default();
        let id = world.spawn();
        world.attach(id, Animation::new(4, quarter(), true));
        AnimationSystem.update(&mut world, quarter());
        assert_eq!(world.get::<Animation>(id).map(|a| a.frame), Some(1));
    }
}
