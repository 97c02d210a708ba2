//! Defeat and victory detection.

use std::collections::{BTreeMap, BTreeSet};

use crate::components::{ComponentKind, Owner};
use crate::events::GameEvent;
use crate::math::Fixed;
use crate::players::{PlayerId, TeamId};
use crate::world::{MatchOutcome, System, World};

use super::GAME_OVER_PRIORITY;

/// Marks players with nothing left as defeated and ends the match once at
/// most one team remains.
///
/// Matches with a single team never end. Entities marked for destruction
/// this tick already count as gone.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameOverSystem;

impl System for GameOverSystem {
    fn name(&self) -> &'static str {
        "game_over"
    }

    fn priority(&self) -> i32 {
        GAME_OVER_PRIORITY
    }

    fn update(&mut self, world: &mut World, _dt: Fixed) {
        if world.outcome().is_some() {
            return;
        }

        let mut assets: BTreeMap<PlayerId, usize> = BTreeMap::new();
        for id in world.query(&[ComponentKind::Owner, ComponentKind::Health]) {
            if world.is_pending_destroy(id) {
                continue;
            }
            if let Some(owner) = world.get::<Owner>(id) {
                *assets.entry(owner.player_id).or_default() += 1;
            }
        }

        let mut newly_defeated = Vec::new();
        for player in world.players_mut().iter_mut() {
            if !player.defeated && assets.get(&player.id).copied().unwrap_or(0) == 0 {
                player.defeated = true;
                newly_defeated.push(player.id);
            }
        }
        for player in newly_defeated {
            tracing::info!(player, tick = world.tick_count(), "Player defeated");
            world.emit(GameEvent::PlayerDefeated { player });
        }

        let teams: BTreeSet<TeamId> = world.players().iter().map(|p| p.team).collect();
        let alive: BTreeSet<TeamId> = world
            .players()
            .iter()
            .filter(|p| !p.defeated)
            .map(|p| p.team)
            .collect();
        if teams.len() < 2 || alive.len() > 1 {
            return;
        }

        let winner = alive.first().copied();
        let tick = world.tick_count();
        tracing::info!(?winner, tick, "Game over");
        world.set_outcome(MatchOutcome { winner, tick });
        world.emit(GameEvent::GameOver { winner });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Health;
    use crate::players::Player;

    fn world() -> World {
        let mut world = World::default();
        world.players_mut().insert(Player::new(1, "Red", 1, 0));
        world.players_mut().insert(Player::new(2, "Blue", 2, 0));
        world.players_mut().insert(Player::new(3, "Pink", 1, 0));
        world
    }

    fn asset(world: &mut World, player: PlayerId) -> u64 {
        let id = world.spawn();
        world.attach(id, Health::new(10));
        let owner = world.owner_for(player);
        world.attach(id, owner);
        id
    }

    fn count(world: &World, pred: impl Fn(&GameEvent) -> bool) -> usize {
        world.pending_events().iter().filter(|e| pred(e)).count()
    }

    #[test]
    fn test_last_team_standing_wins() {
        let mut world = world();
        asset(&mut world, 1);
        let blue = asset(&mut world, 2);
        asset(&mut world, 3);

        GameOverSystem.update(&mut world, Fixed::ONE);
        assert!(world.outcome().is_none());

        world.destroy(blue);
        GameOverSystem.update(&mut world, Fixed::ONE);
        GameOverSystem.update(&mut world, Fixed::ONE);

        assert_eq!(world.outcome().map(|o| o.winner), Some(Some(1)));
        assert!(world.players().get(2).is_some_and(|p| p.defeated));
        assert_eq!(count(&world, |e| matches!(e, GameEvent::PlayerDefeated { player: 2 })), 1);
        assert_eq!(count(&world, |e| matches!(e, GameEvent::GameOver { .. })), 1);
    }

    #[test]
    fn test_team_survives_while_any_member_does() {
        let mut world = world();
        asset(&mut world, 2);
        asset(&mut world, 3);

        GameOverSystem.update(&mut world, Fixed::ONE);
        assert!(world.players().get(1).is_some_and(|p| p.defeated));
        assert!(world.outcome().is_none());
    }

    #[test]
    fn test_mutual_destruction_has_no_winner() {
        let mut world = world();
        GameOverSystem.update(&mut world, Fixed::ONE);
        assert_eq!(world.outcome().map(|o| o.winner), Some(None));
    }

    #[test]
    fn test_single_team_never_ends() {
        let mut world = World::default();
        world.players_mut().insert(Player::new(1, "Red", 1, 0));
        GameOverSystem.update(&mut world, Fixed::ONE);
        assert!(world.outcome().is_none());
        assert!(world.players().get(1).is_some_and(|p| p.defeated));
    }
}
