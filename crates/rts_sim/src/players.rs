//! Player registry.
//!
//! Players live outside the component store. Systems read alliances and
//! power from here and write credits and power totals back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Player identifier as carried on the wire.
pub type PlayerId = i32;

/// Alliance group identifier.
pub type TeamId = i32;

/// A participant in the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Alliance group.
    pub team: TeamId,
    /// Spendable credits.
    pub credits: i64,
    /// Power generated, recomputed every tick.
    pub power: i32,
    /// Power consumed, recomputed every tick.
    pub power_use: i32,
    /// Set once the player has nothing left.
    pub defeated: bool,
}

impl Player {
    /// Create a player with starting credits.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>, team: TeamId, credits: i64) -> Self {
        Self {
            id,
            name: name.into(),
            team,
            credits,
            power: 0,
            power_use: 0,
            defeated: false,
        }
    }

    /// Whether generation covers consumption.
    #[must_use]
    pub const fn has_power(&self) -> bool {
        self.power >= self.power_use
    }
}

/// Players by id, iterated in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRegistry {
    players: BTreeMap<PlayerId, Player>,
}

impl PlayerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a player.
    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    /// Look up a player.
    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Look up a player mutably.
    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Iterate players in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Iterate players mutably in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Registered ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    /// Number of players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no players are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Team of a player, `None` if unknown.
    #[must_use]
    pub fn team_of(&self, id: PlayerId) -> Option<TeamId> {
        self.players.get(&id).map(|p| p.team)
    }

    /// Whether the player exists and has enough power. Unknown players are
    /// treated as powered.
    #[must_use]
    pub fn has_power(&self, id: PlayerId) -> bool {
        self.players.get(&id).map_or(true, Player::has_power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_power_boundary() {
        let mut player = Player::new(1, "Red", 1, 0);
        player.power = 100;
        player.power_use = 100;
        assert!(player.has_power());
        player.power_use = 101;
        assert!(!player.has_power());
    }

    #[test]
    fn test_registry_ordering_and_lookup() {
        let mut registry = PlayerRegistry::new();
        registry.insert(Player::new(2, "Blue", 2, 1000));
        registry.insert(Player::new(1, "Red", 1, 500));
        assert_eq!(registry.ids(), vec![1, 2]);
        assert_eq!(registry.team_of(2), Some(2));
        assert_eq!(registry.team_of(9), None);
        assert!(registry.has_power(9));
    }
}
