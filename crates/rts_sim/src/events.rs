//! Deferred domain events.
//!
//! Systems [`emit`](EventBus::emit) while the tick runs. Nothing is delivered
//! until the owner calls [`dispatch`](EventBus::dispatch) after the tick, so
//! handlers never observe a half-finished system pass. Handlers only see the
//! event itself and cannot reach back into the world.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::components::{DamageType, EntityId};
use crate::players::{PlayerId, TeamId};

/// Something that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A weapon fired.
    Attack {
        /// Shooter.
        attacker: EntityId,
        /// Target.
        target: EntityId,
        /// Whether a projectile was spawned instead of instant damage.
        projectile: bool,
    },
    /// Damage was applied.
    Damaged {
        /// Entity hit.
        entity: EntityId,
        /// Hit points removed.
        amount: i32,
        /// Damage type.
        damage_type: DamageType,
    },
    /// Health reached zero. Emitted once per entity.
    UnitDestroyed {
        /// Entity destroyed.
        entity: EntityId,
        /// Owner at time of death, if any.
        owner: Option<PlayerId>,
    },
    /// A projectile reached its target.
    ProjectileHit {
        /// Projectile entity.
        projectile: EntityId,
        /// Intended target.
        target: EntityId,
        /// Number of entities damaged.
        hits: u32,
    },
    /// A harvester unloaded cargo.
    ResourceHarvested {
        /// Harvester entity.
        harvester: EntityId,
        /// Credited player.
        player: PlayerId,
        /// Credits added.
        credits: i64,
    },
    /// Production finished a unit.
    UnitCreated {
        /// New entity.
        entity: EntityId,
        /// Owner.
        player: PlayerId,
        /// Tech key.
        key: String,
    },
    /// A structure was placed and construction started.
    BuildingPlaced {
        /// New entity.
        entity: EntityId,
        /// Owner.
        player: PlayerId,
        /// Tech key.
        key: String,
    },
    /// Construction finished.
    BuildingCompleted {
        /// Structure.
        entity: EntityId,
        /// Owner.
        player: PlayerId,
        /// Tech key.
        key: String,
    },
    /// A structure was sold.
    BuildingSold {
        /// Structure.
        entity: EntityId,
        /// Owner.
        player: PlayerId,
        /// Credits refunded.
        refund: i64,
    },
    /// Player chat.
    ChatMessage {
        /// Sender.
        player: PlayerId,
        /// Message body.
        text: String,
    },
    /// A player has no units or buildings left.
    PlayerDefeated {
        /// Defeated player.
        player: PlayerId,
    },
    /// The match ended.
    GameOver {
        /// Winning team, `None` on mutual destruction.
        winner: Option<TeamId>,
    },
}

/// Tag of a [`GameEvent`], used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// [`GameEvent::Attack`].
    Attack,
    /// [`GameEvent::Damaged`].
    Damaged,
    /// [`GameEvent::UnitDestroyed`].
    UnitDestroyed,
    /// [`GameEvent::ProjectileHit`].
    ProjectileHit,
    /// [`GameEvent::ResourceHarvested`].
    ResourceHarvested,
    /// [`GameEvent::UnitCreated`].
    UnitCreated,
    /// [`GameEvent::BuildingPlaced`].
    BuildingPlaced,
    /// [`GameEvent::BuildingCompleted`].
    BuildingCompleted,
    /// [`GameEvent::BuildingSold`].
    BuildingSold,
    /// [`GameEvent::ChatMessage`].
    ChatMessage,
    /// [`GameEvent::PlayerDefeated`].
    PlayerDefeated,
    /// [`GameEvent::GameOver`].
    GameOver,
}

impl GameEvent {
    /// Tag of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Attack { .. } => EventKind::Attack,
            Self::Damaged { .. } => EventKind::Damaged,
            Self::UnitDestroyed { .. } => EventKind::UnitDestroyed,
            Self::ProjectileHit { .. } => EventKind::ProjectileHit,
            Self::ResourceHarvested { .. } => EventKind::ResourceHarvested,
            Self::UnitCreated { .. } => EventKind::UnitCreated,
            Self::BuildingPlaced { .. } => EventKind::BuildingPlaced,
            Self::BuildingCompleted { .. } => EventKind::BuildingCompleted,
            Self::BuildingSold { .. } => EventKind::BuildingSold,
            Self::ChatMessage { .. } => EventKind::ChatMessage,
            Self::PlayerDefeated { .. } => EventKind::PlayerDefeated,
            Self::GameOver { .. } => EventKind::GameOver,
        }
    }
}

type Handler = Box<dyn FnMut(&GameEvent)>;

/// Queue of events plus the handlers they are delivered to.
#[derive(Default)]
pub struct EventBus {
    queue: Vec<GameEvent>,
    handlers: Vec<(EventKind, Handler)>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("queue", &self.queue)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl EventBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the next dispatch.
    pub fn emit(&mut self, event: GameEvent) {
        self.queue.push(event);
    }

    /// Register a handler for one event kind. Handlers for the same kind run
    /// in registration order.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F)
    where
        F: FnMut(&GameEvent) + 'static,
    {
        self.handlers.push((kind, Box::new(handler)));
    }

    /// Deliver every queued event in emission order, then clear the queue.
    /// Returns the number of events delivered.
    pub fn dispatch(&mut self) -> usize {
        let events = std::mem::take(&mut self.queue);
        for event in &events {
            let kind = event.kind();
            for (_, handler) in self.handlers.iter_mut().filter(|(k, _)| *k == kind) {
                handler(event);
            }
        }
        events.len()
    }

    /// Events waiting for dispatch.
    #[must_use]
    pub fn pending(&self) -> &[GameEvent] {
        &self.queue
    }

    /// Drop queued events without delivering them.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_emit_is_deferred_until_dispatch() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = Rc::clone(&seen);
        bus.subscribe(EventKind::PlayerDefeated, move |e| sink.borrow_mut().push(e.clone()));

        bus.emit(GameEvent::PlayerDefeated { player: 1 });
        assert!(seen.borrow().is_empty());
        assert_eq!(bus.pending().len(), 1);

        assert_eq!(bus.dispatch(), 1);
        assert_eq!(seen.borrow().as_slice(), &[GameEvent::PlayerDefeated { player: 1 }]);
        assert!(bus.pending().is_empty());
    }

    #[test]
    fn test_dispatch_filters_by_kind_and_keeps_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let first = Rc::clone(&log);
        bus.subscribe(EventKind::ChatMessage, move |_| first.borrow_mut().push("first"));
        let second = Rc::clone(&log);
        bus.subscribe(EventKind::ChatMessage, move |_| second.borrow_mut().push("second"));
        let other = Rc::clone(&log);
        bus.subscribe(EventKind::GameOver, move |_| other.borrow_mut().push("game_over"));

        bus.emit(GameEvent::ChatMessage {
            player: 1,
            text: "gl hf".to_string(),
        });
        bus.dispatch();
        assert_eq!(log.borrow().as_slice(), &["first", "second"]);
    }

    #[test]
    fn test_clear_drops_events() {
        let mut bus = EventBus::new();
        bus.emit(GameEvent::GameOver { winner: None });
        bus.clear();
        assert_eq!(bus.dispatch(), 0);
    }
}
