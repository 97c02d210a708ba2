//! The world: entity store, system pipeline and tick entry point.
//!
//! # Determinism
//!
//! - Entities live in a `BTreeMap`, so every iteration and every
//!   [`query`](World::query) is in ascending id order.
//! - Ids come from a counter owned by the world, never from global state.
//! - Systems run in a stable priority order fixed at registration.
//! - Destruction is deferred until every system has run, so within a tick a
//!   destroyed entity can still be read.
//!
//! # Example
//!
//! ```
//! use rts_sim::components::{ComponentKind, Health, Position};
//! use rts_sim::math::{Fixed, Vec2Fixed};
//! use rts_sim::world::World;
//!
//! let mut world = World::default();
//! let a = world.spawn();
//! world.attach(a, Position::new(Vec2Fixed::ZERO));
//! world.attach(a, Health::new(10));
//! let b = world.spawn();
//! world.attach(b, Position::new(Vec2Fixed::ZERO));
//!
//! assert_eq!(world.query(&[ComponentKind::Position, ComponentKind::Health]), vec![a]);
//!
//! world.destroy(a);
//! assert!(world.contains(a));
//! world.tick(Fixed::from_num(1) / Fixed::from_num(20));
//! assert!(!world.contains(a));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::components::{
    BuildingConstruction, BuildingName, Component, ComponentData, ComponentKind, EntityId, Movable,
    Owner, Position,
};
use crate::error::{GameError, Result};
use crate::events::{EventBus, GameEvent};
use crate::map::{TileCoord, TileGrid, TileOccupancy};
use crate::math::Fixed;
use crate::orders;
use crate::pathing::{DirectPathfinder, Pathfinder};
use crate::players::{PlayerId, PlayerRegistry, TeamId};
use crate::protocol::NetCommand;
use crate::systems::fog::FogOfWar;
use crate::tech::TechTree;

/// A gameplay system run once per tick.
pub trait System {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Lower runs earlier.
    fn priority(&self) -> i32;

    /// Advance this system by `dt` seconds.
    fn update(&mut self, world: &mut World, dt: Fixed);
}

/// Components of one entity, keyed by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    components: BTreeMap<ComponentKind, Component>,
}

impl EntityRecord {
    /// Component kinds present, in tag order.
    pub fn kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.components.keys().copied()
    }

    /// Number of components attached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether no components are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// How a finished match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Surviving team, `None` if nobody survived.
    pub winner: Option<TeamId>,
    /// Tick the match ended on.
    pub tick: u64,
}

/// Everything that is part of the deterministic state.
///
/// This is what snapshots and state hashes cover.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// Ticks completed.
    pub tick: u64,
    /// Next id handed out by `spawn`.
    pub next_id: EntityId,
    /// Entities in id order.
    pub entities: BTreeMap<EntityId, EntityRecord>,
    /// Player registry.
    pub players: PlayerRegistry,
    /// Tile map.
    pub grid: TileGrid,
    /// Per-player visibility.
    pub fog: FogOfWar,
    /// Set once the match is decided.
    pub outcome: Option<MatchOutcome>,
}

/// Simulation world.
pub struct World {
    state: WorldState,
    pending_destroy: BTreeSet<EntityId>,
    systems: Vec<Box<dyn System>>,
    events: EventBus,
    tech: TechTree,
    pathfinder: Box<dyn Pathfinder>,
    scheduled: BTreeMap<u64, Vec<NetCommand>>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.state.tick)
            .field("entities", &self.state.entities.len())
            .field("pending_destroy", &self.pending_destroy)
            .field("systems", &self.system_names())
            .field("events", &self.events)
            .field("scheduled", &self.scheduled.len())
            .finish_non_exhaustive()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(TileGrid::new(32, 32), TechTree::standard())
    }
}

impl World {
    /// Empty world over a map, with no systems registered.
    #[must_use]
    pub fn new(grid: TileGrid, tech: TechTree) -> Self {
        let fog = FogOfWar::new(grid.width(), grid.height());
        Self {
            state: WorldState {
                tick: 0,
                next_id: 1,
                entities: BTreeMap::new(),
                players: PlayerRegistry::new(),
                grid,
                fog,
                outcome: None,
            },
            pending_destroy: BTreeSet::new(),
            systems: Vec::new(),
            events: EventBus::new(),
            tech,
            pathfinder: Box::new(DirectPathfinder),
            scheduled: BTreeMap::new(),
        }
    }

    /// Builder: replace the pathfinding service.
    #[must_use]
    pub fn with_pathfinder(mut self, pathfinder: Box<dyn Pathfinder>) -> Self {
        self.pathfinder = pathfinder;
        self
    }

    /// Builder: register every gameplay system.
    #[must_use]
    pub fn with_standard_systems(mut self) -> Self {
        crate::systems::install_standard_systems(&mut self);
        self
    }

    // ------------------------------------------------------------------
    // Entity store
    // ------------------------------------------------------------------

    /// Allocate a fresh entity with no components.
    pub fn spawn(&mut self) -> EntityId {
        let id = self.state.next_id;
        self.state.next_id += 1;
        self.state.entities.insert(id, EntityRecord::default());
        id
    }

    /// Whether the entity is in the store (pending destruction included).
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.state.entities.contains_key(&id)
    }

    /// Attach a component, replacing one of the same kind. Does nothing if
    /// the entity does not exist.
    pub fn attach(&mut self, id: EntityId, component: impl Into<Component>) {
        if let Some(record) = self.state.entities.get_mut(&id) {
            let component = component.into();
            record.components.insert(component.kind(), component);
        }
    }

    /// Remove a component, returning it.
    pub fn detach(&mut self, id: EntityId, kind: ComponentKind) -> Option<Component> {
        self.state.entities.get_mut(&id)?.components.remove(&kind)
    }

    /// Untyped component lookup.
    #[must_use]
    pub fn get_component(&self, id: EntityId, kind: ComponentKind) -> Option<&Component> {
        self.state.entities.get(&id)?.components.get(&kind)
    }

    /// Typed component lookup.
    #[must_use]
    pub fn get<T: ComponentData>(&self, id: EntityId) -> Option<&T> {
        self.get_component(id, T::KIND).and_then(T::from_component)
    }

    /// Typed mutable component lookup.
    pub fn get_mut<T: ComponentData>(&mut self, id: EntityId) -> Option<&mut T> {
        self.state
            .entities
            .get_mut(&id)?
            .components
            .get_mut(&T::KIND)
            .and_then(T::from_component_mut)
    }

    /// Whether the entity holds a component of this kind.
    #[must_use]
    pub fn has(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.get_component(id, kind).is_some()
    }

    /// Entity record, if present.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&EntityRecord> {
        self.state.entities.get(&id)
    }

    /// Every entity holding all of `kinds`, ascending id order.
    ///
    /// Entities marked for destruction are still returned until the sweep at
    /// the end of the tick.
    #[must_use]
    pub fn query(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        self.state
            .entities
            .iter()
            .filter(|(_, record)| kinds.iter().all(|k| record.components.contains_key(k)))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.state.entities.len()
    }

    /// Mark an entity for removal at the end of the tick. Returns true only
    /// the first time a live entity is marked.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.pending_destroy.insert(id)
    }

    /// Whether the entity is marked for removal.
    #[must_use]
    pub fn is_pending_destroy(&self, id: EntityId) -> bool {
        self.pending_destroy.contains(&id)
    }

    fn sweep_destroyed(&mut self) {
        for id in std::mem::take(&mut self.pending_destroy) {
            let Some(record) = self.state.entities.remove(&id) else {
                continue;
            };
            let building = record
                .components
                .get(&ComponentKind::Building)
                .and_then(crate::components::Building::from_component);
            if let Some(building) = building {
                for tile in building.footprint() {
                    self.state.grid.set_occupied(tile.x, tile.y, false);
                }
            }
            tracing::trace!(entity = id, "Removed entity");
        }
    }

    // ------------------------------------------------------------------
    // Systems and ticking
    // ------------------------------------------------------------------

    /// Register a system. Systems are kept sorted by ascending priority;
    /// equal priorities keep registration order.
    pub fn add_system(&mut self, system: impl System + 'static) {
        self.add_boxed_system(Box::new(system));
    }

    /// Register an already boxed system.
    pub fn add_boxed_system(&mut self, system: Box<dyn System>) {
        tracing::debug!(system = system.name(), priority = system.priority(), "Registered system");
        self.systems.push(system);
        self.systems.sort_by_key(|s| s.priority());
    }

    /// Names of registered systems in run order.
    #[must_use]
    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    /// Advance one fixed step: apply this tick's scheduled commands, run
    /// every system in order, sweep destroyed entities, bump the counter.
    pub fn tick(&mut self, dt: Fixed) {
        self.apply_scheduled_commands();

        let mut systems = std::mem::take(&mut self.systems);
        for system in &mut systems {
            system.update(self, dt);
        }
        let added_during_tick = std::mem::replace(&mut self.systems, systems);
        for system in added_during_tick {
            self.add_boxed_system(system);
        }

        self.sweep_destroyed();
        self.state.tick += 1;

        #[cfg(debug_assertions)]
        {
            if tracing::enabled!(tracing::Level::TRACE) {
                tracing::trace!(
                    tick = self.state.tick,
                    state_hash = self.state_hash(),
                    "Simulation state hash"
                );
            }
        }
    }

    /// Ticks completed so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.state.tick
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Queue a command for the tick it names. Commands for ticks that
    /// already ran are dropped and `false` is returned.
    pub fn schedule(&mut self, command: NetCommand) -> bool {
        if command.tick < self.state.tick {
            tracing::warn!(
                command_tick = command.tick,
                tick = self.state.tick,
                player = command.player_id,
                "Dropping late command"
            );
            return false;
        }
        self.scheduled.entry(command.tick).or_default().push(command);
        true
    }

    /// Commands waiting for future ticks.
    #[must_use]
    pub fn scheduled_len(&self) -> usize {
        self.scheduled.values().map(Vec::len).sum()
    }

    fn apply_scheduled_commands(&mut self) {
        let Some(commands) = self.scheduled.remove(&self.state.tick) else {
            return;
        };
        for command in &commands {
            if let Err(err) = orders::apply_command(self, command) {
                tracing::warn!(
                    tick = self.state.tick,
                    player = command.player_id,
                    command = ?command.command_type,
                    error = %err,
                    "Rejected command"
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Queue an event for the next dispatch.
    pub fn emit(&mut self, event: GameEvent) {
        self.events.emit(event);
    }

    /// Event bus, for subscribing.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Events waiting for dispatch.
    #[must_use]
    pub fn pending_events(&self) -> &[GameEvent] {
        self.events.pending()
    }

    /// Deliver queued events to their handlers.
    pub fn dispatch_events(&mut self) -> usize {
        self.events.dispatch()
    }

    // ------------------------------------------------------------------
    // Shared state
    // ------------------------------------------------------------------

    /// Player registry.
    #[must_use]
    pub const fn players(&self) -> &PlayerRegistry {
        &self.state.players
    }

    /// Mutable player registry.
    pub fn players_mut(&mut self) -> &mut PlayerRegistry {
        &mut self.state.players
    }

    /// Tile map.
    #[must_use]
    pub const fn grid(&self) -> &TileGrid {
        &self.state.grid
    }

    /// Mutable tile map.
    pub fn grid_mut(&mut self) -> &mut TileGrid {
        &mut self.state.grid
    }

    /// Visibility layers.
    #[must_use]
    pub const fn fog(&self) -> &FogOfWar {
        &self.state.fog
    }

    /// Mutable visibility layers.
    pub fn fog_mut(&mut self) -> &mut FogOfWar {
        &mut self.state.fog
    }

    /// Tech tree.
    #[must_use]
    pub const fn tech(&self) -> &TechTree {
        &self.tech
    }

    /// Pathfinding service.
    #[must_use]
    pub fn pathfinder(&self) -> &dyn Pathfinder {
        self.pathfinder.as_ref()
    }

    /// Match result, once decided.
    #[must_use]
    pub const fn outcome(&self) -> Option<MatchOutcome> {
        self.state.outcome
    }

    /// Record the match result.
    pub fn set_outcome(&mut self, outcome: MatchOutcome) {
        self.state.outcome = Some(outcome);
    }

    // ------------------------------------------------------------------
    // Helpers shared by systems and orders
    // ------------------------------------------------------------------

    /// Owner component for a player, team taken from the registry.
    #[must_use]
    pub fn owner_for(&self, player: PlayerId) -> Owner {
        Owner {
            player_id: player,
            team_id: self.state.players.team_of(player).unwrap_or(player),
        }
    }

    /// Team of an owner, preferring the registry over the component.
    #[must_use]
    pub fn team_of(&self, owner: &Owner) -> TeamId {
        self.state
            .players
            .team_of(owner.player_id)
            .unwrap_or(owner.team_id)
    }

    /// Whether two owners are on different teams.
    #[must_use]
    pub fn are_enemies(&self, a: &Owner, b: &Owner) -> bool {
        self.team_of(a) != self.team_of(b)
    }

    /// Whether a structure has finished construction. Entities without a
    /// construction component count as complete.
    #[must_use]
    pub fn is_complete(&self, id: EntityId) -> bool {
        self.get::<BuildingConstruction>(id).map_or(true, |c| c.complete)
    }

    /// Keys of completed buildings a player owns.
    #[must_use]
    pub fn completed_buildings(&self, player: PlayerId) -> BTreeSet<String> {
        self.query(&[ComponentKind::BuildingName, ComponentKind::Owner])
            .into_iter()
            .filter(|&id| self.get::<Owner>(id).is_some_and(|o| o.player_id == player))
            .filter(|&id| self.is_complete(id) && !self.is_pending_destroy(id))
            .filter_map(|id| self.get::<BuildingName>(id).map(|n| n.key.clone()))
            .collect()
    }

    /// Ask the pathfinder for a route to `goal` and hand it to the entity's
    /// `Movable`. Returns false if there is no route or nothing to move.
    pub fn issue_move(&mut self, id: EntityId, goal: TileCoord) -> bool {
        let (Some(position), Some(movable)) = (self.get::<Position>(id), self.get::<Movable>(id))
        else {
            return false;
        };
        let start = position.tile();
        let pass_mask = movable.pass_mask;

        let path = self
            .pathfinder
            .find_path(&self.state.grid, start, goal, pass_mask)
            .map(|p| self.pathfinder.smooth_path(&self.state.grid, p, pass_mask));

        match (path, self.get_mut::<Movable>(id)) {
            (Some(path), Some(movable)) => {
                movable.set_path(path);
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Deterministic state.
    #[must_use]
    pub const fn state(&self) -> &WorldState {
        &self.state
    }

    /// Serialize the deterministic state with bincode.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.state)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize world: {e}")))
    }

    /// Replace the deterministic state from a snapshot. Systems, tech tree,
    /// handlers and the pathfinder are kept; pending commands and events are
    /// cleared.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<()> {
        let state: WorldState = bincode::deserialize(bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize world: {e}")))?;
        self.state = state;
        self.pending_destroy.clear();
        self.scheduled.clear();
        self.events.clear();
        Ok(())
    }

    /// Hash of the snapshot bytes, for desync checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self.snapshot() {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(_) => self.state.tick.hash(&mut hasher),
        }
        hasher.finish()
    }

    /// Compare against a peer's hash for the current tick.
    pub fn verify_hash(&self, remote_hash: u64) -> Result<()> {
        let local_hash = self.state_hash();
        if local_hash == remote_hash {
            Ok(())
        } else {
            Err(GameError::DesyncDetected {
                tick: self.state.tick,
                local_hash,
                remote_hash,
            })
        }
    }
}
