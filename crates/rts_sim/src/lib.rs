//! # RTS Sim
//!
//! Deterministic simulation core for a lockstep real-time strategy game.
//!
//! Everything in here is reproducible bit for bit:
//! - Fixed-point math only, no floats in game state
//! - Entities and players iterate in ascending id order
//! - No system randomness and no wall-clock reads inside a tick
//!
//! Two peers that start from the same [`world::World`] and apply the same
//! [`protocol::NetCommand`] stream end up with identical snapshots, which
//! is what lockstep multiplayer and replays rely on.
//!
//! ## Crate Structure
//!
//! - [`world`] - Entity store, system scheduler, snapshots
//! - [`components`] - Closed set of component types
//! - [`systems`] - Gameplay systems run every tick
//! - [`game_loop`] - Fixed-timestep driver
//! - [`events`] - Deferred event bus
//! - [`orders`] - Validated application of player commands
//! - [`protocol`] - Lockstep wire records
//! - [`replay`] - Command recordings and playback
//! - [`math`] - Fixed-point vectors

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod game_loop;
pub mod map;
pub mod math;
pub mod orders;
pub mod pathing;
pub mod players;
pub mod protocol;
pub mod replay;
pub mod scenario;
pub mod spawn;
pub mod systems;
pub mod tech;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{DispatchPolicy, LockstepScheduler, SimConfig};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{EventBus, EventKind, GameEvent};
    pub use crate::game_loop::{GameLoop, GameState};
    pub use crate::map::{Terrain, TileCoord, TileGrid, TileOccupancy};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::pathing::{DirectPathfinder, Pathfinder};
    pub use crate::players::{Player, PlayerId, PlayerRegistry, TeamId};
    pub use crate::protocol::{CommandType, NetCommand, WireError};
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::tech::{TechDefinition, TechKind, TechTree};
    pub use crate::world::{MatchOutcome, System, World};
}
