//! Error types for the game simulation.

use thiserror::Error;

use crate::components::EntityId;
use crate::players::PlayerId;
use crate::protocol::WireError;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
///
/// Systems never produce these: a failing entity is skipped for the tick.
/// Errors surface at the command boundary, the wire codec and data loading.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Player id not present in the registry.
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// A command referenced an entity owned by somebody else.
    #[error("Player {player} does not own entity {entity}")]
    NotOwner {
        /// Issuing player.
        player: PlayerId,
        /// Entity the command targeted.
        entity: EntityId,
    },

    /// The entity lacks a component the command needs.
    #[error("Entity {entity} has no {component} component")]
    MissingComponent {
        /// Entity the command targeted.
        entity: EntityId,
        /// Name of the missing component kind.
        component: &'static str,
    },

    /// Unit or building key with no tech tree entry.
    #[error("Unknown tech key: {0}")]
    UnknownTech(String),

    /// Tech tree requirement not met.
    #[error("Tech requirement not met: {0}")]
    TechRequirementNotMet(String),

    /// Insufficient resources.
    #[error("Insufficient credits: need {required}, have {available}")]
    InsufficientCredits {
        /// Amount required.
        required: i64,
        /// Amount available.
        available: i64,
    },

    /// Structures can only be placed by a player with a Construction Yard.
    #[error("Player {0} has no completed construction yard")]
    NoConstructionYard(PlayerId),

    /// Footprint out of bounds or overlapping an occupied tile.
    #[error("Cannot place {key} at ({x}, {y})")]
    PlacementBlocked {
        /// Building key.
        key: String,
        /// Footprint origin column.
        x: i32,
        /// Footprint origin row.
        y: i32,
    },

    /// Command payload that decoded fine but makes no sense.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Malformed lockstep wire record.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Reading a data or replay file failed.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Desync detected in multiplayer.
    #[error("Desync detected at tick {tick}: local hash {local_hash}, remote hash {remote_hash}")]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Local simulation hash.
        local_hash: u64,
        /// Remote simulation hash.
        remote_hash: u64,
    },
}
