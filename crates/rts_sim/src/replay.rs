//! Recording and playing back lockstep command streams.
//!
//! A replay file is nothing but wire records back to back, in the order
//! they were recorded. Playing it back against the same starting world
//! reproduces the match exactly, which is also how desyncs are chased.

use std::path::Path;

use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::protocol::{decode_all, encode_all, NetCommand};
use crate::world::World;

/// Ordered list of recorded commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replay {
    commands: Vec<NetCommand>,
}

impl Replay {
    /// Empty replay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay over an existing command list.
    #[must_use]
    pub fn from_commands(commands: Vec<NetCommand>) -> Self {
        Self { commands }
    }

    /// Append a command.
    pub fn record(&mut self, command: NetCommand) {
        self.commands.push(command);
    }

    /// All commands in recording order.
    #[must_use]
    pub fn commands(&self) -> &[NetCommand] {
        &self.commands
    }

    /// Number of recorded commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands stamped for `tick`, in recording order.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> Vec<&NetCommand> {
        self.commands.iter().filter(|cmd| cmd.tick == tick).collect()
    }

    /// Highest tick any command is stamped for.
    #[must_use]
    pub fn last_tick(&self) -> Option<u64> {
        self.commands.iter().map(|cmd| cmd.tick).max()
    }

    /// Encode to the on-disk format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode_all(&self.commands)?)
    }

    /// Decode the on-disk format. Trailing partial records are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_commands(decode_all(bytes)?))
    }

    /// Write the replay to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), commands = self.len(), bytes = bytes.len(), "Saved replay");
        Ok(())
    }

    /// Read a replay from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let replay = Self::from_bytes(&bytes)?;
        tracing::info!(path = %path.display(), commands = replay.len(), "Loaded replay");
        Ok(replay)
    }
}

/// Steps a world through a replay one tick at a time.
///
/// The starting world is snapshotted on construction, so seeking backwards
/// restores it and plays forward again.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    world: World,
    initial_state: Vec<u8>,
    dt: Fixed,
}

impl ReplayPlayer {
    /// Player starting from `world` as it is now.
    pub fn new(replay: Replay, world: World, dt: Fixed) -> Result<Self> {
        let initial_state = world.snapshot()?;
        Ok(Self {
            replay,
            world,
            initial_state,
            dt,
        })
    }

    /// Feed this tick's commands and run one tick.
    ///
    /// Returns true while recorded commands remain for later ticks.
    pub fn advance(&mut self) -> bool {
        let tick = self.world.tick_count();
        for command in self.replay.commands_at_tick(tick) {
            self.world.schedule(command.clone());
        }
        self.world.tick(self.dt);
        self.world.dispatch_events();
        self.has_more()
    }

    /// Play until `tick` ticks have run, restoring the start state first
    /// when seeking backwards.
    pub fn seek(&mut self, tick: u64) -> Result<()> {
        if tick < self.world.tick_count() {
            self.world.restore(&self.initial_state)?;
            tracing::debug!(tick, "Replay rewound");
        }
        while self.world.tick_count() < tick {
            self.advance();
        }
        Ok(())
    }

    /// Compare the current state against a hash recorded elsewhere.
    pub fn verify(&self, expected_hash: u64) -> Result<()> {
        self.world.verify_hash(expected_hash)
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.world.tick_count()
    }

    /// True while recorded commands remain for the current tick or later.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.replay
            .last_tick()
            .is_some_and(|last| last >= self.world.tick_count())
    }

    /// The replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// World being driven.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Give the world back.
    #[must_use]
    pub fn into_world(self) -> World {
        self.world
    }
}
