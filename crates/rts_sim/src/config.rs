//! Simulation settings and lockstep input scheduling.
//!
//! Settings are plain serde data read from RON. Every field has a default,
//! so a config file only lists what it changes:
//!
//! ```ron
//! (
//!     tick_rate: 30,
//!     input_delay_ticks: 3,
//! )
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::protocol::NetCommand;

/// Simulation ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 20;

/// When queued events are handed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispatchPolicy {
    /// After every simulation tick, so catch-up frames keep per-tick order.
    #[default]
    PerTick,
    /// Once per outer frame, after all of that frame's ticks.
    PerFrame,
}

/// Tunables for one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed steps per simulated second.
    pub tick_rate: u32,
    /// Longest wall-clock frame the game loop will catch up on, in
    /// milliseconds.
    pub max_frame_time_ms: u64,
    /// Ticks between issuing a command and applying it.
    pub input_delay_ticks: u64,
    /// Event delivery policy.
    pub dispatch: DispatchPolicy,
    /// Credits each player starts with.
    pub starting_credits: i64,
    /// Map width in tiles.
    pub map_width: i32,
    /// Map height in tiles.
    pub map_height: i32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_frame_time_ms: 250,
            input_delay_ticks: 2,
            dispatch: DispatchPolicy::PerTick,
            starting_credits: 5000,
            map_width: 64,
            map_height: 64,
        }
    }
}

impl SimConfig {
    /// Length of one tick in simulated seconds.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }

    /// Length of one tick in wall-clock time.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }

    /// Frame time clamp for the game loop.
    #[must_use]
    pub const fn max_frame_time(&self) -> Duration {
        Duration::from_millis(self.max_frame_time_ms)
    }

    /// Parse a RON config.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        Self::parse(text, "<inline>")
    }

    /// Load a RON config from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&text, &path.display().to_string())?;
        tracing::info!(path = %path.display(), tick_rate = config.tick_rate, "Loaded config");
        Ok(config)
    }

    fn parse(text: &str, origin: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        if config.tick_rate == 0 {
            return Err(GameError::DataParseError {
                path: origin.to_string(),
                message: "tick_rate must be positive".to_string(),
            });
        }
        if config.map_width <= 0 || config.map_height <= 0 {
            return Err(GameError::DataParseError {
                path: origin.to_string(),
                message: format!(
                    "map size {}x{} is empty",
                    config.map_width, config.map_height
                ),
            });
        }
        Ok(config)
    }
}

/// Stamps local commands with the tick every peer will apply them at.
///
/// Commands issued during tick `t` are applied at `t + input_delay`, which
/// gives them time to reach the other peers before anyone needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockstepScheduler {
    input_delay: u64,
}

impl LockstepScheduler {
    /// Scheduler with a fixed delay in ticks.
    #[must_use]
    pub const fn new(input_delay: u64) -> Self {
        Self { input_delay }
    }

    /// Scheduler using the configured delay.
    #[must_use]
    pub const fn from_config(config: &SimConfig) -> Self {
        Self::new(config.input_delay_ticks)
    }

    /// Configured delay.
    #[must_use]
    pub const fn input_delay(&self) -> u64 {
        self.input_delay
    }

    /// Set the command's tick to `current_tick + input_delay`.
    #[must_use]
    pub fn stamp(&self, current_tick: u64, mut command: NetCommand) -> NetCommand {
        command.tick = current_tick.saturating_add(self.input_delay);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CommandType;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.dt(), Fixed::ONE / Fixed::from_num(20));
        assert_eq!(config.tick_duration(), Duration::from_millis(50));
        assert_eq!(config.max_frame_time(), Duration::from_millis(250));
        assert_eq!(config.dispatch, DispatchPolicy::PerTick);
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = SimConfig::from_ron_str("(tick_rate: 16, dispatch: PerFrame)").expect("config");
        assert_eq!(config.tick_rate, 16);
        assert_eq!(config.dt(), Fixed::from_num(0.0625));
        assert_eq!(config.dispatch, DispatchPolicy::PerFrame);
        assert_eq!(config.input_delay_ticks, 2);
        assert_eq!(config.starting_credits, 5000);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            SimConfig::from_ron_str("(tick_rate: 0)"),
            Err(GameError::DataParseError { .. })
        ));
        assert!(matches!(
            SimConfig::from_ron_str("(map_width: -3)"),
            Err(GameError::DataParseError { .. })
        ));
        assert!(SimConfig::from_ron_str("(tick_rate: \"fast\")").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sim.ron");
        std::fs::write(&path, "(input_delay_ticks: 3)").expect("write");
        let config = SimConfig::load(&path).expect("load");
        assert_eq!(config.input_delay_ticks, 3);

        assert!(matches!(
            SimConfig::load(dir.path().join("missing.ron")),
            Err(GameError::Io { .. })
        ));
    }

    #[test]
    fn test_scheduler_applies_input_delay() {
        let scheduler = LockstepScheduler::from_config(&SimConfig::default());
        let command = scheduler.stamp(40, NetCommand::new(0, 1, CommandType::StopUnit, 7));
        assert_eq!(command.tick, 42);
        assert_eq!(command.entity_id, 7);
    }
}
