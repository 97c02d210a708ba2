//! Replay playback against the skirmish scenario.
//!
//! Results are plain serde structs so the binary can print them as JSON on
//! stdout while logs go to stderr.

use rts_sim::config::{LockstepScheduler, SimConfig};
use rts_sim::error::Result;
use rts_sim::protocol::{CommandType, NetCommand};
use rts_sim::replay::{Replay, ReplayPlayer};
use rts_sim::scenario::skirmish_1v1_with_tech;
use rts_sim::tech::TechTree;
use rts_sim::world::World;
use serde::Serialize;

/// State of one player when playback stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    /// Player id.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Credits left.
    pub credits: i64,
    /// Power generated.
    pub power: i32,
    /// Power consumed.
    pub power_use: i32,
    /// Whether the player has been knocked out.
    pub defeated: bool,
}

/// Where playback ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Ticks run.
    pub tick: u64,
    /// State hash, hex encoded.
    pub state_hash: String,
    /// Entities alive.
    pub entities: usize,
    /// Commands in the replay.
    pub commands: usize,
    /// Per-player state.
    pub players: Vec<PlayerSummary>,
    /// Winning team, if the match was decided.
    pub winner: Option<i32>,
    /// Tick the match was decided on.
    pub decided_at: Option<u64>,
}

impl RunSummary {
    fn from_world(world: &World, commands: usize) -> Self {
        let outcome = world.outcome();
        Self {
            tick: world.tick_count(),
            state_hash: format!("{:016x}", world.state_hash()),
            entities: world.entity_count(),
            commands,
            players: world
                .players()
                .iter()
                .map(|p| PlayerSummary {
                    id: p.id,
                    name: p.name.clone(),
                    credits: p.credits,
                    power: p.power,
                    power_use: p.power_use,
                    defeated: p.defeated,
                })
                .collect(),
            winner: outcome.and_then(|o| o.winner),
            decided_at: outcome.map(|o| o.tick),
        }
    }
}

/// One replay record in readable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    /// Tick the command applies at.
    pub tick: u64,
    /// Issuing player.
    pub player_id: i32,
    /// Command kind.
    pub command_type: CommandType,
    /// Entity acted on.
    pub entity_id: u64,
    /// Target tile.
    pub target: (i32, i32),
    /// Payload, lossily decoded as UTF-8.
    pub param: String,
}

impl From<&NetCommand> for CommandRecord {
    fn from(command: &NetCommand) -> Self {
        Self {
            tick: command.tick,
            player_id: command.player_id,
            command_type: command.command_type,
            entity_id: command.entity_id,
            target: (command.target_x, command.target_y),
            param: String::from_utf8_lossy(&command.param).into_owned(),
        }
    }
}

/// Play `replay` on a fresh skirmish.
///
/// Runs to `ticks` when given, otherwise until the last recorded command
/// has been applied or the match is decided.
pub fn run_replay(
    replay: Replay,
    config: &SimConfig,
    tech: TechTree,
    ticks: Option<u64>,
) -> Result<RunSummary> {
    let commands = replay.len();
    let world = skirmish_1v1_with_tech(config, tech)?;
    let mut player = ReplayPlayer::new(replay, world, config.dt())?;

    match ticks {
        Some(target) => player.seek(target)?,
        None => {
            while player.advance() && player.world().outcome().is_none() {}
        }
    }

    let summary = RunSummary::from_world(player.world(), commands);
    tracing::info!(
        tick = summary.tick,
        hash = %summary.state_hash,
        "Replay finished"
    );
    Ok(summary)
}

/// Readable listing of every record.
#[must_use]
pub fn inspect(replay: &Replay) -> Vec<CommandRecord> {
    replay.commands().iter().map(CommandRecord::from).collect()
}

/// A short scripted opening for both players, stamped with the configured
/// input delay. Entity ids follow the skirmish layout.
#[must_use]
pub fn demo_replay(config: &SimConfig) -> Replay {
    let scheduler = LockstepScheduler::from_config(config);
    let east = config.map_width - 1;
    let mut replay = Replay::new();

    replay.record(scheduler.stamp(
        0,
        NetCommand::new(0, 1, CommandType::PlaceBuilding, 0)
            .with_target(9, 2)
            .with_param("barracks"),
    ));
    replay.record(scheduler.stamp(
        0,
        NetCommand::new(0, 2, CommandType::PlaceBuilding, 0)
            .with_target(east - 10, 2)
            .with_param("barracks"),
    ));
    replay.record(scheduler.stamp(
        40,
        NetCommand::new(0, 1, CommandType::MoveUnit, 5).with_target(config.map_width / 2, 8),
    ));
    replay.record(scheduler.stamp(
        40,
        NetCommand::new(0, 2, CommandType::MoveUnit, 11).with_target(config.map_width / 2, 9),
    ));
    replay.record(scheduler.stamp(
        60,
        NetCommand::new(0, 1, CommandType::Chat, 0).with_param("glhf"),
    ));
    replay
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_is_stamped_with_input_delay() {
        let config = SimConfig::default();
        let replay = demo_replay(&config);
        assert_eq!(replay.len(), 5);
        assert_eq!(replay.commands()[0].tick, config.input_delay_ticks);
        assert_eq!(replay.last_tick(), Some(60 + config.input_delay_ticks));
    }

    #[test]
    fn test_run_is_repeatable() {
        let config = SimConfig::default();
        let first = run_replay(demo_replay(&config), &config, TechTree::standard(), Some(120))
            .expect("runs");
        let second = run_replay(demo_replay(&config), &config, TechTree::standard(), Some(120))
            .expect("runs");
        assert_eq!(first.tick, 120);
        assert_eq!(first, second);
        assert_eq!(first.players.len(), 2);
        assert_eq!(first.commands, 5);
    }

    #[test]
    fn test_run_without_tick_limit_stops_after_last_command() {
        let config = SimConfig::default();
        let replay = demo_replay(&config);
        let last = replay.last_tick().expect("non-empty");
        let summary = run_replay(replay, &config, TechTree::standard(), None).expect("runs");
        assert_eq!(summary.tick, last + 1);
    }

    #[test]
    fn test_inspect_decodes_params() {
        let records = inspect(&demo_replay(&SimConfig::default()));
        assert_eq!(records[0].param, "barracks");
        assert_eq!(records[4].command_type, CommandType::Chat);
        let json = serde_json::to_string(&records[4]).expect("serializes");
        assert!(json.contains("\"param\":\"glhf\""));
    }
}
