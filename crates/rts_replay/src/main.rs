//! RTS replay runner.
//!
//! Plays recorded lockstep command streams without graphics.
//!
//! # Usage
//!
//! ```bash
//! # Write a demo replay, then play it for 600 ticks
//! cargo run -p rts_replay -- record-demo demo.replay
//! cargo run -p rts_replay -- run demo.replay --ticks 600
//!
//! # List the records in a replay
//! cargo run -p rts_replay -- inspect demo.replay
//! ```
//!
//! Results are JSON on stdout. Logs go to stderr and honour `RUST_LOG`.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rts_replay::{runner, validate};
use rts_sim::config::SimConfig;
use rts_sim::error::Result;
use rts_sim::replay::Replay;
use rts_sim::tech::TechTree;

#[derive(Parser)]
#[command(name = "rts_replay")]
#[command(about = "Replay runner for deterministic RTS matches")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a replay against the 1v1 skirmish
    Run {
        /// Replay file path
        file: PathBuf,

        /// Stop after this many ticks instead of after the last command
        #[arg(short, long)]
        ticks: Option<u64>,

        /// RON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// RON tech tree file
        #[arg(long)]
        tech: Option<PathBuf>,

        /// Fail unless the final state hash matches (hex)
        #[arg(long)]
        expect_hash: Option<String>,
    },

    /// List the commands in a replay
    Inspect {
        /// Replay file path
        file: PathBuf,
    },

    /// Write a short scripted replay
    RecordDemo {
        /// Output path
        output: PathBuf,

        /// RON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate config and tech data files
    Validate {
        /// RON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// RON tech tree file
        #[arg(long)]
        tech: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // stdout carries results, so logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let outcome = match cli.command {
        Commands::Run {
            file,
            ticks,
            config,
            tech,
            expect_hash,
        } => cmd_run(&file, ticks, config.as_deref(), tech.as_deref(), expect_hash),
        Commands::Inspect { file } => cmd_inspect(&file),
        Commands::RecordDemo { output, config } => cmd_record_demo(&output, config.as_deref()),
        Commands::Validate { config, tech } => {
            validate::validate_files(config.as_deref(), tech.as_deref()).map(|()| {
                tracing::info!("Validation passed");
            })
        }
    };

    if let Err(e) = outcome {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    path.map_or_else(|| Ok(SimConfig::default()), SimConfig::load)
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("Failed to serialize output: {e}"),
    }
}

fn cmd_run(
    file: &Path,
    ticks: Option<u64>,
    config: Option<&Path>,
    tech: Option<&Path>,
    expect_hash: Option<String>,
) -> Result<()> {
    let config = load_config(config)?;
    let tech = tech.map_or_else(|| Ok(TechTree::standard()), TechTree::load)?;
    let replay = Replay::load(file)?;
    tracing::info!(file = %file.display(), commands = replay.len(), "Playing replay");

    let summary = runner::run_replay(replay, &config, tech, ticks)?;
    print_json(&summary);

    if let Some(expected) = expect_hash {
        let expected = expected.trim_start_matches("0x").to_lowercase();
        if summary.state_hash != expected {
            return Err(rts_sim::error::GameError::InvalidState(format!(
                "state hash {} does not match expected {expected}",
                summary.state_hash
            )));
        }
        tracing::info!("Replay hash verified");
    }
    Ok(())
}

fn cmd_inspect(file: &Path) -> Result<()> {
    let replay = Replay::load(file)?;
    print_json(&runner::inspect(&replay));
    Ok(())
}

fn cmd_record_demo(output: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let replay = runner::demo_replay(&config);
    replay.save(output)?;
    eprintln!("Wrote {} commands to {}", replay.len(), output.display());
    Ok(())
}
