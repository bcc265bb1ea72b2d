//! rigctl - manifold durability rig control
//!
//! Creates and checks rig files, previews temperature schedules, runs a
//! test against simulated devices and inspects the checkpoint log.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{CheckpointCommands, ConfigCommands, RunArgs};

#[derive(Parser)]
#[command(name = "rigctl")]
#[command(about = "Manifold durability rig control")]
#[command(version)]
#[command(long_about = "
rigctl drives the manifold durability rig: pressure cycling, fluid and
chamber temperature profiles, leak detection and checkpointed resume.

Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(long, global = true, help = "Output in JSON format for machine parsing")]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Rig file (YAML for .yaml/.yml, JSON otherwise)
    #[arg(
        short,
        long,
        global = true,
        env = "RIGCTL_FILE",
        default_value = "rig.yaml"
    )]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rig file commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Preview the fluid and chamber temperature schedules
    Schedule,

    /// Run the test profile against simulated devices
    Run(RunArgs),

    /// Checkpoint log commands
    #[command(subcommand)]
    Checkpoint(CheckpointCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("rigctl={log_level},manifold_rig={log_level},manifold_timing={log_level}")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match execute_command(&cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            std::process::exit(error::exit_code(&e));
        }
    }
}

async fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Config(cmd) => commands::config::execute(cmd, &cli.file, cli.json),
        Commands::Schedule => commands::schedule::execute(&cli.file, cli.json),
        Commands::Run(args) => commands::run::execute(args, &cli.file).await,
        Commands::Checkpoint(cmd) => commands::checkpoint::execute(cmd, &cli.file, cli.json),
    }
}
