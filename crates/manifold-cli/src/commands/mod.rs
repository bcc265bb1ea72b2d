//! Command implementations for rigctl

pub mod checkpoint;
pub mod config;
pub mod run;
pub mod schedule;

use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a rig file with the default rig and test profile
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check the rig file without running anything
    Validate,

    /// Print the rig file with defaults filled in
    Show,
}

#[derive(Subcommand, Debug)]
pub enum CheckpointCommands {
    /// Show the latest checkpoint
    Show {
        /// Show every recorded checkpoint
        #[arg(long)]
        all: bool,
    },
}

/// Operator-adjudicated resume point.
#[derive(Args, Debug, Default, Clone)]
pub struct ResumeArgs {
    /// Start from the latest recorded checkpoint; explicit values override it
    #[arg(long)]
    pub resume_from_checkpoint: bool,

    /// Completed pressure cycles
    #[arg(long, value_name = "COUNT")]
    pub resume_pressure: Option<u64>,

    /// Completed fluid cycles
    #[arg(long, value_name = "COUNT", requires = "resume_fluid_remaining_secs")]
    pub resume_fluid_count: Option<u64>,

    /// Seconds left in the current fluid half-cycle
    #[arg(long, value_name = "SECS", requires = "resume_fluid_count")]
    pub resume_fluid_remaining_secs: Option<f64>,

    /// Completed chamber cycles
    #[arg(long, value_name = "COUNT", requires = "resume_chamber_remaining_secs")]
    pub resume_chamber_count: Option<u64>,

    /// Seconds left in the current chamber half-cycle
    #[arg(long, value_name = "SECS", requires = "resume_chamber_count")]
    pub resume_chamber_remaining_secs: Option<f64>,
}

impl ResumeArgs {
    /// Returns true if any resume value was given.
    pub fn is_requested(&self) -> bool {
        self.resume_from_checkpoint
            || self.resume_pressure.is_some()
            || self.resume_fluid_count.is_some()
            || self.resume_chamber_count.is_some()
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub resume: ResumeArgs,

    /// Simulate a leak on the inlet sensor after this many seconds
    #[arg(long, value_name = "SECS")]
    pub leak_after_secs: Option<f64>,

    /// Seconds between status lines
    #[arg(long, value_name = "SECS", default_value_t = 5.0)]
    pub status_secs: f64,
}
