//! Output formatting for rigctl

use std::time::Duration;

use anyhow::Error;
use colored::Colorize;
use manifold_rig::{Checkpoint, RigNotification, RigState, RigStatus, TemperatureSchedule};
use serde::Serialize;
use serde_json::json;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": { "message": format!("{error:#}") }
    });
    print_json(&error_json);
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format output as JSON: {e}"),
    }
}

pub fn print_schedule(name: &str, schedule: Option<&TemperatureSchedule>) {
    match schedule {
        Some(schedule) => {
            println!("{} ({} steps)", name.bold(), schedule.len());
            println!("{:>10}  {:>8}", "start", "setpoint");
            println!("{schedule}");
        }
        None => println!("{} {}", name.bold(), "disabled".dimmed()),
    }
}

pub fn print_checkpoint(checkpoint: &Checkpoint) {
    println!("{checkpoint}");
}

fn state_label(state: RigState) -> colored::ColoredString {
    match state {
        RigState::Running => state.as_str().green(),
        RigState::Paused | RigState::ProfileGenerated => state.as_str().yellow(),
        RigState::Faulted => state.as_str().red().bold(),
        RigState::Completed => state.as_str().green().bold(),
        RigState::Idle => state.as_str().normal(),
    }
}

fn remaining(value: Option<Duration>) -> String {
    value.map_or_else(|| "-".to_string(), |d| format!("{:.1}s", d.as_secs_f64()))
}

pub fn print_status(status: &RigStatus) {
    let readings = status
        .latest_readings
        .iter()
        .map(|(name, value)| format!("{name}={value:.1}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "[{}] {} | {} | fluid {} left | chamber {} left | {}",
        chrono::Local::now().format("%H:%M:%S"),
        state_label(status.state),
        status.counters,
        remaining(status.fluid_remaining),
        remaining(status.chamber_remaining),
        readings.dimmed(),
    );
}

pub fn print_notification(notification: &RigNotification) {
    match notification {
        RigNotification::StateChanged { from, to } => {
            println!("{} {} -> {}", "state".bold(), from, state_label(*to));
        }
        RigNotification::Faulted {
            condition,
            checkpoint,
            persisted,
        } => {
            println!("{} {}", "FAULT".red().bold(), condition);
            if *persisted {
                println!("  checkpoint {checkpoint}");
            } else {
                println!("  {} {checkpoint}", "checkpoint NOT saved:".red());
            }
        }
        RigNotification::Completed { counters } => {
            println!("{} {}", "complete".green().bold(), counters);
        }
        RigNotification::CheckpointSaved(checkpoint) => {
            println!("{} {}", "saved".dimmed(), checkpoint);
        }
    }
}
