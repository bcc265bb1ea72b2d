//! Checkpoint inspection

use std::path::Path;

use anyhow::Result;
use manifold_rig::{CheckpointStore, JsonLinesCheckpointStore};
use serde_json::json;

use crate::commands::CheckpointCommands;
use crate::commands::config::load_existing;
use crate::error::CliError;
use crate::output;

pub fn execute(cmd: &CheckpointCommands, path: &Path, json: bool) -> Result<()> {
    let file = load_existing(path)?;
    let store = JsonLinesCheckpointStore::new(&file.checkpoint_path);

    match cmd {
        CheckpointCommands::Show { all: true } => {
            let checkpoints = store.read_all().map_err(CliError::from)?;
            if json {
                output::print_json(&json!({ "success": true, "checkpoints": checkpoints }));
            } else if checkpoints.is_empty() {
                println!("No checkpoints in {}", store.path().display());
            } else {
                checkpoints.iter().for_each(output::print_checkpoint);
            }
        }
        CheckpointCommands::Show { all: false } => {
            let latest = store
                .latest()
                .map_err(CliError::from)?
                .ok_or_else(|| CliError::NoCheckpoint(store.path().to_path_buf()))?;
            if json {
                output::print_json(&json!({ "success": true, "checkpoint": latest }));
            } else {
                output::print_checkpoint(&latest);
            }
        }
    }
    Ok(())
}
