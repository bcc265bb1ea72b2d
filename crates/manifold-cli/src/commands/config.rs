//! Rig file commands

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use manifold_rig::RigFile;
use manifold_rig::file::FileFormat;
use serde_json::json;

use crate::commands::ConfigCommands;
use crate::error::CliError;
use crate::output;

pub fn execute(cmd: &ConfigCommands, path: &Path, json: bool) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => init(path, *force, json),
        ConfigCommands::Validate => validate(path, json),
        ConfigCommands::Show => show(path, json),
    }
}

fn init(path: &Path, force: bool, json: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::FileExists(path.to_path_buf()).into());
    }
    RigFile::default()
        .save_to_path(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if json {
        output::print_json(&json!({ "success": true, "path": path }));
    } else {
        println!("{} {}", "Wrote".green(), path.display());
    }
    Ok(())
}

/// Read a rig file that must already exist.
pub fn load_existing(path: &Path) -> Result<RigFile> {
    if !path.exists() {
        anyhow::bail!(
            "Rig file {} not found; create one with `rigctl config init`",
            path.display()
        );
    }
    RigFile::load_from_path(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn validate(path: &Path, json: bool) -> Result<()> {
    let file = load_existing(path)?;
    file.validate().map_err(CliError::from)?;

    if json {
        output::print_json(&json!({ "success": true, "path": path }));
    } else {
        println!("{} {}", "Valid".green(), path.display());
    }
    Ok(())
}

fn show(path: &Path, json: bool) -> Result<()> {
    let file = load_existing(path)?;
    let format = if json {
        FileFormat::Json
    } else {
        FileFormat::for_path(path)
    };
    let text = file.render(format).map_err(anyhow::Error::msg)?;
    println!("{text}");
    Ok(())
}
