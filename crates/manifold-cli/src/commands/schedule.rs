//! Schedule preview

use std::path::Path;

use anyhow::Result;
use manifold_rig::ProfileKind;
use serde_json::json;

use crate::commands::config::load_existing;
use crate::error::CliError;
use crate::output;

pub fn execute(path: &Path, json: bool) -> Result<()> {
    let file = load_existing(path)?;
    file.profile.validate().map_err(CliError::from)?;

    let fluid = file.profile.schedule(ProfileKind::Fluid).map_err(CliError::from)?;
    let chamber = file.profile.schedule(ProfileKind::Chamber).map_err(CliError::from)?;

    if json {
        output::print_json(&json!({
            "success": true,
            "fluid": fluid.as_ref().map(|s| json!({
                "steps": s.steps,
                "end": s.end,
                "target_cycles": file.profile.target(ProfileKind::Fluid).ok(),
            })),
            "chamber": chamber.as_ref().map(|s| json!({
                "steps": s.steps,
                "end": s.end,
                "target_cycles": file.profile.target(ProfileKind::Chamber).ok(),
            })),
            "pressure_cycles": file.profile.pressure.target_cycles,
        }));
    } else {
        output::print_schedule("fluid", fluid.as_ref());
        println!();
        output::print_schedule("chamber", chamber.as_ref());
        println!();
        println!("pressure: {} cycles", file.profile.pressure.target_cycles);
    }
    Ok(())
}
