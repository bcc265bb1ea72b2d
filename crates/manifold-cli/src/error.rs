//! Error types for rigctl

use std::path::PathBuf;

use manifold_rig::RigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Refusing to overwrite {0}; pass --force to replace it")]
    FileExists(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No checkpoint recorded in {0}")]
    NoCheckpoint(PathBuf),

    #[error("Run ended in state {0}")]
    RunFaulted(String),

    #[error(transparent)]
    Rig(#[from] RigError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RunFaulted(_) => 3,
            Self::FileExists(_) | Self::InvalidArgument(_) => 4,
            Self::Rig(e) if e.is_configuration() => 4,
            Self::Rig(e) if e.is_connectivity() => 5,
            Self::NoCheckpoint(_) => 6,
            Self::Rig(_) => 1,
        }
    }
}

/// Exit code for any error reaching `main`.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(cli) = error.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    match error.downcast_ref::<RigError>() {
        Some(e) if e.is_configuration() => 4,
        Some(e) if e.is_connectivity() => 5,
        _ => 1,
    }
}
