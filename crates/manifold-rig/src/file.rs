//! On-disk rig definition.
//!
//! A [`RigFile`] bundles the rig timing, the test profile and the location
//! of the checkpoint log. Files ending in `.yaml` or `.yml` are YAML; every
//! other extension is JSON.

use std::fs;
use std::path::{Path, PathBuf};

use manifold_errors::{RigError, RigResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RigConfig;
use crate::profile::TestProfile;

/// Default checkpoint log, relative to the working directory.
pub const DEFAULT_CHECKPOINT_PATH: &str = "checkpoints.jsonl";

/// Serialization format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.yaml` / `.yml`.
    Yaml,
    /// Anything else.
    Json,
}

impl FileFormat {
    /// Format for `path`.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Everything needed to run a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigFile {
    /// Rig timing and fault settings.
    pub rig: RigConfig,
    /// The test to run.
    pub profile: TestProfile,
    /// Append-only checkpoint log.
    pub checkpoint_path: PathBuf,
}

impl Default for RigFile {
    fn default() -> Self {
        Self {
            rig: RigConfig::default(),
            profile: TestProfile::default(),
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
        }
    }
}

impl RigFile {
    /// Validate both the rig settings and the profile.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> RigResult<()> {
        self.rig.validate()?;
        self.profile.validate()
    }

    /// Load from `path`, writing the defaults there first if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Persistence`] if the file cannot be read, parsed
    /// or created.
    pub fn load_from_path(path: impl AsRef<Path>) -> RigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "Rig file not found, creating default");
            let file = Self::default();
            file.save_to_path(path)?;
            return Ok(file);
        }

        let content = fs::read_to_string(path)
            .map_err(|e| RigError::persistence(path.display().to_string(), e.to_string()))?;
        let file = Self::parse(&content, FileFormat::for_path(path))
            .map_err(|reason| RigError::persistence(path.display().to_string(), reason))?;

        debug!(path = %path.display(), "Loaded rig file");
        Ok(file)
    }

    /// Write to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Persistence`] if the file cannot be written.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> RigResult<()> {
        let path = path.as_ref();
        let persistence = |reason: String| RigError::persistence(path.display().to_string(), reason);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| persistence(e.to_string()))?;
        }
        let content = self.render(FileFormat::for_path(path)).map_err(persistence)?;
        fs::write(path, content).map_err(|e| persistence(e.to_string()))?;

        info!(path = %path.display(), "Saved rig file");
        Ok(())
    }

    /// Parse from text.
    ///
    /// # Errors
    ///
    /// Returns the parser message.
    pub fn parse(content: &str, format: FileFormat) -> Result<Self, String> {
        match format {
            FileFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            FileFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Render as text.
    ///
    /// # Errors
    ///
    /// Returns the serializer message.
    pub fn render(&self, format: FileFormat) -> Result<String, String> {
        match format {
            FileFormat::Yaml => serde_yaml::to_string(self).map_err(|e| e.to_string()),
            FileFormat::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
        }
    }
}
