//! Durable run checkpoints.
//!
//! A checkpoint is a flat record of the three cycle counts and the time
//! left in the current fluid and chamber half-cycles. Records are only ever
//! appended; an operator reads them back after a crash or fault and decides
//! what to resume from.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use manifold_atomic::CyclesSnapshot;
use manifold_errors::{RigError, RigResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Snapshot of run progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Completed pressure cycles.
    pub pressure_count: u64,
    /// Completed fluid cycles.
    pub fluid_count: u64,
    /// Seconds left in the current fluid half-cycle.
    pub fluid_remaining_secs: f64,
    /// Completed chamber cycles.
    pub chamber_count: u64,
    /// Seconds left in the current chamber half-cycle.
    pub chamber_remaining_secs: f64,
}

impl Checkpoint {
    /// Build a checkpoint stamped with the current time.
    #[must_use]
    pub fn capture(
        counters: &CyclesSnapshot,
        fluid_remaining: Duration,
        chamber_remaining: Duration,
    ) -> Self {
        Self {
            timestamp: unix_seconds(Utc::now()),
            pressure_count: counters.pressure.current,
            fluid_count: counters.fluid.current,
            fluid_remaining_secs: fluid_remaining.as_secs_f64(),
            chamber_count: counters.chamber.current,
            chamber_remaining_secs: chamber_remaining.as_secs_f64(),
        }
    }

    /// The timestamp as a UTC date, if representable.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() {
            return None;
        }
        DateTime::from_timestamp_micros((self.timestamp * 1e6).round() as i64)
    }
}

#[allow(clippy::cast_precision_loss)]
fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1e6
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.recorded_at() {
            Some(at) => write!(f, "[{}] ", at.format("%Y-%m-%d %H:%M:%S"))?,
            None => write!(f, "[{}] ", self.timestamp)?,
        }
        write!(
            f,
            "pressure {} | fluid {} ({:.0}s left) | chamber {} ({:.0}s left)",
            self.pressure_count,
            self.fluid_count,
            self.fluid_remaining_secs,
            self.chamber_count,
            self.chamber_remaining_secs
        )
    }
}

/// Where checkpoints go.
pub trait CheckpointStore: Send + Sync {
    /// Durably record a checkpoint before returning.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Persistence`] if the record could not be written.
    fn save(&self, checkpoint: &Checkpoint) -> RigResult<()>;

    /// Most recently saved checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Persistence`] if the store cannot be read.
    fn latest(&self) -> RigResult<Option<Checkpoint>>;
}

/// Append-only JSON Lines file, one checkpoint per line.
#[derive(Debug)]
pub struct JsonLinesCheckpointStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesCheckpointStore {
    /// Store appending to `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// File path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence(&self, reason: impl fmt::Display) -> RigError {
        RigError::persistence(self.path.display().to_string(), reason.to_string())
    }

    /// Every checkpoint in the file, oldest first. A missing file is empty.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::Persistence`] for I/O failures and for lines that
    /// are not valid checkpoints.
    pub fn read_all(&self) -> RigResult<Vec<Checkpoint>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.persistence(e)),
        };

        let mut checkpoints = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.persistence(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let checkpoint = serde_json::from_str(&line)
                .map_err(|e| self.persistence(format!("line {}: {e}", index + 1)))?;
            checkpoints.push(checkpoint);
        }
        Ok(checkpoints)
    }
}

impl CheckpointStore for JsonLinesCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> RigResult<()> {
        let mut line = serde_json::to_string(checkpoint).map_err(|e| self.persistence(e))?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.persistence(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.persistence(e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| self.persistence(e))?;
        file.sync_data().map_err(|e| self.persistence(e))?;

        debug!(path = %self.path.display(), "Checkpoint appended");
        Ok(())
    }

    fn latest(&self) -> RigResult<Option<Checkpoint>> {
        Ok(self.read_all()?.pop())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    saved: Mutex<Vec<Checkpoint>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every saved checkpoint, oldest first.
    #[must_use]
    pub fn saved(&self) -> Vec<Checkpoint> {
        self.saved.lock().clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> RigResult<()> {
        self.saved.lock().push(checkpoint.clone());
        Ok(())
    }

    fn latest(&self) -> RigResult<Option<Checkpoint>> {
        Ok(self.saved.lock().last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pressure: u64) -> Checkpoint {
        Checkpoint {
            timestamp: 1_767_225_600.125,
            pressure_count: pressure,
            fluid_count: 5,
            fluid_remaining_secs: 3600.0,
            chamber_count: 4,
            chamber_remaining_secs: 0.1 + 0.2,
        }
    }

    #[test]
    fn test_json_lines_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = JsonLinesCheckpointStore::new(dir.path().join("run").join("checkpoints.jsonl"));
        assert!(store.latest()?.is_none());

        store.save(&sample(1))?;
        store.save(&sample(2))?;

        let all = store.read_all()?;
        assert_eq!(all, vec![sample(1), sample(2)]);
        assert_eq!(store.latest()?, Some(sample(2)));
        Ok(())
    }

    #[test]
    fn test_corrupt_line_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("checkpoints.jsonl");
        std::fs::write(&path, "{\"timestamp\": 1.0}\n")?;

        let store = JsonLinesCheckpointStore::new(&path);
        let err = store.read_all().err();
        assert!(matches!(
            err,
            Some(RigError::Persistence { ref reason, .. }) if reason.starts_with("line 1")
        ));
        Ok(())
    }

    #[test]
    fn test_memory_store() -> RigResult<()> {
        let store = MemoryCheckpointStore::new();
        store.save(&sample(7))?;
        assert_eq!(store.saved().len(), 1);
        assert_eq!(store.latest()?.map(|c| c.pressure_count), Some(7));
        Ok(())
    }

    #[test]
    fn test_recorded_at() {
        let checkpoint = sample(0);
        let at = checkpoint.recorded_at();
        assert_eq!(at.map(|t| t.timestamp()), Some(1_767_225_600));
        assert!(checkpoint.to_string().contains("fluid 5 (3600s left)"));
    }
}
