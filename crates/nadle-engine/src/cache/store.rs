//! Durable, per-task, per-cache-key run storage
//!
//! Layout, relative to the store root (`.nadle` by default):
//!
//! ```text
//! tasks/<taskName>/metadata.json                 { "latest": "<cacheKey>" }
//! tasks/<taskName>/runs/<cacheKey>/metadata.json run metadata
//! tasks/<taskName>/runs/<cacheKey>/outputs/**    mirrored output files
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CacheError, FingerprintMap};

/// Schema version written into every run metadata file
pub const METADATA_VERSION: u32 = 1;

/// Per-task pointer to the most recent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Cache key of the most recent run
    pub latest: String,
}

/// Metadata persisted once per (task, cache key)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Schema version, for store evolution
    pub version: u32,
    /// Workspace-qualified task name
    pub task_name: String,
    /// Cache key of this run
    pub cache_key: String,
    /// When the run was recorded (RFC 3339)
    pub timestamp: String,
    /// Input fingerprints the cache key was derived from
    pub inputs_fingerprints: FingerprintMap,
    /// Combined hash of the declared outputs after execution
    pub outputs_fingerprint: String,
}

/// Directory-backed cache store
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at the given directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn task_dir(&self, task: &str) -> PathBuf {
        self.root.join("tasks").join(task)
    }

    fn run_dir(&self, task: &str, key: &str) -> PathBuf {
        self.task_dir(task).join("runs").join(key)
    }

    fn outputs_dir(&self, task: &str, key: &str) -> PathBuf {
        self.run_dir(task, key).join("outputs")
    }

    /// Cache key of the task's most recent run, if any
    pub fn latest_key(&self, task: &str) -> Result<Option<String>, CacheError> {
        let path = self.task_dir(task).join("metadata.json");
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let metadata: TaskMetadata = serde_json::from_str(&contents)?;
        Ok(Some(metadata.latest))
    }

    /// Point the task's "latest" pointer at the given key
    pub fn set_latest(&self, task: &str, key: &str) -> Result<(), CacheError> {
        let dir = self.task_dir(task);
        fs::create_dir_all(&dir)?;
        let metadata = TaskMetadata {
            latest: key.to_string(),
        };
        fs::write(
            dir.join("metadata.json"),
            serde_json::to_string_pretty(&metadata)?,
        )?;
        Ok(())
    }

    /// Whether a run is recorded for the given (task, key)
    pub fn has_run(&self, task: &str, key: &str) -> bool {
        self.run_dir(task, key).join("metadata.json").exists()
    }

    /// Read run metadata for (task, key)
    pub fn read_run_metadata(
        &self,
        task: &str,
        key: &str,
    ) -> Result<Option<RunMetadata>, CacheError> {
        let path = self.run_dir(task, key).join("metadata.json");
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Persist run metadata
    pub fn write_run_metadata(&self, metadata: &RunMetadata) -> Result<(), CacheError> {
        let dir = self.run_dir(&metadata.task_name, &metadata.cache_key);
        fs::create_dir_all(&dir)?;
        fs::write(
            dir.join("metadata.json"),
            serde_json::to_string_pretty(metadata)?,
        )?;
        debug!(task = %metadata.task_name, key = %metadata.cache_key, "run metadata written");
        Ok(())
    }

    /// Mirror the given output files from the working directory into the
    /// run's outputs directory
    pub fn store_outputs(
        &self,
        task: &str,
        key: &str,
        working_dir: &Path,
        outputs: &FingerprintMap,
    ) -> Result<(), CacheError> {
        let outputs_dir = self.outputs_dir(task, key);
        for relative in outputs.keys() {
            let source = working_dir.join(relative);
            let target = outputs_dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &target)?;
        }
        debug!(task, key, files = outputs.len(), "outputs stored");
        Ok(())
    }

    /// Copy the run's mirrored outputs back into the working directory.
    ///
    /// Returns the number of restored files. Fails if the run has no
    /// outputs directory; callers treat that as a corrupted entry and
    /// fall back to execution.
    pub fn restore_outputs(
        &self,
        task: &str,
        key: &str,
        working_dir: &Path,
    ) -> Result<usize, CacheError> {
        let outputs_dir = self.outputs_dir(task, key);
        if !outputs_dir.exists() {
            return Err(CacheError::MissingOutputs {
                task: task.to_string(),
                key: key.to_string(),
            });
        }

        let mut restored = 0;
        for entry in walkdir::WalkDir::new(&outputs_dir) {
            let entry = entry.map_err(|e| {
                CacheError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walk failed")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&outputs_dir)
                .unwrap_or(entry.path());
            let target = working_dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            restored += 1;
        }

        debug!(task, key, files = restored, "outputs restored");
        Ok(restored)
    }

    /// Remove runs older than `max_age`. The run the "latest" pointer
    /// refers to is always kept.
    pub fn prune(&self, max_age: Duration) -> Result<PruneStats, CacheError> {
        let mut stats = PruneStats::default();
        let tasks_dir = self.root.join("tasks");
        if !tasks_dir.exists() {
            return Ok(stats);
        }

        let cutoff = chrono::Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::zero());

        for task_entry in fs::read_dir(&tasks_dir)? {
            let task_dir = task_entry?.path();
            if !task_dir.is_dir() {
                continue;
            }
            let task_name = task_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let latest = self.latest_key(&task_name)?;

            let runs_dir = task_dir.join("runs");
            if !runs_dir.exists() {
                continue;
            }
            for run_entry in fs::read_dir(&runs_dir)? {
                let run_dir = run_entry?.path();
                if !run_dir.is_dir() {
                    continue;
                }
                stats.total += 1;

                let key = run_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if latest.as_deref() == Some(key.as_str()) {
                    stats.kept += 1;
                    continue;
                }

                let expired = self
                    .read_run_metadata(&task_name, &key)?
                    .and_then(|meta| {
                        chrono::DateTime::parse_from_rfc3339(&meta.timestamp).ok()
                    })
                    .map(|created| created < cutoff)
                    .unwrap_or(true);

                if expired && fs::remove_dir_all(&run_dir).is_ok() {
                    stats.removed += 1;
                } else {
                    stats.kept += 1;
                }
            }
        }

        info!(
            total = stats.total,
            removed = stats.removed,
            kept = stats.kept,
            "cache prune complete"
        );
        Ok(stats)
    }

    /// Entry count and total size of the store
    pub fn status(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();
        let tasks_dir = self.root.join("tasks");
        if !tasks_dir.exists() {
            return Ok(stats);
        }

        for entry in walkdir::WalkDir::new(&tasks_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_dir() {
                if entry.path().parent().and_then(|p| p.file_name())
                    == Some(std::ffi::OsStr::new("runs"))
                {
                    stats.entries += 1;
                }
            } else if let Ok(meta) = entry.metadata() {
                stats.total_size += meta.len();
            }
        }

        Ok(stats)
    }
}

/// Statistics from a prune operation
#[derive(Debug, Default)]
pub struct PruneStats {
    /// Total runs found
    pub total: usize,
    /// Runs removed
    pub removed: usize,
    /// Runs kept
    pub kept: usize,
}

/// Cache store statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of recorded runs
    pub entries: usize,
    /// Total size in bytes
    pub total_size: u64,
}
