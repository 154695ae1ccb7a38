//! Fingerprint-based task cache
//!
//! Tasks that declare inputs/outputs are cached per (task, cache key),
//! where the key is a deterministic hash of the task name and its input
//! file fingerprints. The store is a plain directory tree of versioned
//! JSON metadata plus mirrored output files, so it survives process
//! restarts and can be inspected by hand.

pub mod fingerprint;
pub mod store;
pub mod validator;

use std::fmt;

use sha2::{Digest, Sha256};

pub use fingerprint::{combined_hash, fingerprint_globs, hash_bytes, FingerprintMap};
pub use store::{CacheStats, CacheStore, PruneStats, RunMetadata, TaskMetadata, METADATA_VERSION};
pub use validator::{CacheContext, CacheDecision, CacheMissReason, CacheValidator};

/// Deterministic hash of a task's name and input fingerprints.
///
/// Two runs with identical task name and identical input content produce
/// the same key regardless of file enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute a cache key from the task name and its input fingerprints
    pub fn compute(task_name: &str, inputs: &FingerprintMap) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(task_name.as_bytes());
        hasher.update(b"\0");
        // BTreeMap iteration is sorted, making the key order-independent
        for (path, hash) in inputs {
            hasher.update(path.as_bytes());
            hasher.update(b"\0");
            hasher.update(hash.as_bytes());
            hasher.update(b"\0");
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// The key as a hex string, used as the run directory name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("cache serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input/output glob declaration
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// The task metadata points at a run that has no metadata on disk.
    /// The store is never expected to be in this state; raised as a bug
    /// signal rather than handled.
    #[error("missing run metadata for task '{task}' key '{key}'")]
    MissingRunMetadata { task: String, key: String },

    /// A run directory exists but its mirrored outputs are gone
    #[error("cached outputs missing for task '{task}' key '{key}'")]
    MissingOutputs { task: String, key: String },
}
