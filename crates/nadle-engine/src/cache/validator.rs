//! Cache validation: decide, per task, whether to skip, restore, or execute

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, instrument};

use nadle_core::RegisteredTask;

use super::fingerprint::{combined_hash, fingerprint_globs, FingerprintMap};
use super::store::{CacheStore, RunMetadata, METADATA_VERSION};
use super::{CacheError, CacheKey};

/// Why a cache miss happened, for observability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMissReason {
    /// The task has never recorded a run
    NoPreviousCache,
    /// A file matched by `inputs` that the last run did not have
    InputAdded(String),
    /// A file the last run had that no longer matches `inputs`
    InputRemoved(String),
    /// A file whose content changed since the last run
    InputChanged(String),
}

impl fmt::Display for CacheMissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPreviousCache => write!(f, "no previous cache"),
            Self::InputAdded(path) => write!(f, "input added: {path}"),
            Self::InputRemoved(path) => write!(f, "input removed: {path}"),
            Self::InputChanged(path) => write!(f, "input changed: {path}"),
        }
    }
}

/// Everything `update` needs to persist a decision after execution
#[derive(Debug, Clone)]
pub struct CacheContext {
    pub(crate) task_name: String,
    pub(crate) key: CacheKey,
    pub(crate) inputs: FingerprintMap,
    pub(crate) output_patterns: Vec<String>,
    pub(crate) working_dir: PathBuf,
}

impl CacheContext {
    /// The cache key this decision was made against
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

/// Outcome of cache validation for one task
#[derive(Debug, Clone)]
pub enum CacheDecision {
    /// Task declares no inputs/outputs; always execute
    NotCacheable,
    /// Caching turned off globally; always execute
    CacheDisabled,
    /// Recorded run matches inputs and on-disk outputs; skip entirely
    UpToDate,
    /// A run for this key exists but on-disk outputs are missing/stale;
    /// copy stored outputs back instead of re-running
    RestoreFromCache(CacheContext),
    /// No stored run for this key; execute, then persist
    CacheMiss {
        context: CacheContext,
        reasons: Vec<CacheMissReason>,
    },
}

/// Decides, per task, whether to skip, restore, or execute
#[derive(Debug, Clone)]
pub struct CacheValidator {
    store: CacheStore,
    enabled: bool,
    project_root: PathBuf,
}

impl CacheValidator {
    /// Create a validator over the given store
    pub fn new(store: CacheStore, enabled: bool, project_root: PathBuf) -> Self {
        Self {
            store,
            enabled,
            project_root,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    fn working_dir(&self, task: &RegisteredTask) -> PathBuf {
        match &task.config().working_dir {
            Some(dir) => self.project_root.join(dir),
            None => self.project_root.clone(),
        }
    }

    /// Validate a task against the store
    #[instrument(skip_all, fields(task = %task.id))]
    pub fn validate(&self, task: &RegisteredTask) -> Result<CacheDecision, CacheError> {
        let config = task.config();
        if !config.is_cacheable() {
            return Ok(CacheDecision::NotCacheable);
        }
        if !self.enabled {
            return Ok(CacheDecision::CacheDisabled);
        }

        let task_name = task.id.to_string();
        let working_dir = self.working_dir(task);
        let inputs = fingerprint_globs(&working_dir, &config.inputs)?;
        let key = CacheKey::compute(&task_name, &inputs);

        let context = CacheContext {
            task_name: task_name.clone(),
            key: key.clone(),
            inputs: inputs.clone(),
            output_patterns: config.outputs.clone(),
            working_dir: working_dir.clone(),
        };

        if !self.store.has_run(&task_name, key.as_str()) {
            let reasons = self.miss_reasons(&task_name, &inputs)?;
            debug!(task = %task_name, key = %key, ?reasons, "cache miss");
            return Ok(CacheDecision::CacheMiss { context, reasons });
        }

        let run = self
            .store
            .read_run_metadata(&task_name, key.as_str())?
            .ok_or_else(|| CacheError::MissingRunMetadata {
                task: task_name.clone(),
                key: key.to_string(),
            })?;

        let current_outputs = fingerprint_globs(&working_dir, &config.outputs)?;
        let latest = self.store.latest_key(&task_name)?;
        if latest.as_deref() == Some(key.as_str())
            && combined_hash(&current_outputs) == run.outputs_fingerprint
        {
            debug!(task = %task_name, key = %key, "up to date");
            Ok(CacheDecision::UpToDate)
        } else {
            debug!(task = %task_name, key = %key, "restorable from cache");
            Ok(CacheDecision::RestoreFromCache(context))
        }
    }

    /// Diff the new input fingerprints against the task's last-known
    /// snapshot — the `latest` run, not the new key's
    fn miss_reasons(
        &self,
        task_name: &str,
        inputs: &FingerprintMap,
    ) -> Result<Vec<CacheMissReason>, CacheError> {
        let Some(latest) = self.store.latest_key(task_name)? else {
            return Ok(vec![CacheMissReason::NoPreviousCache]);
        };

        // A latest pointer without its run metadata means the store is
        // corrupted; surface it instead of guessing.
        let previous = self
            .store
            .read_run_metadata(task_name, &latest)?
            .ok_or_else(|| CacheError::MissingRunMetadata {
                task: task_name.to_string(),
                key: latest.clone(),
            })?;

        let mut reasons = Vec::new();
        for (path, hash) in inputs {
            match previous.inputs_fingerprints.get(path) {
                None => reasons.push(CacheMissReason::InputAdded(path.clone())),
                Some(old) if old != hash => {
                    reasons.push(CacheMissReason::InputChanged(path.clone()))
                }
                Some(_) => {}
            }
        }
        for path in previous.inputs_fingerprints.keys() {
            if !inputs.contains_key(path) {
                reasons.push(CacheMissReason::InputRemoved(path.clone()));
            }
        }
        Ok(reasons)
    }

    /// Copy the stored outputs for this decision back into the working
    /// directory
    pub fn restore(&self, context: &CacheContext) -> Result<usize, CacheError> {
        self.store
            .restore_outputs(&context.task_name, context.key.as_str(), &context.working_dir)
    }

    /// Persist a validation decision after execution.
    ///
    /// No-op for `NotCacheable`/`CacheDisabled`/`UpToDate`. Restores only
    /// move the "latest" pointer; misses record the run, mirror the
    /// declared outputs and then move the pointer.
    pub fn update(&self, decision: CacheDecision) -> Result<(), CacheError> {
        match decision {
            CacheDecision::NotCacheable
            | CacheDecision::CacheDisabled
            | CacheDecision::UpToDate => Ok(()),
            CacheDecision::RestoreFromCache(context) => self
                .store
                .set_latest(&context.task_name, context.key.as_str()),
            CacheDecision::CacheMiss { context, .. } => {
                let outputs = fingerprint_globs(&context.working_dir, &context.output_patterns)?;
                let metadata = RunMetadata {
                    version: METADATA_VERSION,
                    task_name: context.task_name.clone(),
                    cache_key: context.key.to_string(),
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    inputs_fingerprints: context.inputs.clone(),
                    outputs_fingerprint: combined_hash(&outputs),
                };
                self.store.write_run_metadata(&metadata)?;
                self.store.store_outputs(
                    &context.task_name,
                    context.key.as_str(),
                    &context.working_dir,
                    &outputs,
                )?;
                self.store
                    .set_latest(&context.task_name, context.key.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use nadle_core::{TaskConfiguration, TaskId};
    use tempfile::TempDir;

    fn cacheable_task() -> RegisteredTask {
        RegisteredTask::new(
            TaskId::root("build"),
            TaskConfiguration {
                inputs: vec!["a.txt".to_string()],
                outputs: vec!["out.txt".to_string()],
                ..Default::default()
            },
        )
    }

    fn validator(temp: &TempDir, enabled: bool) -> CacheValidator {
        CacheValidator::new(
            CacheStore::new(temp.path().join(".nadle")),
            enabled,
            temp.path().to_path_buf(),
        )
    }

    /// Simulate a full execution: validate, "run" the body, update
    fn run_once(validator: &CacheValidator, task: &RegisteredTask, output: &str) -> CacheDecision {
        let decision = validator.validate(task).unwrap();
        if let CacheDecision::CacheMiss { .. } = &decision {
            fs::write(validator.project_root.join("out.txt"), output).unwrap();
            validator.update(decision.clone()).unwrap();
        }
        decision
    }

    #[test]
    fn test_not_cacheable_without_declarations() {
        let temp = TempDir::new().unwrap();
        let task = RegisteredTask::new(TaskId::root("lint"), TaskConfiguration::default());

        let decision = validator(&temp, true).validate(&task).unwrap();
        assert!(matches!(decision, CacheDecision::NotCacheable));
    }

    #[test]
    fn test_cache_disabled() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "input").unwrap();

        let decision = validator(&temp, false).validate(&cacheable_task()).unwrap();
        assert!(matches!(decision, CacheDecision::CacheDisabled));
    }

    #[test]
    fn test_first_run_is_miss_with_no_previous_cache() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "input").unwrap();

        let decision = validator(&temp, true).validate(&cacheable_task()).unwrap();
        match decision {
            CacheDecision::CacheMiss { reasons, .. } => {
                assert_eq!(reasons, vec![CacheMissReason::NoPreviousCache]);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn test_unchanged_second_run_is_up_to_date() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "input").unwrap();
        let validator = validator(&temp, true);
        let task = cacheable_task();

        run_once(&validator, &task, "artifact");

        let decision = validator.validate(&task).unwrap();
        assert!(matches!(decision, CacheDecision::UpToDate));
    }

    #[test]
    fn test_modified_input_is_miss_with_changed_reason() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "input").unwrap();
        let validator = validator(&temp, true);
        let task = cacheable_task();

        run_once(&validator, &task, "artifact");
        fs::write(temp.path().join("a.txt"), "modified").unwrap();

        let decision = validator.validate(&task).unwrap();
        match decision {
            CacheDecision::CacheMiss { reasons, .. } => {
                assert_eq!(
                    reasons,
                    vec![CacheMissReason::InputChanged("a.txt".to_string())]
                );
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn test_added_and_removed_inputs_reported() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "input").unwrap();
        let validator = validator(&temp, true);

        let mut task = cacheable_task();
        run_once(&validator, &task, "artifact");

        // Widen the inputs declaration and add a file
        task = RegisteredTask::new(
            TaskId::root("build"),
            TaskConfiguration {
                inputs: vec!["*.txt".to_string()],
                outputs: vec!["out.txt".to_string()],
                ..Default::default()
            },
        );
        fs::write(temp.path().join("b.txt"), "new input").unwrap();

        let decision = validator.validate(&task).unwrap();
        match decision {
            CacheDecision::CacheMiss { reasons, .. } => {
                assert!(reasons.contains(&CacheMissReason::InputAdded("b.txt".to_string())));
                // out.txt also matches *.txt now
                assert!(reasons.contains(&CacheMissReason::InputAdded("out.txt".to_string())));
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn test_deleted_output_is_restore_from_cache() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "input").unwrap();
        let validator = validator(&temp, true);
        let task = cacheable_task();

        run_once(&validator, &task, "artifact");
        fs::remove_file(temp.path().join("out.txt")).unwrap();

        let decision = validator.validate(&task).unwrap();
        match decision {
            CacheDecision::RestoreFromCache(context) => {
                let restored = validator.restore(&context).unwrap();
                assert_eq!(restored, 1);
                assert_eq!(
                    fs::read_to_string(temp.path().join("out.txt")).unwrap(),
                    "artifact"
                );
                validator
                    .update(CacheDecision::RestoreFromCache(context))
                    .unwrap();
            }
            other => panic!("unexpected decision: {other:?}"),
        }

        // After restore the task is current again
        let decision = validator.validate(&task).unwrap();
        assert!(matches!(decision, CacheDecision::UpToDate));
    }

    #[test]
    fn test_missing_latest_run_metadata_is_internal_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "input").unwrap();
        let validator = validator(&temp, true);

        // A latest pointer with no run directory behind it
        validator.store().set_latest("build", "phantom").unwrap();

        let result = validator.validate(&cacheable_task());
        assert!(matches!(
            result,
            Err(CacheError::MissingRunMetadata { .. })
        ));
    }
}
