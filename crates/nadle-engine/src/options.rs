//! Execution options
//!
//! Plain data resolved by the CLI layer upstream and consumed by the
//! scheduler, the pool and the cache.

use std::path::PathBuf;

use nadle_core::TaskId;

/// Bounds on the number of worker slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerLimits {
    /// Minimum number of workers
    pub min: usize,
    /// Maximum number of workers
    pub max: usize,
}

impl WorkerLimits {
    /// Create explicit limits
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Effective number of worker slots: host parallelism clamped into
    /// `[min, max]`. Both bounds are user input; an inverted pair
    /// resolves toward `min` rather than panicking.
    pub fn effective(&self) -> usize {
        let min = self.min.max(1);
        let max = self.max.max(1).max(min);
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        available.clamp(min, max)
    }
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self {
            min: 1,
            max: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Options for a single engine invocation
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Run independent requested task trees concurrently. Off by default:
    /// requested tasks run one tree at a time.
    pub parallel: bool,
    /// Tasks removed from the graph entirely; their dependents treat them
    /// as already satisfied
    pub excluded: Vec<TaskId>,
    /// Materialize the execution plan without dispatching workers
    pub dry_run: bool,
    /// Whether the cache is consulted and updated
    pub cache_enabled: bool,
    /// Cache directory override; defaults to `.nadle` under the project root
    pub cache_dir: Option<PathBuf>,
    /// Infer cross-workspace edges from the workspace dependency graph
    pub implicit_dependencies: bool,
    /// Worker slot bounds
    pub workers: WorkerLimits,
    /// Project root all task paths are resolved against
    pub project_root: PathBuf,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            excluded: Vec::new(),
            dry_run: false,
            cache_enabled: true,
            cache_dir: None,
            implicit_dependencies: true,
            workers: WorkerLimits::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl ExecutionOptions {
    /// Directory the cache store lives in
    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.project_root.join(".nadle"))
    }
}
