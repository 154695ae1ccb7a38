//! Nadle Engine - Scheduling, execution and caching
//!
//! This crate provides the core of the nadle task runner: the dependency
//! graph builder with its incremental ready frontier, the bounded worker
//! pool that drives execution, and the fingerprint-based cache.

pub mod cache;
pub mod options;
pub mod pool;
pub mod reporter;
pub mod scheduler;
pub mod worker;

pub use cache::{
    CacheDecision, CacheError, CacheKey, CacheMissReason, CacheStore, CacheValidator,
    FingerprintMap, RunMetadata, TaskMetadata,
};
pub use options::{ExecutionOptions, WorkerLimits};
pub use pool::{ExecutionPool, PoolError, ShutdownHandle, TaskAction};
pub use reporter::{
    CollectingListener, ExecutionEvent, ExecutionListener, ListenerRegistry, TracingListener,
};
pub use scheduler::{GraphError, ImplicitEdge, TaskScheduler};
pub use worker::{WorkerOutcome, WorkerSignal};
