//! Worker-side task execution
//!
//! Each dispatched task runs through [`run_task`] on a worker thread. The
//! worker emits ordered signals over its dedicated channel: `Start` first,
//! then at most one of `UpToDate`/`FromCache`; silence after `Start` means
//! the task body was fully executed. The task's effective environment is
//! computed per dispatch and handed to the action; the runner never
//! mutates the process environment.

use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use nadle_core::RegisteredTask;

use crate::cache::{CacheDecision, CacheValidator};
use crate::pool::{PoolError, TaskAction};

/// Ordered lifecycle signals sent from a worker to the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerSignal {
    /// The worker picked up the task
    Start { thread_id: String },
    /// The task was skipped; its cache entry is current
    UpToDate,
    /// The task's outputs were restored from the cache store
    FromCache,
}

/// How a worker finished a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The task body was executed
    Executed,
    /// Execution was skipped entirely
    UpToDate,
    /// Outputs were copied back from the store
    FromCache,
}

/// Run one task on the current (worker) thread.
pub(crate) fn run_task(
    task: &RegisteredTask,
    action: &dyn TaskAction,
    validator: &CacheValidator,
    signals: &UnboundedSender<WorkerSignal>,
) -> Result<WorkerOutcome, PoolError> {
    let _ = signals.send(WorkerSignal::Start {
        thread_id: format!("{:?}", std::thread::current().id()),
    });

    match validator.validate(task)? {
        CacheDecision::NotCacheable | CacheDecision::CacheDisabled => {
            execute_body(task, action)?;
            Ok(WorkerOutcome::Executed)
        }
        CacheDecision::UpToDate => {
            let _ = signals.send(WorkerSignal::UpToDate);
            Ok(WorkerOutcome::UpToDate)
        }
        CacheDecision::CacheMiss { context, reasons } => {
            for reason in &reasons {
                debug!(task = %task.id, %reason, "cache miss");
            }
            execute_body(task, action)?;
            validator.update(CacheDecision::CacheMiss { context, reasons })?;
            Ok(WorkerOutcome::Executed)
        }
        CacheDecision::RestoreFromCache(context) => match validator.restore(&context) {
            Ok(files) => {
                debug!(task = %task.id, files, "restored from cache");
                validator.update(CacheDecision::RestoreFromCache(context))?;
                let _ = signals.send(WorkerSignal::FromCache);
                Ok(WorkerOutcome::FromCache)
            }
            Err(err) => {
                warn!(task = %task.id, error = %err, "cache restore failed; executing instead");
                execute_body(task, action)?;
                validator.update(CacheDecision::CacheMiss {
                    context,
                    reasons: Vec::new(),
                })?;
                Ok(WorkerOutcome::Executed)
            }
        },
    }
}

/// Run the task body with its effective environment
fn execute_body(task: &RegisteredTask, action: &dyn TaskAction) -> Result<(), PoolError> {
    let env = effective_env(task);
    action
        .execute(task, &env)
        .map_err(|source| PoolError::TaskFailed {
            id: task.id.clone(),
            source,
        })
}

/// The process environment with the task's declared entries overlaid.
///
/// Built fresh per dispatch and passed to the action; nothing is written
/// into the process environment, so entries declared by one task are never
/// observable from a task running on a concurrent worker.
fn effective_env(task: &RegisteredTask) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    for (key, value) in &task.config().env {
        env.insert(key.clone(), value.clone());
    }
    env
}
