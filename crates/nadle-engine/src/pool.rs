//! Bounded execution pool
//!
//! Pulls ready tasks from the scheduler, runs each on a worker holding a
//! semaphore permit, and feeds completions back into the frontier. A task
//! becomes eligible the instant its last dependency finishes; the pool
//! never waits on DAG "levels".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use nadle_core::{RegisteredTask, TaskId, TaskRegistry};

use crate::cache::{CacheError, CacheValidator};
use crate::options::WorkerLimits;
use crate::reporter::{ExecutionEvent, ListenerRegistry};
use crate::scheduler::TaskScheduler;
use crate::worker::{self, WorkerOutcome, WorkerSignal};

/// Task body supplied by the embedding layer. Called on a worker thread,
/// one task at a time per worker.
///
/// `env` is the process environment with the task's declared entries
/// overlaid; the action passes it to whatever it spawns. The runner never
/// writes task entries into the process environment, so concurrent workers
/// are isolated from each other.
pub trait TaskAction: Send + Sync + 'static {
    /// Run the task body
    fn execute(&self, task: &RegisteredTask, env: &HashMap<String, String>)
        -> anyhow::Result<()>;
}

impl<F> TaskAction for F
where
    F: Fn(&RegisteredTask, &HashMap<String, String>) -> anyhow::Result<()>
        + Send
        + Sync
        + 'static,
{
    fn execute(
        &self,
        task: &RegisteredTask,
        env: &HashMap<String, String>,
    ) -> anyhow::Result<()> {
        self(task, env)
    }
}

/// Execution pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// A task body returned an error; fatal to the whole run
    #[error("task '{id}' failed: {source}")]
    TaskFailed {
        id: TaskId,
        #[source]
        source: anyhow::Error,
    },

    /// Cache validation or persistence failed for a task
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A worker panicked while running a task
    #[error("worker for task '{id}' panicked")]
    WorkerPanicked { id: TaskId },
}

/// Requests pool teardown from outside `run()`
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    /// Tear the pool down; still-running tasks are reported canceled
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

type Completion = (TaskId, Result<WorkerOutcome, PoolError>);

/// Bounded pool of worker slots driving the scheduler's frontier
pub struct ExecutionPool {
    scheduler: TaskScheduler,
    registry: Arc<TaskRegistry>,
    validator: Arc<CacheValidator>,
    action: Arc<dyn TaskAction>,
    listeners: ListenerRegistry,
    limits: WorkerLimits,
    shutdown: Arc<Notify>,
}

impl ExecutionPool {
    /// Create a pool over an initialized scheduler
    pub fn new(
        scheduler: TaskScheduler,
        registry: Arc<TaskRegistry>,
        validator: Arc<CacheValidator>,
        action: Arc<dyn TaskAction>,
        listeners: ListenerRegistry,
        limits: WorkerLimits,
    ) -> Self {
        Self {
            scheduler,
            registry,
            validator,
            action,
            listeners,
            limits,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle for tearing the pool down from another task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: self.shutdown.clone(),
        }
    }

    /// Execute every scheduled task.
    ///
    /// Seeds the pool with the initial ready set; each completion asks the
    /// scheduler for newly unblocked tasks and dispatches them
    /// immediately. The first task failure stops all further dispatching
    /// and propagates after the remaining running tasks are reported
    /// canceled; already-completed outputs stay on disk.
    pub async fn run(&mut self) -> Result<(), PoolError> {
        let slots = self.limits.effective();
        let semaphore = Arc::new(Semaphore::new(slots));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();

        let scheduled = self.scheduler.task_ids();
        info!(tasks = scheduled.len(), workers = slots, "execution started");
        self.listeners
            .broadcast(&ExecutionEvent::TasksScheduled { ids: scheduled });

        let mut handles: HashMap<TaskId, JoinHandle<()>> = HashMap::new();
        let mut running: HashSet<TaskId> = HashSet::new();

        for id in self.scheduler.get_ready_tasks(None) {
            self.dispatch(id, &semaphore, &done_tx, &mut handles, &mut running);
        }

        while !running.is_empty() {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("pool shutdown requested");
                    self.cancel_running(&mut handles, &mut running);
                    return Ok(());
                }
                completion = done_rx.recv() => {
                    // Senders outlive the loop; running is non-empty
                    let Some((id, outcome)) = completion else { break };
                    running.remove(&id);
                    handles.remove(&id);

                    match outcome {
                        Ok(outcome) => {
                            if outcome == WorkerOutcome::Executed {
                                self.listeners
                                    .broadcast(&ExecutionEvent::TaskFinish { id: id.clone() });
                            }
                            for next in self.scheduler.get_ready_tasks(Some(&id)) {
                                self.dispatch(
                                    next,
                                    &semaphore,
                                    &done_tx,
                                    &mut handles,
                                    &mut running,
                                );
                            }
                        }
                        Err(err) => {
                            error!(task = %id, error = %err, "task failed; aborting run");
                            self.listeners
                                .broadcast(&ExecutionEvent::TaskFailed { id: id.clone() });
                            self.cancel_running(&mut handles, &mut running);
                            return Err(err);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Send a task to a worker slot
    fn dispatch(
        &self,
        id: TaskId,
        semaphore: &Arc<Semaphore>,
        done_tx: &UnboundedSender<Completion>,
        handles: &mut HashMap<TaskId, JoinHandle<()>>,
        running: &mut HashSet<TaskId>,
    ) {
        // The graph only holds registered tasks
        let Some(task) = self.registry.get(&id).cloned() else {
            debug!(task = %id, "ready task not in registry; skipping");
            return;
        };

        let validator = self.validator.clone();
        let action = self.action.clone();
        let listeners = self.listeners.clone();
        let semaphore = semaphore.clone();
        let done_tx = done_tx.clone();
        let task_id = id.clone();

        running.insert(id.clone());
        let handle = tokio::spawn(async move {
            let permit = semaphore.acquire_owned().await.unwrap();

            // Dedicated channel between this dispatch and its worker
            let (signal_tx, mut signal_rx) = mpsc::unbounded_channel::<WorkerSignal>();
            let body = {
                let task = task.clone();
                tokio::task::spawn_blocking(move || {
                    worker::run_task(&task, action.as_ref(), validator.as_ref(), &signal_tx)
                })
            };

            // The channel drains before the worker returns, keeping signal
            // events ordered ahead of the completion report.
            while let Some(signal) = signal_rx.recv().await {
                match signal {
                    WorkerSignal::Start { thread_id } => {
                        listeners.broadcast(&ExecutionEvent::TaskStart {
                            id: task_id.clone(),
                            thread_id,
                        });
                    }
                    WorkerSignal::UpToDate => {
                        listeners.broadcast(&ExecutionEvent::TaskUpToDate {
                            id: task_id.clone(),
                        });
                    }
                    WorkerSignal::FromCache => {
                        listeners.broadcast(&ExecutionEvent::TaskRestoredFromCache {
                            id: task_id.clone(),
                        });
                    }
                }
            }

            let result = match body.await {
                Ok(result) => result,
                Err(_) => Err(PoolError::WorkerPanicked {
                    id: task_id.clone(),
                }),
            };
            drop(permit);
            let _ = done_tx.send((task_id, result));
        });
        handles.insert(id, handle);
    }

    /// Abort in-flight workers and report their tasks as canceled rather
    /// than failed
    fn cancel_running(
        &self,
        handles: &mut HashMap<TaskId, JoinHandle<()>>,
        running: &mut HashSet<TaskId>,
    ) {
        for (_, handle) in handles.drain() {
            handle.abort();
        }
        let mut canceled: Vec<TaskId> = running.drain().collect();
        canceled.sort();
        for id in canceled {
            self.listeners
                .broadcast(&ExecutionEvent::TaskCanceled { id });
        }
    }
}
