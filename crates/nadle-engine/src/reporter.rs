//! Task lifecycle reporting

use std::sync::Arc;

use nadle_core::TaskId;

/// Events emitted during an engine invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// The scheduler accepted a set of tasks for this run
    TasksScheduled { ids: Vec<TaskId> },
    /// A task body is starting on a worker
    TaskStart { id: TaskId, thread_id: String },
    /// A task body finished successfully
    TaskFinish { id: TaskId },
    /// A task was skipped because its cache entry is current
    TaskUpToDate { id: TaskId },
    /// A task's outputs were copied back from the cache store
    TaskRestoredFromCache { id: TaskId },
    /// A task body failed
    TaskFailed { id: TaskId },
    /// A running task was terminated by pool teardown
    TaskCanceled { id: TaskId },
}

/// Subscriber for lifecycle events.
///
/// Every method has a no-op default; implementors override only the events
/// they care about.
pub trait ExecutionListener: Send + Sync {
    /// The scheduler accepted a set of tasks for this run
    fn on_tasks_scheduled(&self, _ids: &[TaskId]) {}
    /// A task body is starting on a worker
    fn on_task_start(&self, _id: &TaskId, _thread_id: &str) {}
    /// A task body finished successfully
    fn on_task_finish(&self, _id: &TaskId) {}
    /// A task was skipped because its cache entry is current
    fn on_task_up_to_date(&self, _id: &TaskId) {}
    /// A task's outputs were copied back from the cache store
    fn on_task_restored_from_cache(&self, _id: &TaskId) {}
    /// A task body failed
    fn on_task_failed(&self, _id: &TaskId) {}
    /// A running task was terminated by pool teardown
    fn on_task_canceled(&self, _id: &TaskId) {}
}

/// Registry of lifecycle listeners
#[derive(Clone)]
pub struct ListenerRegistry {
    listeners: Vec<Arc<dyn ExecutionListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: vec![Arc::new(TracingListener)],
        }
    }

    pub fn empty() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn register<L: ExecutionListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Arc::new(listener));
    }

    pub fn register_shared(&mut self, listener: Arc<dyn ExecutionListener>) {
        self.listeners.push(listener);
    }

    pub fn all(&self) -> &[Arc<dyn ExecutionListener>] {
        &self.listeners
    }

    /// Broadcast an event to all registered listeners
    pub fn broadcast(&self, event: &ExecutionEvent) {
        for listener in &self.listeners {
            match event {
                ExecutionEvent::TasksScheduled { ids } => listener.on_tasks_scheduled(ids),
                ExecutionEvent::TaskStart { id, thread_id } => {
                    listener.on_task_start(id, thread_id)
                }
                ExecutionEvent::TaskFinish { id } => listener.on_task_finish(id),
                ExecutionEvent::TaskUpToDate { id } => listener.on_task_up_to_date(id),
                ExecutionEvent::TaskRestoredFromCache { id } => {
                    listener.on_task_restored_from_cache(id)
                }
                ExecutionEvent::TaskFailed { id } => listener.on_task_failed(id),
                ExecutionEvent::TaskCanceled { id } => listener.on_task_canceled(id),
            }
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener that logs lifecycle events to tracing
#[derive(Debug, Default)]
pub struct TracingListener;

impl ExecutionListener for TracingListener {
    fn on_tasks_scheduled(&self, ids: &[TaskId]) {
        tracing::info!(count = ids.len(), "tasks scheduled");
    }

    fn on_task_start(&self, id: &TaskId, thread_id: &str) {
        tracing::info!(task = %id, thread = thread_id, "task started");
    }

    fn on_task_finish(&self, id: &TaskId) {
        tracing::info!(task = %id, "task finished");
    }

    fn on_task_up_to_date(&self, id: &TaskId) {
        tracing::info!(task = %id, "task up to date");
    }

    fn on_task_restored_from_cache(&self, id: &TaskId) {
        tracing::info!(task = %id, "task restored from cache");
    }

    fn on_task_failed(&self, id: &TaskId) {
        tracing::error!(task = %id, "task failed");
    }

    fn on_task_canceled(&self, id: &TaskId) {
        tracing::warn!(task = %id, "task canceled");
    }
}

/// Listener that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingListener {
    events: std::sync::Mutex<Vec<ExecutionEvent>>,
}

impl CollectingListener {
    /// Get all collected events
    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: ExecutionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ExecutionListener for CollectingListener {
    fn on_tasks_scheduled(&self, ids: &[TaskId]) {
        self.push(ExecutionEvent::TasksScheduled { ids: ids.to_vec() });
    }

    fn on_task_start(&self, id: &TaskId, thread_id: &str) {
        self.push(ExecutionEvent::TaskStart {
            id: id.clone(),
            thread_id: thread_id.to_string(),
        });
    }

    fn on_task_finish(&self, id: &TaskId) {
        self.push(ExecutionEvent::TaskFinish { id: id.clone() });
    }

    fn on_task_up_to_date(&self, id: &TaskId) {
        self.push(ExecutionEvent::TaskUpToDate { id: id.clone() });
    }

    fn on_task_restored_from_cache(&self, id: &TaskId) {
        self.push(ExecutionEvent::TaskRestoredFromCache { id: id.clone() });
    }

    fn on_task_failed(&self, id: &TaskId) {
        self.push(ExecutionEvent::TaskFailed { id: id.clone() });
    }

    fn on_task_canceled(&self, id: &TaskId) {
        self.push(ExecutionEvent::TaskCanceled { id: id.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_listener() {
        let listener = CollectingListener::default();
        let id = TaskId::new("app", "build");

        listener.on_task_start(&id, "worker-1");
        listener.on_task_finish(&id);

        let events = listener.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ExecutionEvent::TaskFinish {
                id: TaskId::new("app", "build")
            }
        );
    }

    #[test]
    fn test_broadcast_reaches_all_listeners() {
        let collecting = Arc::new(CollectingListener::default());
        let mut registry = ListenerRegistry::empty();
        registry.register_shared(collecting.clone());
        registry.register(TracingListener);

        registry.broadcast(&ExecutionEvent::TaskUpToDate {
            id: TaskId::root("build"),
        });

        assert_eq!(collecting.events().len(), 1);
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn test_default_methods_are_noop() {
        struct OnlyFailures {
            failures: std::sync::Mutex<usize>,
        }
        impl ExecutionListener for OnlyFailures {
            fn on_task_failed(&self, _id: &TaskId) {
                *self.failures.lock().unwrap() += 1;
            }
        }

        let listener = OnlyFailures {
            failures: std::sync::Mutex::new(0),
        };
        listener.on_task_start(&TaskId::root("build"), "worker-1");
        listener.on_task_failed(&TaskId::root("build"));
        assert_eq!(*listener.failures.lock().unwrap(), 1);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ListenerRegistry::empty();
        assert!(registry.all().is_empty());
        registry.broadcast(&ExecutionEvent::TaskFinish {
            id: TaskId::root("build"),
        });
    }
}
