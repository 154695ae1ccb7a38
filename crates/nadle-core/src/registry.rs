//! Task registry

use std::collections::HashMap;

use crate::task::{RegisteredTask, TaskConfiguration, TaskId};

/// Registry of all tasks known to the runner.
///
/// Populated by the configuration layer upstream; the engine only reads
/// from it.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    /// Tasks indexed by identifier
    tasks: HashMap<TaskId, RegisteredTask>,
    /// Task identifiers indexed by unqualified name
    by_name: HashMap<String, Vec<TaskId>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Replaces any previous registration with the same id.
    pub fn register(&mut self, id: TaskId, config: TaskConfiguration) {
        let ids = self.by_name.entry(id.name.clone()).or_default();
        if !ids.contains(&id) {
            ids.push(id.clone());
        }
        self.tasks
            .insert(id.clone(), RegisteredTask::new(id, config));
    }

    /// Builder-style registration
    pub fn with_task(mut self, id: TaskId, config: TaskConfiguration) -> Self {
        self.register(id, config);
        self
    }

    /// Look up a task by identifier
    pub fn get(&self, id: &TaskId) -> Option<&RegisteredTask> {
        self.tasks.get(id)
    }

    /// All tasks registered under the given unqualified name, across
    /// workspaces
    pub fn get_by_name(&self, name: &str) -> Vec<&RegisteredTask> {
        self.by_name
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| self.tasks.get(id)).collect())
            .unwrap_or_default()
    }

    /// Whether a task with the given id is registered
    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Iterate over all registered tasks
    pub fn tasks(&self) -> impl Iterator<Item = &RegisteredTask> {
        self.tasks.values()
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
