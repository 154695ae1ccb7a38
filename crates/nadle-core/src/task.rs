//! Task types and definitions

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier of the root workspace. Tasks owned by the root workspace
/// render without a workspace prefix.
pub const ROOT_WORKSPACE: &str = "root";

/// Workspace-qualified identifier of a task
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    /// Owning workspace
    pub workspace: String,
    /// Task name (e.g., "build", "test", "lint")
    pub name: String,
}

impl TaskId {
    /// Create a new task ID
    pub fn new(workspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            name: name.into(),
        }
    }

    /// Create a task ID in the root workspace
    pub fn root(name: impl Into<String>) -> Self {
        Self::new(ROOT_WORKSPACE, name)
    }

    /// Parse a task ID from "workspace:name" format.
    ///
    /// A bare name (no colon) belongs to the root workspace.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((workspace, name)) => Self::new(workspace, name),
            None => Self::root(s),
        }
    }

    /// Whether this task is owned by the root workspace
    pub fn is_root(&self) -> bool {
        self.workspace == ROOT_WORKSPACE
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.workspace, self.name)
        }
    }
}

/// Resolved configuration of a task.
///
/// Produced by the configuration layer upstream; read-only to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfiguration {
    /// References to tasks that must complete first.
    ///
    /// Each entry is either a bare task name (resolved in the owning
    /// workspace) or a "workspace:name" reference.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Input glob patterns, relative to the working directory (for cache
    /// key computation)
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Output glob patterns, relative to the working directory (for
    /// caching and restoration)
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Environment variables overlaid while the task body runs
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory the task runs in, relative to the project root
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl TaskConfiguration {
    /// Whether the task declares anything cacheable
    pub fn is_cacheable(&self) -> bool {
        !self.inputs.is_empty() || !self.outputs.is_empty()
    }
}

/// A task registered with the runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredTask {
    /// Task identifier
    pub id: TaskId,
    /// Task configuration
    config: TaskConfiguration,
}

impl RegisteredTask {
    /// Create a registered task from its id and configuration
    pub fn new(id: TaskId, config: TaskConfiguration) -> Self {
        Self { id, config }
    }

    /// Task name without workspace qualification
    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Owning workspace
    pub fn workspace(&self) -> &str {
        &self.id.workspace
    }

    /// Resolved configuration
    pub fn config(&self) -> &TaskConfiguration {
        &self.config
    }
}
