//! Nadle Core - Shared task model for the nadle task runner
//!
//! This crate provides the foundational types consumed by the execution
//! engine: task identifiers and configuration, the task registry, the
//! workspace dependency graph, and task reference resolution.

pub mod error;
pub mod reference;
pub mod registry;
pub mod task;
pub mod workspace;

pub use error::{NadleError, ReferenceError, Result};
pub use reference::resolve_task_reference;
pub use registry::TaskRegistry;
pub use task::{RegisteredTask, TaskConfiguration, TaskId, ROOT_WORKSPACE};
pub use workspace::{WorkspaceGraph, WorkspaceNode};
