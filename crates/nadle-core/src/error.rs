//! Error types for nadle

use thiserror::Error;

use crate::task::TaskId;

/// Result type alias using NadleError
pub type Result<T> = std::result::Result<T, NadleError>;

/// Main error type for nadle operations
#[derive(Debug, Error)]
pub enum NadleError {
    /// Task reference resolution errors
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal-consistency violation; indicates a bug, not user error
    #[error("internal consistency error: {0}")]
    Internal(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl NadleError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Create a new internal-consistency error with a message
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Task reference resolution errors
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// Referenced task does not exist
    #[error("task '{reference}' not found{}", format_suggestions(.suggestions))]
    TaskNotFound {
        /// The unresolvable reference as written
        reference: String,
        /// Same-named tasks registered in other workspaces
        suggestions: Vec<TaskId>,
    },

    /// Referenced workspace does not exist
    #[error("workspace '{0}' not found")]
    WorkspaceNotFound(String),
}

fn format_suggestions(suggestions: &[TaskId]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    let names: Vec<String> = suggestions.iter().map(|id| id.to_string()).collect();
    format!("; did you mean one of: {}?", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_error_with_suggestions() {
        let err = ReferenceError::TaskNotFound {
            reference: "biuld".to_string(),
            suggestions: vec![TaskId::new("app", "build"), TaskId::root("build")],
        };
        let message = err.to_string();
        assert!(message.contains("'biuld' not found"));
        assert!(message.contains("app:build"));
        assert!(message.contains("build"));
    }

    #[test]
    fn test_reference_error_without_suggestions() {
        let err = ReferenceError::TaskNotFound {
            reference: "deploy".to_string(),
            suggestions: vec![],
        };
        assert_eq!(err.to_string(), "task 'deploy' not found");
    }
}
