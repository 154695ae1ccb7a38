//! Task reference resolution
//!
//! A dependency declaration is either a bare task name, resolved in a
//! fallback workspace, or a "workspace:name" reference.

use crate::error::ReferenceError;
use crate::registry::TaskRegistry;
use crate::task::TaskId;

/// Resolve a dependency reference to a concrete task identifier.
///
/// Bare names resolve in `fallback_workspace`. Unresolvable references are
/// fatal pre-execution errors carrying same-named tasks registered in other
/// workspaces as suggestions.
pub fn resolve_task_reference(
    registry: &TaskRegistry,
    reference: &str,
    fallback_workspace: &str,
) -> Result<TaskId, ReferenceError> {
    let candidate = match reference.split_once(':') {
        Some((workspace, name)) => TaskId::new(workspace, name),
        None => TaskId::new(fallback_workspace, reference),
    };

    if registry.contains(&candidate) {
        return Ok(candidate);
    }

    let mut suggestions: Vec<TaskId> = registry
        .get_by_name(&candidate.name)
        .into_iter()
        .map(|task| task.id.clone())
        .collect();
    suggestions.sort();

    Err(ReferenceError::TaskNotFound {
        reference: reference.to_string(),
        suggestions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskConfiguration;

    fn sample_registry() -> TaskRegistry {
        TaskRegistry::new()
            .with_task(TaskId::new("app", "build"), TaskConfiguration::default())
            .with_task(TaskId::new("lib", "build"), TaskConfiguration::default())
            .with_task(TaskId::new("app", "test"), TaskConfiguration::default())
    }

    #[test]
    fn test_bare_name_resolves_in_fallback_workspace() {
        let registry = sample_registry();
        let id = resolve_task_reference(&registry, "build", "app").unwrap();
        assert_eq!(id, TaskId::new("app", "build"));
    }

    #[test]
    fn test_qualified_reference_resolves_in_named_workspace() {
        let registry = sample_registry();
        let id = resolve_task_reference(&registry, "lib:build", "app").unwrap();
        assert_eq!(id, TaskId::new("lib", "build"));
    }

    #[test]
    fn test_unresolvable_reference_carries_suggestions() {
        let registry = sample_registry();
        let err = resolve_task_reference(&registry, "lib:test", "lib").unwrap_err();

        match err {
            ReferenceError::TaskNotFound {
                reference,
                suggestions,
            } => {
                assert_eq!(reference, "lib:test");
                assert_eq!(suggestions, vec![TaskId::new("app", "test")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_name_has_no_suggestions() {
        let registry = sample_registry();
        let err = resolve_task_reference(&registry, "deploy", "app").unwrap_err();

        match err {
            ReferenceError::TaskNotFound { suggestions, .. } => {
                assert!(suggestions.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
