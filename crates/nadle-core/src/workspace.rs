//! Workspace dependency graph
//!
//! Derived from package-manager dependency declarations by the discovery
//! layer upstream; the engine consults it only for implicit-dependency
//! resolution.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{NadleError, Result};
use crate::task::ROOT_WORKSPACE;

/// A node in the workspace dependency graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceNode {
    /// Workspace identifier
    pub id: String,
    /// Workspaces this workspace depends on
    pub dependencies: Vec<String>,
    /// Workspaces that depend on this workspace
    pub dependents: Vec<String>,
}

/// Dependency graph over workspaces of the monorepo
#[derive(Debug, Clone, Default)]
pub struct WorkspaceGraph {
    /// Nodes indexed by workspace id
    nodes: HashMap<String, WorkspaceNode>,
}

impl WorkspaceGraph {
    /// Build a workspace graph from (workspace, dependencies) pairs.
    ///
    /// Fails if the declared dependencies are cyclic; the task engine
    /// relies on this graph being a DAG.
    pub fn build(workspaces: &[(String, Vec<String>)]) -> Result<Self> {
        let mut nodes: HashMap<String, WorkspaceNode> = HashMap::new();

        for (id, deps) in workspaces {
            nodes.insert(
                id.clone(),
                WorkspaceNode {
                    id: id.clone(),
                    dependencies: deps.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        // Build reverse dependency mapping (dependents)
        for (id, deps) in workspaces {
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(id.clone());
                }
            }
        }

        let graph = Self { nodes };
        graph.validate()?;
        Ok(graph)
    }

    /// Validate that the graph has no cycles, using Kahn's algorithm
    fn validate(&self) -> Result<()> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut seen = 0usize;

        for (id, node) in &self.nodes {
            let degree = node
                .dependencies
                .iter()
                .filter(|d| self.nodes.contains_key(*d))
                .count();
            in_degree.insert(id, degree);
            if degree == 0 {
                queue.push_back(id);
            }
        }

        while let Some(id) = queue.pop_front() {
            seen += 1;

            if let Some(node) = self.nodes.get(id) {
                for dependent in &node.dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if seen != self.nodes.len() {
            let cyclic: Vec<&str> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(id, _)| *id)
                .collect();
            return Err(NadleError::other(format!(
                "circular workspace dependencies detected among: {}",
                cyclic.join(", ")
            )));
        }

        Ok(())
    }

    /// Whether the given workspace is the root workspace
    pub fn is_root(&self, id: &str) -> bool {
        id == ROOT_WORKSPACE
    }

    /// Direct dependencies of a workspace
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.nodes
            .get(id)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Direct dependents of a workspace
    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the workspace is known to the graph
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterate over all workspace ids, the root workspace included only if
    /// it was declared
    pub fn workspaces(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// All workspaces except the root, in unspecified order
    pub fn sub_workspaces(&self) -> Vec<&str> {
        self.nodes
            .keys()
            .map(String::as_str)
            .filter(|id| !self.is_root(id))
            .collect()
    }

    /// Workspaces the given workspace transitively depends on
    pub fn transitive_dependencies_of(&self, id: &str) -> HashSet<String> {
        let mut deps = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(id);

        while let Some(current) = queue.pop_front() {
            for dep in self.dependencies_of(current) {
                if deps.insert(dep.clone()) {
                    queue.push_back(dep);
                }
            }
        }

        deps
    }
}
