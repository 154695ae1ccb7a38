//! Dependency graph construction and the ready-task frontier

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use nadle_core::error::ReferenceError;
use nadle_core::{resolve_task_reference, TaskId, TaskRegistry, WorkspaceGraph};

use crate::options::ExecutionOptions;

/// A cross-workspace edge inferred from the workspace dependency graph.
///
/// Recorded purely for provenance (dry-run annotation); it does not change
/// graph semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitEdge {
    /// The dependency (runs first)
    pub from: TaskId,
    /// The dependent (runs after `from`)
    pub to: TaskId,
}

/// Errors during graph construction
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Cyclic dependency detected
    #[error("cyclic dependency detected: {}", format_cycle(.0))]
    Cycle(Vec<TaskId>),

    /// A task or workspace reference could not be resolved
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

fn format_cycle(cycle: &[TaskId]) -> String {
    cycle
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Scheduler over the task dependency graph.
///
/// Holds the four graph maps as instance fields; all of them are mutated
/// only inside [`TaskScheduler::init`] and
/// [`TaskScheduler::get_ready_tasks`], preserving the single-writer
/// invariant without a lock.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    registry: Arc<TaskRegistry>,
    workspaces: Arc<WorkspaceGraph>,

    parallel: bool,
    implicit_dependencies: bool,
    excluded: HashSet<TaskId>,

    /// Direct dependencies of each task
    dependency_graph: HashMap<TaskId, HashSet<TaskId>>,
    /// Reverse edges: tasks waiting on each task
    dependents_graph: HashMap<TaskId, HashSet<TaskId>>,
    /// Full ancestor closure, used for sequential-mode subtree membership
    transitive_dependency_graph: HashMap<TaskId, HashSet<TaskId>>,
    /// Count of not-yet-satisfied direct dependencies, mutated as tasks
    /// finish
    indegree: HashMap<TaskId, usize>,

    /// Inferred edges, for dry-run display
    implicit_edges: Vec<ImplicitEdge>,

    /// Requested tasks in request order; drives the sequential-mode main
    /// pointer
    requested: Vec<TaskId>,
    /// Index of the current main task in `requested` (sequential mode)
    main_index: usize,
    /// Tasks already surfaced through the frontier
    surfaced: HashSet<TaskId>,
    /// Tasks whose completion has been reported
    completed: HashSet<TaskId>,
}

impl TaskScheduler {
    /// Create a scheduler; call [`TaskScheduler::init`] before using the
    /// frontier.
    pub fn new(
        registry: Arc<TaskRegistry>,
        workspaces: Arc<WorkspaceGraph>,
        options: &ExecutionOptions,
    ) -> Self {
        Self {
            registry,
            workspaces,
            parallel: options.parallel,
            implicit_dependencies: options.implicit_dependencies,
            excluded: options.excluded.iter().cloned().collect(),
            dependency_graph: HashMap::new(),
            dependents_graph: HashMap::new(),
            transitive_dependency_graph: HashMap::new(),
            indegree: HashMap::new(),
            implicit_edges: Vec::new(),
            requested: Vec::new(),
            main_index: 0,
            surfaced: HashSet::new(),
            completed: HashSet::new(),
        }
    }

    /// Build the dependency graph for the requested tasks.
    ///
    /// Analyzes declared and implicit dependencies recursively, expands
    /// root-workspace tasks over same-named sub-workspace tasks, and runs
    /// a cycle check per requested task in request order. Fails fatally on
    /// the first unresolvable reference or cycle; nothing runs afterwards.
    #[instrument(skip_all, fields(requested = requested.len()))]
    pub fn init(&mut self, requested: &[TaskId]) -> Result<(), GraphError> {
        let mut analyzed = HashSet::new();

        for id in requested {
            if self.excluded.contains(id) {
                debug!(task = %id, "requested task excluded; skipping");
                continue;
            }
            if !self.registry.contains(id) {
                // Surface the same suggestions a dependency reference would
                return Err(resolve_task_reference(
                    &self.registry,
                    &id.to_string(),
                    &id.workspace,
                )
                .expect_err("task missing from registry")
                .into());
            }

            self.analyze(id, &mut analyzed)?;
            self.requested.push(id.clone());

            // Root aggregation: a directly requested root task fans in the
            // same-named task of every sub-workspace.
            if self.implicit_dependencies && id.is_root() {
                let children: Vec<TaskId> = self
                    .registry
                    .get_by_name(&id.name)
                    .into_iter()
                    .map(|task| task.id.clone())
                    .filter(|child| child != id && !self.excluded.contains(child))
                    .collect();
                for child in children {
                    self.analyze(&child, &mut analyzed)?;
                    self.add_edge(&child, id, true);
                }
            }
        }

        self.check_cycles()?;
        self.build_transitive_closure();

        info!(
            task_count = self.indegree.len(),
            implicit_edges = self.implicit_edges.len(),
            "task graph built"
        );
        Ok(())
    }

    /// Recursively analyze a task's declared and implicit dependencies
    fn analyze(&mut self, id: &TaskId, analyzed: &mut HashSet<TaskId>) -> Result<(), GraphError> {
        if !analyzed.insert(id.clone()) {
            return Ok(());
        }
        self.ensure_node(id);

        let config = self
            .registry
            .get(id)
            .map(|task| task.config().clone())
            .unwrap_or_default();

        for reference in &config.depends_on {
            let dep = resolve_task_reference(&self.registry, reference, &id.workspace)?;
            if self.excluded.contains(&dep) {
                debug!(task = %id, dep = %dep, "dependency excluded; treated as satisfied");
                continue;
            }
            self.analyze(&dep, analyzed)?;
            self.add_edge(&dep, id, false);
        }

        if self.implicit_dependencies {
            let workspace_deps: Vec<String> = self
                .workspaces
                .dependencies_of(&id.workspace)
                .to_vec();
            for workspace in workspace_deps {
                let dep = TaskId::new(workspace, id.name.clone());
                if !self.registry.contains(&dep) || self.excluded.contains(&dep) {
                    continue;
                }
                self.analyze(&dep, analyzed)?;
                self.add_edge(&dep, id, true);
            }
        }

        Ok(())
    }

    fn ensure_node(&mut self, id: &TaskId) {
        self.dependency_graph.entry(id.clone()).or_default();
        self.dependents_graph.entry(id.clone()).or_default();
        self.indegree.entry(id.clone()).or_insert(0);
    }

    /// Add the edge `from -> to` (`from` runs first). An implicit edge is
    /// only recorded when no explicit edge already covers the pair.
    fn add_edge(&mut self, from: &TaskId, to: &TaskId, implicit: bool) {
        self.ensure_node(from);
        self.ensure_node(to);

        let deps = self.dependency_graph.entry(to.clone()).or_default();
        if !deps.insert(from.clone()) {
            return;
        }
        self.dependents_graph
            .entry(from.clone())
            .or_default()
            .insert(to.clone());
        *self.indegree.entry(to.clone()).or_insert(0) += 1;

        if implicit {
            self.implicit_edges.push(ImplicitEdge {
                from: from.clone(),
                to: to.clone(),
            });
        }
    }

    /// DFS cycle check per requested task, in request order. Reports the
    /// full cycle path starting from the first revisited node.
    fn check_cycles(&self) -> Result<(), GraphError> {
        // true = visiting (on the current DFS path), false = fully explored
        let mut marks: HashMap<TaskId, bool> = HashMap::new();

        for root in &self.requested {
            if let Some(cycle) = self.dfs_cycle(root, &mut marks, &mut Vec::new()) {
                return Err(GraphError::Cycle(cycle));
            }
        }
        Ok(())
    }

    fn dfs_cycle(
        &self,
        id: &TaskId,
        marks: &mut HashMap<TaskId, bool>,
        path: &mut Vec<TaskId>,
    ) -> Option<Vec<TaskId>> {
        match marks.get(id) {
            Some(true) => {
                let start = path.iter().position(|p| p == id).unwrap_or(0);
                let mut cycle: Vec<TaskId> = path[start..].to_vec();
                cycle.push(id.clone());
                return Some(cycle);
            }
            Some(false) => return None,
            None => {}
        }

        marks.insert(id.clone(), true);
        path.push(id.clone());

        if let Some(deps) = self.dependency_graph.get(id) {
            let mut sorted: Vec<&TaskId> = deps.iter().collect();
            sorted.sort();
            for dep in sorted {
                if let Some(cycle) = self.dfs_cycle(dep, marks, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        marks.insert(id.clone(), false);
        None
    }

    /// Compute the full ancestor closure for every task. The graph is
    /// acyclic at this point.
    fn build_transitive_closure(&mut self) {
        fn collect(
            id: &TaskId,
            graph: &HashMap<TaskId, HashSet<TaskId>>,
            memo: &mut HashMap<TaskId, HashSet<TaskId>>,
        ) -> HashSet<TaskId> {
            if let Some(cached) = memo.get(id) {
                return cached.clone();
            }
            let mut all = HashSet::new();
            if let Some(deps) = graph.get(id) {
                for dep in deps {
                    all.insert(dep.clone());
                    all.extend(collect(dep, graph, memo));
                }
            }
            memo.insert(id.clone(), all.clone());
            all
        }

        let ids: Vec<TaskId> = self.dependency_graph.keys().cloned().collect();
        let mut memo = HashMap::new();
        for id in &ids {
            collect(id, &self.dependency_graph, &mut memo);
        }
        self.transitive_dependency_graph = memo;
    }

    /// Advance the ready frontier.
    ///
    /// Without `done`, returns the initial frontier: every zero-indegree
    /// task not yet surfaced, filtered in sequential mode to the current
    /// main task's dependency subtree.
    ///
    /// With `done`, decrements the indegree of every direct dependent of
    /// the finished task and returns those reaching zero. When the
    /// finished task is the current main task, the pointer advances to the
    /// next requested task and the frontier recomputes for its subtree.
    pub fn get_ready_tasks(&mut self, done: Option<&TaskId>) -> Vec<TaskId> {
        let Some(done) = done else {
            return self.scan_frontier();
        };

        self.completed.insert(done.clone());

        let dependents: Vec<TaskId> = self
            .dependents_graph
            .get(done)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        let mut newly_ready = Vec::new();
        for dependent in dependents {
            if let Some(degree) = self.indegree.get_mut(&dependent) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    newly_ready.push(dependent);
                }
            }
        }

        if self.parallel {
            newly_ready.retain(|id| self.surfaced.insert(id.clone()));
            return newly_ready;
        }

        if self.current_main() == Some(done) {
            self.advance_main();
            return self.scan_frontier();
        }

        newly_ready.retain(|id| self.in_main_subtree(id));
        newly_ready.retain(|id| self.surfaced.insert(id.clone()));
        newly_ready
    }

    /// Scan for all dispatchable zero-indegree tasks
    fn scan_frontier(&mut self) -> Vec<TaskId> {
        if !self.parallel && self.current_main().is_none() {
            return Vec::new();
        }

        let mut ready: Vec<TaskId> = self
            .indegree
            .iter()
            .filter(|(id, degree)| **degree == 0 && !self.surfaced.contains(*id))
            .map(|(id, _)| id.clone())
            .collect();

        if !self.parallel {
            ready.retain(|id| self.in_main_subtree(id));
        }
        ready.sort();

        for id in &ready {
            self.surfaced.insert(id.clone());
        }
        ready
    }

    fn current_main(&self) -> Option<&TaskId> {
        self.requested.get(self.main_index)
    }

    /// Move the main pointer past the finished (or already completed)
    /// requested tasks
    fn advance_main(&mut self) {
        self.main_index += 1;
        while let Some(main) = self.requested.get(self.main_index) {
            if self.completed.contains(main) {
                self.main_index += 1;
            } else {
                break;
            }
        }
    }

    /// Whether the task belongs to the current main task's dependency
    /// subtree (the main task included)
    fn in_main_subtree(&self, id: &TaskId) -> bool {
        let Some(main) = self.current_main() else {
            return false;
        };
        if id == main {
            return true;
        }
        self.transitive_dependency_graph
            .get(main)
            .map(|deps| deps.contains(id))
            .unwrap_or(false)
    }

    /// Materialize a full execution ordering without executing anything.
    ///
    /// Repeatedly advances a cloned frontier to completion; with `task`
    /// given, the ordering is restricted to that task's dependency
    /// subtree.
    pub fn get_execution_plan(&self, task: Option<&TaskId>) -> Vec<TaskId> {
        let mut sim = self.clone();
        let mut plan = Vec::new();
        let mut queue: std::collections::VecDeque<TaskId> =
            sim.get_ready_tasks(None).into();

        while let Some(id) = queue.pop_front() {
            plan.push(id.clone());
            queue.extend(sim.get_ready_tasks(Some(&id)));
        }

        if let Some(task) = task {
            let subtree = self
                .transitive_dependency_graph
                .get(task)
                .cloned()
                .unwrap_or_default();
            plan.retain(|id| id == task || subtree.contains(id));
        }
        plan
    }

    /// Human-readable execution plan with implicit edges annotated
    pub fn render_execution_plan(&self) -> String {
        let mut rendered = String::new();
        for id in self.get_execution_plan(None) {
            let mut deps: Vec<&TaskId> = self
                .dependency_graph
                .get(&id)
                .map(|set| set.iter().collect())
                .unwrap_or_default();
            deps.sort();

            if deps.is_empty() {
                rendered.push_str(&format!("{}\n", id));
            } else {
                let annotated: Vec<String> = deps
                    .iter()
                    .map(|dep| {
                        if self.is_implicit_edge(dep, &id) {
                            format!("{} (implicit)", dep)
                        } else {
                            dep.to_string()
                        }
                    })
                    .collect();
                rendered.push_str(&format!("{} (after: {})\n", id, annotated.join(", ")));
            }
        }
        rendered
    }

    fn is_implicit_edge(&self, from: &TaskId, to: &TaskId) -> bool {
        self.implicit_edges
            .iter()
            .any(|edge| &edge.from == from && &edge.to == to)
    }

    /// All tasks in the graph, in unspecified order
    pub fn task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.indegree.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Direct dependencies of a task
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<TaskId> {
        self.dependency_graph
            .get(id)
            .map(|set| {
                let mut deps: Vec<TaskId> = set.iter().cloned().collect();
                deps.sort();
                deps
            })
            .unwrap_or_default()
    }

    /// Inferred edges, for dry-run display
    pub fn implicit_edges(&self) -> &[ImplicitEdge] {
        &self.implicit_edges
    }

    /// Whether every task in the graph has reported completion
    pub fn is_drained(&self) -> bool {
        self.completed.len() == self.indegree.len()
    }

    /// Total number of tasks in the graph
    pub fn len(&self) -> usize {
        self.indegree.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.indegree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nadle_core::TaskConfiguration;

    fn config_with_deps(deps: &[&str]) -> TaskConfiguration {
        TaskConfiguration {
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    fn scheduler(
        registry: TaskRegistry,
        workspaces: WorkspaceGraph,
        options: ExecutionOptions,
    ) -> TaskScheduler {
        TaskScheduler::new(Arc::new(registry), Arc::new(workspaces), &options)
    }

    fn empty_workspaces() -> WorkspaceGraph {
        WorkspaceGraph::build(&[("root".to_string(), vec![])]).unwrap()
    }

    fn parallel_options() -> ExecutionOptions {
        ExecutionOptions {
            parallel: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_respects_dependencies() {
        let registry = TaskRegistry::new()
            .with_task(TaskId::root("compile"), TaskConfiguration::default())
            .with_task(TaskId::root("test"), config_with_deps(&["compile"]))
            .with_task(TaskId::root("package"), config_with_deps(&["test"]));

        let mut sched = scheduler(registry, empty_workspaces(), parallel_options());
        sched.init(&[TaskId::root("package")]).unwrap();

        let plan = sched.get_execution_plan(None);
        let pos = |name: &str| plan.iter().position(|id| id.name == name).unwrap();
        assert!(pos("compile") < pos("test"));
        assert!(pos("test") < pos("package"));
    }

    #[test]
    fn test_diamond_ordering() {
        // d -> {b, c} -> a: a first, d last, b/c unconstrained
        let registry = TaskRegistry::new()
            .with_task(TaskId::root("a"), TaskConfiguration::default())
            .with_task(TaskId::root("b"), config_with_deps(&["a"]))
            .with_task(TaskId::root("c"), config_with_deps(&["a"]))
            .with_task(TaskId::root("d"), config_with_deps(&["b", "c"]));

        let mut sched = scheduler(registry, empty_workspaces(), parallel_options());
        sched.init(&[TaskId::root("d")]).unwrap();

        let plan = sched.get_execution_plan(None);
        let pos = |name: &str| plan.iter().position(|id| id.name == name).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn test_cycle_is_fatal() {
        let registry = TaskRegistry::new()
            .with_task(TaskId::root("a"), config_with_deps(&["b"]))
            .with_task(TaskId::root("b"), config_with_deps(&["c"]))
            .with_task(TaskId::root("c"), config_with_deps(&["a"]));

        let mut sched = scheduler(registry, empty_workspaces(), parallel_options());
        let err = sched.init(&[TaskId::root("a")]).unwrap_err();

        match err {
            GraphError::Cycle(cycle) => {
                assert!(cycle.len() >= 3);
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_cycle_is_fatal() {
        let registry =
            TaskRegistry::new().with_task(TaskId::root("loop"), config_with_deps(&["loop"]));

        let mut sched = scheduler(registry, empty_workspaces(), parallel_options());
        let err = sched.init(&[TaskId::root("loop")]).unwrap_err();
        assert!(matches!(err, GraphError::Cycle(_)));
    }

    #[test]
    fn test_unresolvable_reference_is_fatal() {
        let registry =
            TaskRegistry::new().with_task(TaskId::root("build"), config_with_deps(&["compile"]));

        let mut sched = scheduler(registry, empty_workspaces(), parallel_options());
        let err = sched.init(&[TaskId::root("build")]).unwrap_err();
        assert!(matches!(err, GraphError::Reference(_)));
    }

    #[test]
    fn test_parallel_independent_tasks_ready_together() {
        let registry = TaskRegistry::new()
            .with_task(TaskId::root("lint"), TaskConfiguration::default())
            .with_task(TaskId::root("docs"), TaskConfiguration::default());

        let mut sched = scheduler(registry, empty_workspaces(), parallel_options());
        sched
            .init(&[TaskId::root("lint"), TaskId::root("docs")])
            .unwrap();

        let ready = sched.get_ready_tasks(None);
        assert_eq!(ready.len(), 2);
    }

    #[test]
    fn test_sequential_withholds_second_tree() {
        // x -> x-dep, y -> y-dep; requesting [x, y] sequentially must not
        // surface y's subtree until x's subtree is fully complete.
        let registry = TaskRegistry::new()
            .with_task(TaskId::root("x-dep"), TaskConfiguration::default())
            .with_task(TaskId::root("x"), config_with_deps(&["x-dep"]))
            .with_task(TaskId::root("y-dep"), TaskConfiguration::default())
            .with_task(TaskId::root("y"), config_with_deps(&["y-dep"]));

        let mut sched = scheduler(
            registry,
            empty_workspaces(),
            ExecutionOptions::default(),
        );
        sched.init(&[TaskId::root("x"), TaskId::root("y")]).unwrap();

        let ready = sched.get_ready_tasks(None);
        assert_eq!(ready, vec![TaskId::root("x-dep")]);

        let ready = sched.get_ready_tasks(Some(&TaskId::root("x-dep")));
        assert_eq!(ready, vec![TaskId::root("x")]);

        // Completing the main task advances the pointer to y's subtree
        let ready = sched.get_ready_tasks(Some(&TaskId::root("x")));
        assert_eq!(ready, vec![TaskId::root("y-dep")]);

        let ready = sched.get_ready_tasks(Some(&TaskId::root("y-dep")));
        assert_eq!(ready, vec![TaskId::root("y")]);

        assert!(sched.get_ready_tasks(Some(&TaskId::root("y"))).is_empty());
        assert!(sched.is_drained());
    }

    #[test]
    fn test_sequential_skips_already_completed_main() {
        // y is part of x's subtree; after x completes, the pointer must
        // skip y instead of stalling on it.
        let registry = TaskRegistry::new()
            .with_task(TaskId::root("y"), TaskConfiguration::default())
            .with_task(TaskId::root("x"), config_with_deps(&["y"]));

        let mut sched = scheduler(
            registry,
            empty_workspaces(),
            ExecutionOptions::default(),
        );
        sched.init(&[TaskId::root("x"), TaskId::root("y")]).unwrap();

        assert_eq!(sched.get_ready_tasks(None), vec![TaskId::root("y")]);
        assert_eq!(
            sched.get_ready_tasks(Some(&TaskId::root("y"))),
            vec![TaskId::root("x")]
        );
        assert!(sched.get_ready_tasks(Some(&TaskId::root("x"))).is_empty());
        assert!(sched.is_drained());
    }

    #[test]
    fn test_implicit_cross_workspace_edge() {
        let registry = TaskRegistry::new()
            .with_task(TaskId::new("lib", "build"), TaskConfiguration::default())
            .with_task(TaskId::new("app", "build"), TaskConfiguration::default());
        let workspaces = WorkspaceGraph::build(&[
            ("root".to_string(), vec![]),
            ("lib".to_string(), vec![]),
            ("app".to_string(), vec!["lib".to_string()]),
        ])
        .unwrap();

        let mut sched = scheduler(registry, workspaces, parallel_options());
        sched.init(&[TaskId::new("app", "build")]).unwrap();

        let plan = sched.get_execution_plan(None);
        let pos = |ws: &str| plan.iter().position(|id| id.workspace == ws).unwrap();
        assert!(pos("lib") < pos("app"));

        assert_eq!(
            sched.implicit_edges(),
            &[ImplicitEdge {
                from: TaskId::new("lib", "build"),
                to: TaskId::new("app", "build"),
            }]
        );
    }

    #[test]
    fn test_explicit_edge_suppresses_implicit_record() {
        let registry = TaskRegistry::new()
            .with_task(TaskId::new("lib", "build"), TaskConfiguration::default())
            .with_task(
                TaskId::new("app", "build"),
                config_with_deps(&["lib:build"]),
            );
        let workspaces = WorkspaceGraph::build(&[
            ("root".to_string(), vec![]),
            ("lib".to_string(), vec![]),
            ("app".to_string(), vec!["lib".to_string()]),
        ])
        .unwrap();

        let mut sched = scheduler(registry, workspaces, parallel_options());
        sched.init(&[TaskId::new("app", "build")]).unwrap();

        assert!(sched.implicit_edges().is_empty());
        assert_eq!(sched.len(), 2);
    }

    #[test]
    fn test_root_aggregation() {
        let registry = TaskRegistry::new()
            .with_task(TaskId::root("build"), TaskConfiguration::default())
            .with_task(TaskId::new("lib", "build"), TaskConfiguration::default())
            .with_task(TaskId::new("app", "build"), TaskConfiguration::default());
        let workspaces = WorkspaceGraph::build(&[
            ("root".to_string(), vec![]),
            ("lib".to_string(), vec![]),
            ("app".to_string(), vec!["lib".to_string()]),
        ])
        .unwrap();

        let mut sched = scheduler(registry, workspaces, parallel_options());
        sched.init(&[TaskId::root("build")]).unwrap();

        let plan = sched.get_execution_plan(None);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.last(), Some(&TaskId::root("build")));
    }

    #[test]
    fn test_excluded_task_unblocks_dependents() {
        let registry = TaskRegistry::new()
            .with_task(TaskId::root("slow"), TaskConfiguration::default())
            .with_task(TaskId::root("fast"), TaskConfiguration::default())
            .with_task(
                TaskId::root("package"),
                config_with_deps(&["slow", "fast"]),
            );

        let options = ExecutionOptions {
            parallel: true,
            excluded: vec![TaskId::root("slow")],
            ..Default::default()
        };
        let mut sched = scheduler(registry, empty_workspaces(), options);
        sched.init(&[TaskId::root("package")]).unwrap();

        assert!(!sched.task_ids().contains(&TaskId::root("slow")));

        assert_eq!(sched.get_ready_tasks(None), vec![TaskId::root("fast")]);
        assert_eq!(
            sched.get_ready_tasks(Some(&TaskId::root("fast"))),
            vec![TaskId::root("package")]
        );
    }

    #[test]
    fn test_render_plan_annotates_implicit_edges() {
        let registry = TaskRegistry::new()
            .with_task(TaskId::new("lib", "build"), TaskConfiguration::default())
            .with_task(TaskId::new("app", "build"), TaskConfiguration::default());
        let workspaces = WorkspaceGraph::build(&[
            ("root".to_string(), vec![]),
            ("lib".to_string(), vec![]),
            ("app".to_string(), vec!["lib".to_string()]),
        ])
        .unwrap();

        let mut sched = scheduler(registry, workspaces, parallel_options());
        sched.init(&[TaskId::new("app", "build")]).unwrap();

        let rendered = sched.render_execution_plan();
        assert!(rendered.contains("app:build (after: lib:build (implicit))"));
    }

    #[test]
    fn test_plan_restricted_to_subtree() {
        let registry = TaskRegistry::new()
            .with_task(TaskId::root("a"), TaskConfiguration::default())
            .with_task(TaskId::root("b"), config_with_deps(&["a"]))
            .with_task(TaskId::root("c"), TaskConfiguration::default());

        let mut sched = scheduler(registry, empty_workspaces(), parallel_options());
        sched.init(&[TaskId::root("b"), TaskId::root("c")]).unwrap();

        let plan = sched.get_execution_plan(Some(&TaskId::root("b")));
        assert_eq!(plan, vec![TaskId::root("a"), TaskId::root("b")]);
    }
}
