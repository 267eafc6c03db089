//! Task dependency graph ("AoT graph").
//!
//! Nodes are tasks, edges point from a dependency to its dependent. The graph
//! computes longest-path levels, ready batches, pairwise parallel-safety
//! conflicts, and the cascade skip that follows a failure.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use murmur_core::types::{TaskId, TaskKind, TaskSpec, TaskStatus};

use crate::ast::AstService;
use crate::error::{Result, SwarmError};

/// The graph's view of one task.
#[derive(Debug, Clone)]
pub struct AotNode {
    /// Task this node schedules.
    pub task_id: TaskId,
    /// Kind of work; review kinds get the ready-batch relaxation.
    pub kind: TaskKind,
    /// Tasks whose completion gates this one.
    pub depends_on: Vec<TaskId>,
    /// Files this task may write.
    pub target_files: Vec<PathBuf>,
    /// Files this task may only read.
    pub read_files: Vec<PathBuf>,
    /// Named symbols the task is expected to touch.
    pub symbol_scope: Vec<String>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Longest-path distance from a root; computed by `compute_levels`.
    pub level: usize,
}

impl From<&TaskSpec> for AotNode {
    fn from(spec: &TaskSpec) -> Self {
        Self {
            task_id: spec.id,
            kind: spec.kind,
            depends_on: spec.depends_on.clone(),
            target_files: spec.target_files.clone(),
            read_files: spec.read_files.clone(),
            symbol_scope: spec.symbol_scope.clone(),
            status: spec.status,
            level: 0,
        }
    }
}

/// Why two ready tasks cannot run in the same parallel batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both tasks list the same target file.
    Direct,
    /// One task writes a file the other reads.
    ReadWrite,
    /// One task writes a file inside the other's dependency closure.
    AstDependency,
}

impl ConflictKind {
    /// Stable string form used in events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ReadWrite => "read_write",
            Self::AstDependency => "ast_dependency",
        }
    }
}

/// A pairwise scheduling conflict between two ready tasks.
#[derive(Debug, Clone)]
pub struct TaskConflict {
    /// First task of the pair.
    pub task_a: TaskId,
    /// Second task of the pair.
    pub task_b: TaskId,
    /// Conflict classification.
    pub kind: ConflictKind,
    /// The file that produced the overlap.
    pub path: PathBuf,
}

/// Per-status node counts, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    /// Nodes still waiting on dependencies.
    pub pending: usize,
    /// Nodes whose dependencies are satisfied.
    pub ready: usize,
    /// Nodes currently dispatched.
    pub running: usize,
    /// Nodes held open for external review.
    pub reviewing: usize,
    /// Nodes completed successfully.
    pub done: usize,
    /// Nodes that failed.
    pub failed: usize,
    /// Nodes skipped by cascade.
    pub skipped: usize,
    /// Total node count.
    pub total: usize,
}

/// In-memory DAG of task nodes.
pub struct AotGraph {
    graph: DiGraph<AotNode, ()>,
    index: HashMap<TaskId, NodeIndex>,
    insertion_order: Vec<TaskId>,
}

impl AotGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            insertion_order: Vec::new(),
        }
    }

    /// Build a graph from task specifications.
    #[must_use]
    pub fn from_tasks(tasks: &[TaskSpec]) -> Self {
        let mut graph = Self::new();
        for task in tasks {
            graph.add_task(AotNode::from(task));
        }
        graph
    }

    /// Insert a node. Dependency edges are wired to whatever nodes are
    /// present; cycles are only rejected later by `compute_levels`.
    pub fn add_task(&mut self, node: AotNode) {
        let task_id = node.task_id;
        let depends_on = node.depends_on.clone();
        let node_index = self.graph.add_node(node);
        self.index.insert(task_id, node_index);
        self.insertion_order.push(task_id);

        for dep_id in &depends_on {
            if let Some(&dep_index) = self.index.get(dep_id) {
                self.graph.add_edge(dep_index, node_index, ());
            }
        }

        // A dependency may be inserted after its dependents; wire those too.
        let dependents: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&other| {
                other != node_index && self.graph[other].depends_on.contains(&task_id)
            })
            .collect();
        for dependent in dependents {
            if !self.graph.contains_edge(node_index, dependent) {
                self.graph.add_edge(node_index, dependent, ());
            }
        }
    }

    /// Number of nodes.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Look up a node by task id.
    #[must_use]
    pub fn node(&self, task_id: TaskId) -> Option<&AotNode> {
        self.index.get(&task_id).map(|&idx| &self.graph[idx])
    }

    /// All dependency edges as `(from, to)` task-id pairs.
    #[must_use]
    pub fn edges(&self) -> Vec<(TaskId, TaskId)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(from, to)| (self.graph[from].task_id, self.graph[to].task_id))
            .collect()
    }

    /// Iterate nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &AotNode> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.index.get(id))
            .map(|&idx| &self.graph[idx])
    }

    /// Assign each node its longest-path level: 0 for roots, otherwise
    /// 1 + the maximum level among dependencies.
    ///
    /// # Errors
    /// Returns [`SwarmError::CyclicDependency`] if any dependency chain
    /// revisits itself. A cyclic graph is a fatal configuration error, never
    /// an infinite loop.
    pub fn compute_levels(&mut self) -> Result<()> {
        let order = algo::toposort(&self.graph, None)
            .map_err(|_cycle| SwarmError::CyclicDependency)?;

        for node_index in order {
            let level = self
                .graph
                .neighbors_directed(node_index, Direction::Incoming)
                .map(|dep| self.graph[dep].level + 1)
                .max()
                .unwrap_or(0);
            self.graph[node_index].level = level;
        }
        Ok(())
    }

    /// All non-terminal nodes whose dependencies are satisfied.
    ///
    /// A dependency is satisfied when it is `Done` — except for review-kind
    /// tasks (judge/critic/merge), which may start while a dependency is
    /// still `Reviewing`. Dependencies that reference unknown task ids are
    /// ignored, matching `add_task`'s edge wiring.
    #[must_use]
    pub fn get_ready_batch(&self) -> Vec<TaskId> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.index.get(id).map(|&idx| &self.graph[idx]))
            .filter(|node| {
                matches!(node.status, TaskStatus::Pending | TaskStatus::Ready)
                    && self.deps_satisfied(node)
            })
            .map(|node| node.task_id)
            .collect()
    }

    fn deps_satisfied(&self, node: &AotNode) -> bool {
        node.depends_on.iter().all(|dep_id| {
            let Some(&dep_index) = self.index.get(dep_id) else {
                return true;
            };
            let dep_status = self.graph[dep_index].status;
            match dep_status {
                TaskStatus::Done => true,
                TaskStatus::Reviewing => node.kind.is_review(),
                _ => false,
            }
        })
    }

    /// Report every pairwise conflict within a ready batch.
    ///
    /// A pair conflicts when their target files intersect (`Direct`), when one
    /// writes a file the other reads (`ReadWrite`), or when one writes inside
    /// the other's dependency closure per the AST service (`AstDependency`).
    /// Tasks with no target files conflict with nothing.
    pub async fn check_parallel_safety(
        &self,
        batch: &[TaskId],
        ast: &dyn AstService,
    ) -> Vec<TaskConflict> {
        let mut closures: HashMap<TaskId, HashSet<PathBuf>> = HashMap::new();
        for &task_id in batch {
            let Some(node) = self.node(task_id) else {
                continue;
            };
            let mut closure = HashSet::new();
            for file in node.target_files.iter().chain(node.read_files.iter()) {
                closure.extend(ast.get_dependencies(file).await);
            }
            closures.insert(task_id, closure);
        }

        let mut conflicts = Vec::new();
        for (position, &id_a) in batch.iter().enumerate() {
            let Some(node_a) = self.node(id_a) else {
                continue;
            };
            for &id_b in &batch[position + 1..] {
                let Some(node_b) = self.node(id_b) else {
                    continue;
                };
                if let Some(conflict) = Self::pair_conflict(node_a, node_b, &closures) {
                    conflicts.push(conflict);
                }
            }
        }
        conflicts
    }

    fn pair_conflict(
        node_a: &AotNode,
        node_b: &AotNode,
        closures: &HashMap<TaskId, HashSet<PathBuf>>,
    ) -> Option<TaskConflict> {
        // A task that writes nothing is conflict-free with everything.
        if node_a.target_files.is_empty() || node_b.target_files.is_empty() {
            return None;
        }

        let conflict = |kind: ConflictKind, path: &PathBuf| TaskConflict {
            task_a: node_a.task_id,
            task_b: node_b.task_id,
            kind,
            path: path.clone(),
        };

        for target in &node_a.target_files {
            if node_b.target_files.contains(target) {
                return Some(conflict(ConflictKind::Direct, target));
            }
        }
        for target in &node_a.target_files {
            if node_b.read_files.contains(target) {
                return Some(conflict(ConflictKind::ReadWrite, target));
            }
        }
        for target in &node_b.target_files {
            if node_a.read_files.contains(target) {
                return Some(conflict(ConflictKind::ReadWrite, target));
            }
        }

        let empty = HashSet::new();
        let closure_a = closures.get(&node_a.task_id).unwrap_or(&empty);
        let closure_b = closures.get(&node_b.task_id).unwrap_or(&empty);
        for target in &node_a.target_files {
            if closure_b.contains(target) {
                return Some(conflict(ConflictKind::AstDependency, target));
            }
        }
        for target in &node_b.target_files {
            if closure_a.contains(target) {
                return Some(conflict(ConflictKind::AstDependency, target));
            }
        }
        None
    }

    /// Split a ready batch into (parallel-safe, must-serialize) sets.
    ///
    /// Every task id that appears in *any* reported conflict is serialized —
    /// not just one side of each pair. Order within both sets follows the
    /// batch order, so serialized execution is deterministic.
    #[must_use]
    pub fn split_batch(
        batch: &[TaskId],
        conflicts: &[TaskConflict],
    ) -> (Vec<TaskId>, Vec<TaskId>) {
        let conflicting: HashSet<TaskId> = conflicts
            .iter()
            .flat_map(|conflict| [conflict.task_a, conflict.task_b])
            .collect();

        let mut parallel = Vec::new();
        let mut serialized = Vec::new();
        for &task_id in batch {
            if conflicting.contains(&task_id) {
                serialized.push(task_id);
            } else {
                parallel.push(task_id);
            }
        }
        (parallel, serialized)
    }

    /// Transition a node to `Running`.
    ///
    /// # Errors
    /// Returns an error for unknown ids or if the node is not dispatchable
    /// (each node runs exactly once).
    pub fn mark_running(&mut self, task_id: TaskId) -> Result<()> {
        let node = self.node_mut(task_id)?;
        if !matches!(node.status, TaskStatus::Pending | TaskStatus::Ready) {
            return Err(SwarmError::Other(format!(
                "task {task_id} cannot start from status {:?}",
                node.status
            )));
        }
        node.status = TaskStatus::Running;
        Ok(())
    }

    /// Transition a running node to `Reviewing`. The engine never calls this
    /// itself; the external review pipeline does.
    ///
    /// # Errors
    /// Returns an error for unknown ids or non-running nodes.
    pub fn mark_reviewing(&mut self, task_id: TaskId) -> Result<()> {
        let node = self.node_mut(task_id)?;
        if node.status != TaskStatus::Running {
            return Err(SwarmError::Other(format!(
                "task {task_id} cannot enter review from status {:?}",
                node.status
            )));
        }
        node.status = TaskStatus::Reviewing;
        Ok(())
    }

    /// Transition a node to `Done`.
    ///
    /// # Errors
    /// Returns an error for unknown ids or nodes that were never dispatched.
    pub fn mark_complete(&mut self, task_id: TaskId) -> Result<()> {
        let node = self.node_mut(task_id)?;
        if !matches!(node.status, TaskStatus::Running | TaskStatus::Reviewing) {
            return Err(SwarmError::Other(format!(
                "task {task_id} cannot complete from status {:?}",
                node.status
            )));
        }
        node.status = TaskStatus::Done;
        Ok(())
    }

    /// Transition a node to `Failed` and cascade-skip every transitive
    /// dependent. Returns the skipped task ids for reporting. A node that is
    /// already `Done` is never skipped.
    ///
    /// # Errors
    /// Returns an error for unknown task ids.
    pub fn mark_failed(&mut self, task_id: TaskId) -> Result<Vec<TaskId>> {
        let &failed_index = self
            .index
            .get(&task_id)
            .ok_or(SwarmError::UnknownTask(task_id))?;
        self.graph[failed_index].status = TaskStatus::Failed;

        let mut skipped = Vec::new();
        let mut stack = vec![failed_index];
        let mut visited = HashSet::from([failed_index]);
        while let Some(current) = stack.pop() {
            let dependents: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(current, Direction::Outgoing)
                .collect();
            for dependent in dependents {
                if !visited.insert(dependent) {
                    continue;
                }
                let node = &mut self.graph[dependent];
                if !node.status.is_terminal() {
                    node.status = TaskStatus::Skipped;
                    skipped.push(node.task_id);
                }
                stack.push(dependent);
            }
        }
        Ok(skipped)
    }

    /// The canonical scheduling sequence: task ids grouped by level, level
    /// order ascending, insertion order within a level. Call
    /// `compute_levels` first.
    #[must_use]
    pub fn get_execution_order(&self) -> Vec<Vec<TaskId>> {
        let mut by_level: HashMap<usize, Vec<TaskId>> = HashMap::new();
        let mut max_level = 0;
        for node in self.nodes() {
            by_level.entry(node.level).or_default().push(node.task_id);
            max_level = max_level.max(node.level);
        }
        if by_level.is_empty() {
            return Vec::new();
        }
        (0..=max_level)
            .map(|level| by_level.remove(&level).unwrap_or_default())
            .collect()
    }

    /// Count nodes per status.
    #[must_use]
    pub fn summary(&self) -> GraphSummary {
        let mut summary = GraphSummary {
            total: self.graph.node_count(),
            ..GraphSummary::default()
        };
        for node in self.graph.node_weights() {
            match node.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::Ready => summary.ready += 1,
                TaskStatus::Running => summary.running += 1,
                TaskStatus::Reviewing => summary.reviewing += 1,
                TaskStatus::Done => summary.done += 1,
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    fn node_mut(&mut self, task_id: TaskId) -> Result<&mut AotNode> {
        let &index = self
            .index
            .get(&task_id)
            .ok_or(SwarmError::UnknownTask(task_id))?;
        Ok(&mut self.graph[index])
    }
}

impl Default for AotGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NullAstService;
    use murmur_core::types::TaskSpec;

    fn chain(len: usize) -> (Vec<TaskSpec>, Vec<TaskId>) {
        let mut tasks: Vec<TaskSpec> = Vec::new();
        for position in 0..len {
            let mut task = TaskSpec::new(format!("task {position}"));
            if let Some(previous) = tasks.last() {
                task = task.with_depends_on(vec![previous.id]);
            }
            tasks.push(task);
        }
        let ids = tasks.iter().map(|task| task.id).collect();
        (tasks, ids)
    }

    #[test]
    fn ready_batch_respects_dependencies() {
        let (tasks, ids) = chain(3);
        let mut graph = AotGraph::from_tasks(&tasks);
        if let Err(error) = graph.compute_levels() {
            panic!("compute_levels failed: {error}");
        }

        assert_eq!(graph.get_ready_batch(), vec![ids[0]]);

        if let Err(error) = graph.mark_running(ids[0]) {
            panic!("mark_running failed: {error}");
        }
        assert!(graph.get_ready_batch().is_empty());

        if let Err(error) = graph.mark_complete(ids[0]) {
            panic!("mark_complete failed: {error}");
        }
        assert_eq!(graph.get_ready_batch(), vec![ids[1]]);
    }

    #[test]
    fn review_tasks_start_during_review() {
        let producer = TaskSpec::new("produce");
        let judge = TaskSpec::new("judge")
            .with_kind(TaskKind::Judge)
            .with_depends_on(vec![producer.id]);
        let consumer = TaskSpec::new("consume").with_depends_on(vec![producer.id]);

        let mut graph = AotGraph::from_tasks(&[producer.clone(), judge.clone(), consumer.clone()]);
        if let Err(error) = graph.compute_levels() {
            panic!("compute_levels failed: {error}");
        }
        if let Err(error) = graph.mark_running(producer.id) {
            panic!("mark_running failed: {error}");
        }
        if let Err(error) = graph.mark_reviewing(producer.id) {
            panic!("mark_reviewing failed: {error}");
        }

        // The judge may start while its dependency is merely reviewing; the
        // ordinary consumer must not.
        assert_eq!(graph.get_ready_batch(), vec![judge.id]);
    }

    #[test]
    fn levels_follow_longest_path() {
        let root_a = TaskSpec::new("root a");
        let root_b = TaskSpec::new("root b");
        let middle = TaskSpec::new("middle").with_depends_on(vec![root_a.id]);
        let sink = TaskSpec::new("sink").with_depends_on(vec![middle.id, root_b.id]);

        let mut graph =
            AotGraph::from_tasks(&[root_a.clone(), root_b.clone(), middle.clone(), sink.clone()]);
        if let Err(error) = graph.compute_levels() {
            panic!("compute_levels failed: {error}");
        }

        assert_eq!(graph.node(root_a.id).map(|node| node.level), Some(0));
        assert_eq!(graph.node(root_b.id).map(|node| node.level), Some(0));
        assert_eq!(graph.node(middle.id).map(|node| node.level), Some(1));
        assert_eq!(graph.node(sink.id).map(|node| node.level), Some(2));

        let order = graph.get_execution_order();
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], vec![root_a.id, root_b.id]);
        assert_eq!(order[2], vec![sink.id]);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut task_a = TaskSpec::new("a");
        let mut task_b = TaskSpec::new("b");
        task_a.depends_on = vec![task_b.id];
        task_b.depends_on = vec![task_a.id];

        let mut graph = AotGraph::from_tasks(&[task_a, task_b]);
        assert!(matches!(
            graph.compute_levels(),
            Err(SwarmError::CyclicDependency)
        ));
    }

    #[test]
    fn cascade_skip_covers_exactly_the_reachable_set() {
        let root = TaskSpec::new("root");
        let child = TaskSpec::new("child").with_depends_on(vec![root.id]);
        let grandchild = TaskSpec::new("grandchild").with_depends_on(vec![child.id]);
        let unrelated = TaskSpec::new("unrelated");

        let mut graph = AotGraph::from_tasks(&[
            root.clone(),
            child.clone(),
            grandchild.clone(),
            unrelated.clone(),
        ]);
        if let Err(error) = graph.compute_levels() {
            panic!("compute_levels failed: {error}");
        }
        if let Err(error) = graph.mark_running(root.id) {
            panic!("mark_running failed: {error}");
        }

        let skipped = match graph.mark_failed(root.id) {
            Ok(skipped) => skipped,
            Err(error) => panic!("mark_failed failed: {error}"),
        };
        assert_eq!(skipped, vec![child.id, grandchild.id]);
        assert_eq!(
            graph.node(unrelated.id).map(|node| node.status),
            Some(TaskStatus::Pending)
        );

        let summary = graph.summary();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.pending, 1);
    }

    #[test]
    fn done_nodes_survive_cascade() {
        let root = TaskSpec::new("root");
        let sibling = TaskSpec::new("sibling").with_depends_on(vec![root.id]);

        let mut graph = AotGraph::from_tasks(&[root.clone(), sibling.clone()]);
        if let Err(error) = graph.compute_levels() {
            panic!("compute_levels failed: {error}");
        }
        if let Err(error) = graph.mark_running(sibling.id) {
            panic!("mark_running failed: {error}");
        }
        if let Err(error) = graph.mark_complete(sibling.id) {
            panic!("mark_complete failed: {error}");
        }
        if let Err(error) = graph.mark_running(root.id) {
            panic!("mark_running failed: {error}");
        }

        let skipped = match graph.mark_failed(root.id) {
            Ok(skipped) => skipped,
            Err(error) => panic!("mark_failed failed: {error}"),
        };
        assert!(skipped.is_empty());
        assert_eq!(
            graph.node(sibling.id).map(|node| node.status),
            Some(TaskStatus::Done)
        );
    }

    #[tokio::test]
    async fn disjoint_tasks_have_no_conflicts() {
        let task_a =
            TaskSpec::new("a").with_target_files(vec![PathBuf::from("src/a.py")]);
        let task_b =
            TaskSpec::new("b").with_target_files(vec![PathBuf::from("src/b.py")]);

        let graph = AotGraph::from_tasks(&[task_a.clone(), task_b.clone()]);
        let batch = vec![task_a.id, task_b.id];
        let conflicts = graph.check_parallel_safety(&batch, &NullAstService).await;
        assert!(conflicts.is_empty());

        let (parallel, serialized) = AotGraph::split_batch(&batch, &conflicts);
        assert_eq!(parallel, batch);
        assert!(serialized.is_empty());
    }

    #[tokio::test]
    async fn shared_target_is_a_direct_conflict() {
        let shared = PathBuf::from("src/a.py");
        let task_a = TaskSpec::new("a").with_target_files(vec![shared.clone()]);
        let task_b = TaskSpec::new("b").with_target_files(vec![shared.clone()]);

        let graph = AotGraph::from_tasks(&[task_a.clone(), task_b.clone()]);
        let batch = vec![task_a.id, task_b.id];
        let conflicts = graph.check_parallel_safety(&batch, &NullAstService).await;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::Direct);
        assert_eq!(conflicts[0].path, shared);

        // Both sides of the pair are serialized, not just one.
        let (parallel, serialized) = AotGraph::split_batch(&batch, &conflicts);
        assert!(parallel.is_empty());
        assert_eq!(serialized, batch);
    }

    #[tokio::test]
    async fn target_in_read_set_is_a_read_write_conflict() {
        let shared = PathBuf::from("src/util.py");
        let writer = TaskSpec::new("writer").with_target_files(vec![shared.clone()]);
        let reader = TaskSpec::new("reader")
            .with_target_files(vec![PathBuf::from("src/other.py")])
            .with_read_files(vec![shared]);

        let graph = AotGraph::from_tasks(&[writer.clone(), reader.clone()]);
        let conflicts = graph
            .check_parallel_safety(&[writer.id, reader.id], &NullAstService)
            .await;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::ReadWrite);
    }

    #[tokio::test]
    async fn empty_target_list_conflicts_with_nothing() {
        // A research task writes nothing; it never serializes the batch, even
        // when a writer targets a file it reads.
        let research = TaskSpec::new("research")
            .with_read_files(vec![PathBuf::from("src/a.py")]);
        let writer =
            TaskSpec::new("writer").with_target_files(vec![PathBuf::from("src/a.py")]);

        let graph = AotGraph::from_tasks(&[research.clone(), writer.clone()]);
        let conflicts = graph
            .check_parallel_safety(&[research.id, writer.id], &NullAstService)
            .await;
        assert!(conflicts.is_empty());
    }
}
