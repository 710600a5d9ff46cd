// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::sync::OnceLock;

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use tracing::{debug, warn};

use crate::dag::edge::DependencyEdge;
use crate::errors::{MemdagError, Result};
use crate::resource::{MemoryProfile, ResourceRequirements, DEFAULT_PROFILE_WINDOW};
use crate::types::TaskId;

/// Depth and height of every vertex, computed together and cached until the
/// next structural change.
#[derive(Debug, Clone, Default)]
struct LevelCache {
    depth: HashMap<TaskId, usize>,
    height: HashMap<TaskId, usize>,
}

/// Task dependency graph plus the per-task data the analysis needs.
///
/// Edge direction is `predecessor -> dependent`. The graph is kept acyclic:
/// [`add_dependency`](Self::add_dependency) refuses any edge that would close
/// a cycle.
#[derive(Debug, Clone)]
pub struct DagAnalyzer {
    graph: DiGraphMap<TaskId, DependencyEdge>,
    requirements: BTreeMap<TaskId, ResourceRequirements>,
    profiles: BTreeMap<TaskId, MemoryProfile>,
    priorities: BTreeMap<TaskId, f64>,
    profile_window: usize,
    levels: OnceLock<LevelCache>,
}

impl Default for DagAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl DagAnalyzer {
    pub fn new() -> Self {
        Self::with_profile_window(DEFAULT_PROFILE_WINDOW)
    }

    pub fn with_profile_window(profile_window: usize) -> Self {
        Self {
            graph: DiGraphMap::new(),
            requirements: BTreeMap::new(),
            profiles: BTreeMap::new(),
            priorities: BTreeMap::new(),
            profile_window,
            levels: OnceLock::new(),
        }
    }

    fn invalidate(&mut self) {
        self.levels = OnceLock::new();
    }

    /// Insert a vertex. Adding an id that already exists is a no-op.
    pub fn add_task(&mut self, id: TaskId, requirements: ResourceRequirements) -> Result<()> {
        requirements.validate()?;
        if self.graph.contains_node(id) {
            debug!(task = %id, "task already in DAG; ignoring add");
            return Ok(());
        }
        self.graph.add_node(id);
        self.requirements.insert(id, requirements);
        self.profiles
            .insert(id, MemoryProfile::new(self.profile_window));
        self.invalidate();
        debug!(task = %id, "task added to DAG");
        Ok(())
    }

    /// Insert `from -> to`. The edge is refused with `CycleDetected` if `to`
    /// already reaches `from`; the graph is left untouched in that case.
    pub fn add_dependency(&mut self, from: TaskId, to: TaskId, edge: DependencyEdge) -> Result<()> {
        edge.validate()?;
        for id in [from, to] {
            if !self.graph.contains_node(id) {
                return Err(MemdagError::TaskNotFound(id));
            }
        }

        if from == to || has_path_connecting(&self.graph, to, from, None) {
            warn!(from = %from, to = %to, "rejecting dependency that would create a cycle");
            return Err(MemdagError::CycleDetected(format!(
                "edge {from} -> {to} would close a cycle"
            )));
        }

        self.graph.add_edge(from, to, edge);
        self.invalidate();
        debug!(from = %from, to = %to, kind = %edge.kind, "dependency added");
        Ok(())
    }

    /// Remove a vertex and all incident edges.
    ///
    /// Former dependents simply lose that predecessor; re-evaluating their
    /// readiness is the scheduler's job.
    pub fn remove_task(&mut self, id: TaskId) -> Result<()> {
        if !self.graph.remove_node(id) {
            return Err(MemdagError::TaskNotFound(id));
        }
        self.requirements.remove(&id);
        self.profiles.remove(&id);
        self.priorities.remove(&id);
        self.invalidate();
        debug!(task = %id, "task removed from DAG");
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::with_profile_window(self.profile_window);
    }

    pub fn contains_task(&self, id: TaskId) -> bool {
        self.graph.contains_node(id)
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All task ids, ascending.
    pub fn tasks(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.graph.nodes().collect();
        ids.sort_unstable();
        ids
    }

    /// Direct predecessors, ascending.
    pub fn predecessors(&self, id: TaskId) -> Vec<TaskId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct dependents, ascending.
    pub fn dependents(&self, id: TaskId) -> Vec<TaskId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: TaskId, dir: Direction) -> Vec<TaskId> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }
        let mut ids: Vec<TaskId> = self.graph.neighbors_directed(id, dir).collect();
        ids.sort_unstable();
        ids
    }

    pub fn edge(&self, from: TaskId, to: TaskId) -> Option<&DependencyEdge> {
        self.graph.edge_weight(from, to)
    }

    /// All edges as `(from, to, edge)`, ordered by `(from, to)`.
    pub fn edges(&self) -> Vec<(TaskId, TaskId, DependencyEdge)> {
        let mut edges: Vec<_> = self
            .graph
            .all_edges()
            .map(|(a, b, e)| (a, b, *e))
            .collect();
        edges.sort_by_key(|(a, b, _)| (*a, *b));
        edges
    }

    pub fn requirements(&self, id: TaskId) -> Option<&ResourceRequirements> {
        self.requirements.get(&id)
    }

    pub fn memory_profile(&self, id: TaskId) -> Option<&MemoryProfile> {
        self.profiles.get(&id)
    }

    /// Record an observed memory sample for a task.
    pub fn record_memory_sample(&mut self, id: TaskId, gb: f64) -> Result<()> {
        let profile = self
            .profiles
            .get_mut(&id)
            .ok_or(MemdagError::TaskNotFound(id))?;
        profile.record(gb);
        Ok(())
    }

    /// Memory a task is expected to hold: the larger of its declared
    /// requirement and the observed peak.
    pub fn effective_memory_gb(&self, id: TaskId) -> f64 {
        let declared = self.requirements.get(&id).map_or(0.0, |r| r.memory_gb);
        let observed = self.profiles.get(&id).map_or(0.0, MemoryProfile::peak_gb);
        declared.max(observed)
    }

    /// Externally supplied priority (e.g. from a learned ranker).
    pub fn set_execution_priority(&mut self, id: TaskId, priority: f64) -> Result<()> {
        if !self.graph.contains_node(id) {
            return Err(MemdagError::TaskNotFound(id));
        }
        if !priority.is_finite() {
            return Err(MemdagError::ValidationError(format!(
                "execution priority for {id} must be finite (got {priority})"
            )));
        }
        self.priorities.insert(id, priority);
        Ok(())
    }

    /// Override if one was supplied, otherwise 0.
    pub fn execution_priority(&self, id: TaskId) -> f64 {
        self.priorities.get(&id).copied().unwrap_or(0.0)
    }

    /// DFS back-edge check.
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Kahn's algorithm; among vertices with no remaining predecessors the
    /// smallest id goes first.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let mut in_degree: HashMap<TaskId, usize> = self
            .graph
            .nodes()
            .map(|n| (n, self.graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();

        let mut frontier: BinaryHeap<Reverse<TaskId>> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| Reverse(*id))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(id)) = frontier.pop() {
            order.push(id);
            for next in self.graph.neighbors_directed(id, Direction::Outgoing) {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        frontier.push(Reverse(next));
                    }
                }
            }
        }

        if order.len() != self.graph.node_count() {
            return Err(MemdagError::CycleDetected(format!(
                "topological sort emitted {} of {} tasks",
                order.len(),
                self.graph.node_count()
            )));
        }
        Ok(order)
    }

    /// Length of the longest predecessor chain ending at `id`.
    pub fn depth(&self, id: TaskId) -> Result<usize> {
        self.levels()?
            .depth
            .get(&id)
            .copied()
            .ok_or(MemdagError::TaskNotFound(id))
    }

    /// Length of the longest successor chain starting at `id`.
    pub fn height(&self, id: TaskId) -> Result<usize> {
        self.levels()?
            .height
            .get(&id)
            .copied()
            .ok_or(MemdagError::TaskNotFound(id))
    }

    fn levels(&self) -> Result<&LevelCache> {
        if let Some(levels) = self.levels.get() {
            return Ok(levels);
        }

        let mut cache = LevelCache::default();
        let mut visiting = HashSet::new();
        for id in self.graph.nodes() {
            self.level_of(id, Direction::Incoming, &mut cache.depth, &mut visiting)?;
            self.level_of(id, Direction::Outgoing, &mut cache.height, &mut visiting)?;
        }
        Ok(self.levels.get_or_init(|| cache))
    }

    /// Memoised longest chain from `id` following `dir`. A vertex seen again
    /// while still on the stack means the graph has a cycle.
    fn level_of(
        &self,
        id: TaskId,
        dir: Direction,
        memo: &mut HashMap<TaskId, usize>,
        visiting: &mut HashSet<TaskId>,
    ) -> Result<usize> {
        if let Some(level) = memo.get(&id) {
            return Ok(*level);
        }
        if !visiting.insert(id) {
            return Err(MemdagError::CycleDetected(format!(
                "task {id} reached again while computing levels"
            )));
        }

        let mut level = 0;
        let next: Vec<TaskId> = self.graph.neighbors_directed(id, dir).collect();
        for n in next {
            level = level.max(self.level_of(n, dir, memo, visiting)? + 1);
        }

        visiting.remove(&id);
        memo.insert(id, level);
        Ok(level)
    }

    /// Tasks with no predecessors, ascending.
    pub fn sources(&self) -> Vec<TaskId> {
        self.tasks()
            .into_iter()
            .filter(|&id| self.graph.neighbors_directed(id, Direction::Incoming).next().is_none())
            .collect()
    }

    /// Tasks with no dependents, ascending.
    pub fn sinks(&self) -> Vec<TaskId> {
        self.tasks()
            .into_iter()
            .filter(|&id| self.graph.neighbors_directed(id, Direction::Outgoing).next().is_none())
            .collect()
    }
}
