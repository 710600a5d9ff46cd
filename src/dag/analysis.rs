// src/dag/analysis.rs

//! Derived metrics over a [`DagAnalyzer`]: heaviest paths, memory pressure,
//! peak-memory estimates and connectivity.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::dag::edge::DependencyEdge;
use crate::dag::graph::DagAnalyzer;
use crate::errors::{MemdagError, Result};
use crate::types::TaskId;

/// Graph-analysis record for one task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DagNodeMetrics {
    pub task: TaskId,
    pub depth: usize,
    pub height: usize,
    pub memory_pressure: f64,
    pub execution_priority: f64,
}

/// Lexicographic path weight: primary key first, tie-break second.
type PathKey = (f64, f64);

fn add(a: PathKey, b: PathKey) -> PathKey {
    (a.0 + b.0, a.1 + b.1)
}

fn cmp_key(a: PathKey, b: PathKey) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
}

impl DagAnalyzer {
    /// Source-to-sink path maximising total estimated duration plus transfer
    /// cost of the edges on it. Equal paths prefer the larger memory
    /// footprint, then the one through lower task ids.
    pub fn critical_path(&self) -> Result<Vec<TaskId>> {
        self.heaviest_path(
            |id| {
                let duration = self
                    .requirements(id)
                    .map_or(0.0, |r| r.estimated_duration_ms as f64);
                (duration, self.effective_memory_gb(id))
            },
            |edge| (edge.transfer_cost_ms, 0.0),
        )
    }

    /// Source-to-sink path maximising total task memory, ties broken by
    /// duration.
    pub fn memory_critical_path(&self) -> Result<Vec<TaskId>> {
        self.heaviest_path(
            |id| {
                let duration = self
                    .requirements(id)
                    .map_or(0.0, |r| r.estimated_duration_ms as f64);
                (self.effective_memory_gb(id), duration)
            },
            |_| (0.0, 0.0),
        )
    }

    /// Dynamic programme over the topological order. For every vertex we keep
    /// the best path ending there; only strictly better candidates replace
    /// the current one, and predecessors are visited in ascending order, so
    /// ties settle on the lowest ids.
    fn heaviest_path(
        &self,
        node_key: impl Fn(TaskId) -> PathKey,
        edge_key: impl Fn(&DependencyEdge) -> PathKey,
    ) -> Result<Vec<TaskId>> {
        let order = self.topological_order()?;
        let mut best: HashMap<TaskId, (PathKey, Option<TaskId>)> = HashMap::new();

        for &id in &order {
            let own = node_key(id);
            let mut entry: Option<(PathKey, Option<TaskId>)> = None;

            for pred in self.predecessors(id) {
                let (pred_key, _) = best
                    .get(&pred)
                    .copied()
                    .ok_or(MemdagError::TaskNotFound(pred))?;
                let edge = self.edge(pred, id).copied().unwrap_or_default();
                let candidate = add(add(pred_key, edge_key(&edge)), own);

                let better = match entry {
                    None => true,
                    Some((current, _)) => cmp_key(candidate, current) == Ordering::Greater,
                };
                if better {
                    entry = Some((candidate, Some(pred)));
                }
            }

            best.insert(id, entry.unwrap_or((own, None)));
        }

        let mut end: Option<(PathKey, TaskId)> = None;
        for sink in self.sinks() {
            let (key, _) = best
                .get(&sink)
                .copied()
                .ok_or(MemdagError::TaskNotFound(sink))?;
            let better = match end {
                None => true,
                Some((current, _)) => cmp_key(key, current) == Ordering::Greater,
            };
            if better {
                end = Some((key, sink));
            }
        }

        let mut path = Vec::new();
        let mut cursor = end.map(|(_, id)| id);
        while let Some(id) = cursor {
            path.push(id);
            cursor = best.get(&id).and_then(|(_, prev)| *prev);
        }
        path.reverse();
        Ok(path)
    }

    /// Memory-exhaustion risk for `id`, in [0, 1].
    ///
    /// Adds the task's own memory to the overlap estimates of every edge whose
    /// other endpoint may be resident at the same time: predecessors not yet
    /// finished, and all dependents (which may start right after). The sum is
    /// normalised against `reference_memory_gb`, normally the largest node
    /// memory in the cluster.
    pub fn memory_pressure(
        &self,
        id: TaskId,
        reference_memory_gb: f64,
        is_finished: impl Fn(TaskId) -> bool,
    ) -> Result<f64> {
        if !self.contains_task(id) {
            return Err(MemdagError::TaskNotFound(id));
        }

        let mut resident = self.effective_memory_gb(id);
        for pred in self.predecessors(id) {
            if !is_finished(pred) {
                resident += self.edge(pred, id).map_or(0.0, |e| e.memory_overlap_gb);
            }
        }
        for dep in self.dependents(id) {
            resident += self.edge(id, dep).map_or(0.0, |e| e.memory_overlap_gb);
        }

        if reference_memory_gb <= 0.0 {
            return Ok(1.0);
        }
        Ok((resident / reference_memory_gb).clamp(0.0, 1.0))
    }

    /// Tasks whose memory pressure is at least `threshold`, highest first.
    pub fn memory_critical_tasks(
        &self,
        reference_memory_gb: f64,
        threshold: f64,
        is_finished: impl Fn(TaskId) -> bool,
    ) -> Result<Vec<(TaskId, f64)>> {
        let mut critical = Vec::new();
        for id in self.tasks() {
            let pressure = self.memory_pressure(id, reference_memory_gb, &is_finished)?;
            if pressure >= threshold {
                critical.push((id, pressure));
            }
        }
        critical.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(critical)
    }

    /// Rough peak memory for the whole DAG: tasks sharing a depth level may run
    /// together, so the heaviest level bounds the concurrent footprint.
    pub fn estimate_peak_memory(&self) -> Result<f64> {
        let mut per_level: BTreeMap<usize, f64> = BTreeMap::new();
        for id in self.tasks() {
            *per_level.entry(self.depth(id)?).or_default() += self.effective_memory_gb(id);
        }
        Ok(per_level.values().copied().fold(0.0, f64::max))
    }

    /// Weakly connected groups of tasks. Each group is sorted, and groups are
    /// ordered by their smallest id.
    pub fn connected_components(&self) -> Vec<Vec<TaskId>> {
        let mut seen: BTreeSet<TaskId> = BTreeSet::new();
        let mut components = Vec::new();

        for start in self.tasks() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(id) = queue.pop_front() {
                let neighbours = self
                    .predecessors(id)
                    .into_iter()
                    .chain(self.dependents(id));
                for n in neighbours {
                    if seen.insert(n) {
                        component.push(n);
                        queue.push_back(n);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    pub fn node_metrics(
        &self,
        id: TaskId,
        reference_memory_gb: f64,
        is_finished: impl Fn(TaskId) -> bool,
    ) -> Result<DagNodeMetrics> {
        Ok(DagNodeMetrics {
            task: id,
            depth: self.depth(id)?,
            height: self.height(id)?,
            memory_pressure: self.memory_pressure(id, reference_memory_gb, is_finished)?,
            execution_priority: self.execution_priority(id),
        })
    }

    /// One-line human readable summary.
    pub fn description(&self) -> String {
        let fmt_ids = |ids: Vec<TaskId>| {
            ids.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "{} tasks, {} dependencies, sources [{}], sinks [{}]",
            self.task_count(),
            self.dependency_count(),
            fmt_ids(self.sources()),
            fmt_ids(self.sinks()),
        )
    }
}
