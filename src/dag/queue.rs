// src/dag/queue.rs

use std::cmp::Ordering;
use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::dag::graph::DagAnalyzer;
use crate::errors::Result;
use crate::types::TaskId;

/// Work waiting on the scheduler.
///
/// Two stages:
/// - `ready`: tasks whose dependencies are met, waiting for a node. Visited
///   each cycle in placement order (see [`ReadyQueue::placement_order`]).
/// - `launch`: tasks with a committed reservation, waiting for a parallelism
///   slot. Strict FIFO so earlier placements start first.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    ready: BTreeSet<TaskId>,
    launch: VecDeque<TaskId>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ready(&mut self, task: TaskId) {
        if self.ready.insert(task) {
            debug!(task = %task, "queued for placement");
        }
    }

    /// Move a placed task from the ready set to the back of the launch queue.
    pub fn push_launch(&mut self, task: TaskId) {
        self.ready.remove(&task);
        if !self.launch.contains(&task) {
            self.launch.push_back(task);
        }
    }

    pub fn pop_launch(&mut self) -> Option<TaskId> {
        self.launch.pop_front()
    }

    /// Forget a task in either stage.
    pub fn remove(&mut self, task: TaskId) {
        self.ready.remove(&task);
        self.launch.retain(|t| *t != task);
    }

    pub fn clear(&mut self) {
        self.ready.clear();
        self.launch.clear();
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn launch_len(&self) -> usize {
        self.launch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.launch.is_empty()
    }

    /// Ready tasks ordered by ascending depth, then descending execution
    /// priority, then ascending id.
    pub fn placement_order(&self, analyzer: &DagAnalyzer) -> Result<Vec<TaskId>> {
        let mut keyed = Vec::with_capacity(self.ready.len());
        for &task in &self.ready {
            keyed.push((analyzer.depth(task)?, analyzer.execution_priority(task), task));
        }
        keyed.sort_by(|a, b| compare_placement(*a, *b));
        Ok(keyed.into_iter().map(|(_, _, task)| task).collect())
    }

    /// Launch queue contents, front first.
    pub fn launch_order(&self) -> Vec<TaskId> {
        self.launch.iter().copied().collect()
    }
}

fn compare_placement(a: (usize, f64, TaskId), b: (usize, f64, TaskId)) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| b.1.total_cmp(&a.1))
        .then_with(|| a.2.cmp(&b.2))
}
