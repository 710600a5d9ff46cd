// src/placement/decision.rs

use serde::Serialize;

use crate::types::{NodeId, TaskId};

/// Component scores for one candidate node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeScore {
    pub node: NodeId,
    pub memory: f64,
    pub cpu: f64,
    pub network: f64,
    pub overall: f64,
}

/// Outcome of one placement attempt.
///
/// `target_node == None` means no node could take the task right now. That is
/// a normal, transient outcome: the task stays Ready and is retried on the
/// next cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulingDecision {
    pub task_id: TaskId,
    pub target_node: Option<NodeId>,
    pub memory_score: f64,
    pub cpu_score: f64,
    pub network_score: f64,
    pub overall_score: f64,
    pub rationale: String,
    /// Other nodes that were scored, best first.
    pub alternatives: Vec<NodeId>,
}

impl SchedulingDecision {
    pub(crate) fn placed(task_id: TaskId, best: NodeScore, alternatives: Vec<NodeId>, rationale: String) -> Self {
        Self {
            task_id,
            target_node: Some(best.node),
            memory_score: best.memory,
            cpu_score: best.cpu,
            network_score: best.network,
            overall_score: best.overall,
            rationale,
            alternatives,
        }
    }

    pub(crate) fn unschedulable(task_id: TaskId, alternatives: Vec<NodeId>, rationale: String) -> Self {
        Self {
            task_id,
            target_node: None,
            memory_score: 0.0,
            cpu_score: 0.0,
            network_score: 0.0,
            overall_score: 0.0,
            rationale,
            alternatives,
        }
    }

    pub fn is_schedulable(&self) -> bool {
        self.target_node.is_some()
    }
}
