// src/dag/task_info.rs

//! Task metadata, lifecycle status and the records handed to executors.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

use serde::Serialize;

use crate::dag::edge::DependencyEdge;
use crate::resource::ResourceRequirements;
use crate::types::{DependencyKind, NodeId, TaskId};

/// Lifecycle of a task.
///
/// `Pending -> Ready -> Scheduled -> Running -> Completed | Failed`.
/// Anything not yet running may be `Cancelled`. `Blocked` marks a dependent
/// of a failed or cancelled task; it never turns into `Ready` on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskStatus {
    /// Waiting on at least one predecessor.
    Pending,
    /// Every predecessor completed; waiting for a node.
    Ready,
    /// Node chosen and reservation committed; waiting for a parallelism slot.
    Scheduled,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Cannot run because an upstream task failed or was cancelled.
    Blocked,
}

impl TaskStatus {
    /// Completed, Failed and Cancelled are never left by the scheduler itself.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Statuses in which the task holds a node reservation.
    pub fn holds_reservation(self) -> bool {
        matches!(self, TaskStatus::Scheduled | TaskStatus::Running)
    }

    /// Whether the lifecycle allows moving from `self` to `to`.
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, Ready)
                | (Pending, Blocked)
                | (Pending, Cancelled)
                | (Ready, Scheduled)
                | (Ready, Pending)
                | (Ready, Blocked)
                | (Ready, Cancelled)
                | (Scheduled, Running)
                | (Scheduled, Ready)
                | (Scheduled, Failed)
                | (Scheduled, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Running, Ready)
                | (Blocked, Pending)
                | (Blocked, Cancelled)
                | (Failed, Pending)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Ready => "READY",
            TaskStatus::Scheduled => "SCHEDULED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
            TaskStatus::Blocked => "BLOCKED",
        };
        f.write_str(s)
    }
}

/// Input description of a task for [`DagScheduler::build_dag`](crate::dag::DagScheduler::build_dag).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub id: TaskId,
    pub name: Option<String>,
    pub requirements: ResourceRequirements,
    /// Externally supplied execution priority; higher runs first among
    /// tasks at the same depth.
    pub priority: Option<f64>,
}

impl TaskSpec {
    pub fn new(id: TaskId, requirements: ResourceRequirements) -> Self {
        Self {
            id,
            name: None,
            requirements,
            priority: None,
        }
    }
}

/// Input description of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DependencySpec {
    pub from: TaskId,
    pub to: TaskId,
    pub edge: DependencyEdge,
}

impl DependencySpec {
    pub fn new(from: TaskId, to: TaskId, kind: DependencyKind) -> Self {
        Self {
            from,
            to,
            edge: DependencyEdge::new(kind),
        }
    }
}

/// Per-task state owned by the scheduler.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: Option<String>,
    pub requirements: ResourceRequirements,
    /// Direct predecessors with the kind of each dependency.
    pub predecessors: Vec<(TaskId, DependencyKind)>,
    /// Direct dependents.
    pub dependents: Vec<TaskId>,
    pub status: TaskStatus,
    /// Current node while a reservation is held; after completion the node
    /// the task last ran on (where its output lives).
    pub assigned_node: Option<NodeId>,
    /// Failed or cancelled upstream tasks responsible for a `Blocked` status.
    pub blocked_by: BTreeSet<TaskId>,
    /// How many times the task was dispatched. Execution reports must name
    /// the current attempt.
    pub attempt: u32,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl TaskInfo {
    pub fn from_spec(spec: &TaskSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name.clone(),
            requirements: spec.requirements,
            predecessors: Vec::new(),
            dependents: Vec::new(),
            status: TaskStatus::Pending,
            assigned_node: None,
            blocked_by: BTreeSet::new(),
            attempt: 0,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Wall time between dispatch and completion, if both happened.
    pub fn execution_time_ms(&self) -> Option<f64> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        Some(finished.duration_since(started).as_secs_f64() * 1000.0)
    }
}

/// A task the scheduler wants an executor to start now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchedTask {
    pub task: TaskId,
    pub name: Option<String>,
    pub node: NodeId,
    /// Echoed back in `TaskCompleted`/`TaskFailed`.
    pub attempt: u32,
    pub requirements: ResourceRequirements,
}

impl DispatchedTask {
    pub fn from_task_info(info: &TaskInfo, node: NodeId) -> Self {
        Self {
            task: info.id,
            name: info.name.clone(),
            node,
            attempt: info.attempt,
            requirements: info.requirements,
        }
    }
}

/// A task moved from one node to another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Migration {
    pub task: TaskId,
    pub from: NodeId,
    pub to: NodeId,
    /// Overall score gained by the move. Forced moves (node at risk) may have
    /// a negative gain.
    pub improvement: f64,
}
