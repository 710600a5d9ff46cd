// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.
//!
//! Each handler applies one event to the scheduler and returns the commands
//! that must run before the scheduling cycle that follows every event. Errors
//! from the scheduler (unknown ids, stale reports) are logged and dropped: a
//! bad report must not stop the runtime.

use tracing::{debug, info, warn};

use crate::dag::{DagScheduler, DispatchedTask, Migration, TaskStatus};
use crate::resource::NodeCapacity;
use crate::types::{NodeId, TaskId};

use super::SchedulerEvent;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Stop these tasks; their results are no longer wanted.
    AbortTasks(Vec<TaskId>),
    /// These tasks moved to another node.
    RelocateTasks(Vec<Migration>),
    /// Send these tasks to the executor.
    DispatchTasks(Vec<DispatchedTask>),
    /// Request that the process exits (used with `exit_when_idle`).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Scheduler events recorded while handling the event.
    pub events: Vec<SchedulerEvent>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

pub fn handle_task_completed(
    scheduler: &mut DagScheduler,
    task: TaskId,
    attempt: u32,
) -> Vec<CoreCommand> {
    match scheduler.report_completion(task, attempt) {
        Ok(ready) => debug!(task = %task, attempt, newly_ready = ?ready, "completion processed"),
        Err(e) => warn!(task = %task, error = %e, "ignoring completion report"),
    }
    Vec::new()
}

pub fn handle_task_failed(
    scheduler: &mut DagScheduler,
    task: TaskId,
    attempt: u32,
    reason: &str,
) -> Vec<CoreCommand> {
    match scheduler.report_failure(task, attempt) {
        Ok(blocked) => warn!(task = %task, reason, blocked = ?blocked, "task failure processed"),
        Err(e) => warn!(task = %task, error = %e, "ignoring failure report"),
    }
    Vec::new()
}

/// Cancelling a running task also tells the executor to stop it.
pub fn handle_task_cancelled(scheduler: &mut DagScheduler, task: TaskId) -> Vec<CoreCommand> {
    let was_running = scheduler.status_of(task) == Some(TaskStatus::Running);
    match scheduler.cancel_task(task) {
        Ok(blocked) => {
            debug!(task = %task, blocked = ?blocked, "cancellation processed");
            if was_running {
                return vec![CoreCommand::AbortTasks(vec![task])];
            }
        }
        Err(e) => warn!(task = %task, error = %e, "ignoring cancellation"),
    }
    Vec::new()
}

pub fn handle_node_at_risk(scheduler: &mut DagScheduler, node: NodeId) -> Vec<CoreCommand> {
    match scheduler.handle_node_at_risk(node) {
        Ok(decisions) => {
            let stuck = decisions.iter().filter(|d| !d.is_schedulable()).count();
            if stuck > 0 {
                warn!(node = %node, stuck, "some tasks could not leave the node at risk");
            }
        }
        Err(e) => warn!(node = %node, error = %e, "ignoring node-at-risk report"),
    }
    Vec::new()
}

pub fn handle_migration_requested(
    scheduler: &mut DagScheduler,
    task: TaskId,
    exclude_node: Option<NodeId>,
) -> Vec<CoreCommand> {
    if let Err(e) = scheduler.reschedule_task(task, exclude_node) {
        warn!(task = %task, error = %e, "ignoring migration request");
    }
    Vec::new()
}

pub fn handle_node_health_changed(
    scheduler: &mut DagScheduler,
    node: NodeId,
    healthy: bool,
) -> Vec<CoreCommand> {
    if let Err(e) = scheduler.set_node_health(node, healthy) {
        warn!(node = %node, error = %e, "ignoring health change");
    }
    Vec::new()
}

pub fn handle_node_joined(
    scheduler: &mut DagScheduler,
    node: NodeId,
    capacity: NodeCapacity,
) -> Vec<CoreCommand> {
    if let Err(e) = scheduler.join_node(node, capacity) {
        warn!(node = %node, error = %e, "rejected node join");
    }
    Vec::new()
}

/// Tasks stranded on the evicted node are aborted and go back to Ready.
pub fn handle_node_evicted(scheduler: &mut DagScheduler, node: NodeId) -> Vec<CoreCommand> {
    match scheduler.evict_node(node) {
        Ok(requeued) if !requeued.is_empty() => {
            info!(node = %node, requeued = ?requeued, "tasks requeued after eviction");
            vec![CoreCommand::AbortTasks(requeued)]
        }
        Ok(_) => Vec::new(),
        Err(e) => {
            warn!(node = %node, error = %e, "ignoring eviction");
            Vec::new()
        }
    }
}

pub fn handle_priority_override(
    scheduler: &mut DagScheduler,
    task: TaskId,
    priority: f64,
) -> Vec<CoreCommand> {
    if let Err(e) = scheduler.set_execution_priority(task, priority) {
        warn!(task = %task, error = %e, "ignoring priority override");
    }
    Vec::new()
}

pub fn handle_memory_sample(scheduler: &mut DagScheduler, task: TaskId, gb: f64) -> Vec<CoreCommand> {
    if let Err(e) = scheduler.record_memory_sample(task, gb) {
        warn!(task = %task, error = %e, "ignoring memory sample");
    }
    Vec::new()
}
