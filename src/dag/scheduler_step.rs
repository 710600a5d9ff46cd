// src/dag/scheduler_step.rs

//! Result types produced by the scheduler.

use serde::Serialize;

use crate::dag::task_info::{DispatchedTask, Migration, TaskStatus};
use crate::placement::SchedulingDecision;
use crate::types::TaskId;

/// Something observers of the scheduler may want to know about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SchedulerEvent {
    /// One placement attempt, successful or not.
    Decision(SchedulingDecision),
    StatusChanged {
        task: TaskId,
        old: TaskStatus,
        new: TaskStatus,
    },
    Migrated(Migration),
}

/// Structured result of one scheduling cycle.
///
/// Tests that step the scheduler by hand use this to assert what a cycle did.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Migrations performed by the memory-pressure check.
    pub migrations: Vec<Migration>,
    /// Every placement attempt, in visiting order.
    pub decisions: Vec<SchedulingDecision>,
    /// Tasks moved to Running in this cycle.
    pub dispatched: Vec<DispatchedTask>,
}

impl SchedulerStep {
    /// Ids of tasks that got a node in this cycle.
    pub fn placed(&self) -> Vec<TaskId> {
        self.decisions
            .iter()
            .filter(|d| d.is_schedulable())
            .map(|d| d.task_id)
            .collect()
    }

    /// Ids of tasks visited but left Ready.
    pub fn unschedulable(&self) -> Vec<TaskId> {
        self.decisions
            .iter()
            .filter(|d| !d.is_schedulable())
            .map(|d| d.task_id)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty() && self.decisions.is_empty() && self.dispatched.is_empty()
    }
}
