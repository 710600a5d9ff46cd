// src/dag/state_manager.rs

//! Status transitions and dependency propagation for tasks in the scheduler.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::dag::scheduler_step::SchedulerEvent;
use crate::dag::task_info::{TaskInfo, TaskStatus};
use crate::errors::{MemdagError, Result};
use crate::types::TaskId;

/// Applies status changes to the task map and records a
/// [`SchedulerEvent::StatusChanged`] for each one.
pub struct StateManager<'a> {
    tasks: &'a mut BTreeMap<TaskId, TaskInfo>,
    events: &'a mut VecDeque<SchedulerEvent>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        tasks: &'a mut BTreeMap<TaskId, TaskInfo>,
        events: &'a mut VecDeque<SchedulerEvent>,
    ) -> Self {
        Self { tasks, events }
    }

    /// Move `task` to `to`, returning its previous status.
    ///
    /// Rejects moves the lifecycle does not allow with `InvalidTransition`
    /// and leaves the task untouched.
    pub fn transition(&mut self, task: TaskId, to: TaskStatus) -> Result<TaskStatus> {
        let info = self
            .tasks
            .get_mut(&task)
            .ok_or(MemdagError::TaskNotFound(task))?;
        let from = info.status;
        if !from.can_transition_to(to) {
            return Err(MemdagError::InvalidTransition { task, from, to });
        }
        info.status = to;
        debug!(task = %task, from = %from, to = %to, "status changed");
        self.events.push_back(SchedulerEvent::StatusChanged {
            task,
            old: from,
            new: to,
        });
        Ok(from)
    }

    /// Promote every Pending task among `candidates` whose predecessors have
    /// all completed. Returns the promoted ids in ascending order.
    pub fn promote_ready(&mut self, candidates: impl IntoIterator<Item = TaskId>) -> Vec<TaskId> {
        let candidates: BTreeSet<TaskId> = candidates.into_iter().collect();
        let ready: Vec<TaskId> = {
            let ro = ReadOnlyStateManager::new(self.tasks);
            candidates
                .into_iter()
                .filter(|id| {
                    self.tasks.get(id).is_some_and(|info| {
                        info.status == TaskStatus::Pending && ro.deps_satisfied_for_info(info)
                    })
                })
                .collect()
        };

        let mut promoted = Vec::with_capacity(ready.len());
        for id in ready {
            match self.transition(id, TaskStatus::Ready) {
                Ok(_) => promoted.push(id),
                Err(e) => warn!(task = %id, error = %e, "could not promote task to Ready"),
            }
        }
        promoted
    }

    /// Mark every transitive dependent of `root` as Blocked and record `root`
    /// as one of its blockers.
    ///
    /// Returns the tasks newly moved to Blocked. Dependents already Blocked
    /// only gain another blocker.
    pub fn block_dependents(&mut self, root: TaskId) -> Vec<TaskId> {
        let mut stack: Vec<TaskId> = self
            .tasks
            .get(&root)
            .map(|info| info.dependents.clone())
            .unwrap_or_default();
        let mut visited: BTreeSet<TaskId> = BTreeSet::new();
        let mut newly_blocked = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(info) = self.tasks.get_mut(&id) else {
                warn!(task = %id, "dependent missing from tasks map");
                continue;
            };

            match info.status {
                TaskStatus::Pending | TaskStatus::Ready => {
                    info.blocked_by.insert(root);
                    stack.extend(info.dependents.iter().copied());
                    if self.transition(id, TaskStatus::Blocked).is_ok() {
                        newly_blocked.push(id);
                    }
                }
                TaskStatus::Blocked => {
                    info.blocked_by.insert(root);
                    stack.extend(info.dependents.iter().copied());
                }
                _ => {
                    // Started or finished tasks keep their status.
                }
            }
        }

        newly_blocked.sort_unstable();
        newly_blocked
    }

    /// Undo [`block_dependents`](Self::block_dependents) for `root`.
    ///
    /// Tasks left without any blocker return to Pending. Returns those tasks.
    pub fn unblock_dependents(&mut self, root: TaskId) -> Vec<TaskId> {
        let mut stack: Vec<TaskId> = self
            .tasks
            .get(&root)
            .map(|info| info.dependents.clone())
            .unwrap_or_default();
        let mut visited: BTreeSet<TaskId> = BTreeSet::new();
        let mut released = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(info) = self.tasks.get_mut(&id) else {
                continue;
            };
            if !info.blocked_by.remove(&root) {
                continue;
            }
            stack.extend(info.dependents.iter().copied());
            if info.blocked_by.is_empty()
                && info.status == TaskStatus::Blocked
                && self.transition(id, TaskStatus::Pending).is_ok()
            {
                released.push(id);
            }
        }

        released.sort_unstable();
        released
    }

    /// Rebuild `blocked_by` for every Blocked task in `ids` from the failed
    /// or cancelled tasks still upstream of it. Used after the graph lost
    /// edges; tasks left without a blocker return to Pending and are
    /// returned.
    pub fn recompute_blockers(&mut self, ids: impl IntoIterator<Item = TaskId>) -> Vec<TaskId> {
        let mut released = Vec::new();
        for id in ids {
            let Some(info) = self.tasks.get(&id) else {
                continue;
            };
            if info.status != TaskStatus::Blocked {
                continue;
            }
            let blockers = self.upstream_blockers(id);
            let Some(info) = self.tasks.get_mut(&id) else {
                continue;
            };
            info.blocked_by = blockers;
            if info.blocked_by.is_empty() && self.transition(id, TaskStatus::Pending).is_ok() {
                released.push(id);
            }
        }
        released.sort_unstable();
        released
    }

    fn upstream_blockers(&self, id: TaskId) -> BTreeSet<TaskId> {
        let mut stack: Vec<TaskId> = vec![id];
        let mut visited: BTreeSet<TaskId> = BTreeSet::new();
        let mut blockers = BTreeSet::new();
        while let Some(current) = stack.pop() {
            let Some(info) = self.tasks.get(&current) else {
                continue;
            };
            for &(pred, _) in &info.predecessors {
                if !visited.insert(pred) {
                    continue;
                }
                match self.tasks.get(&pred).map(|p| p.status) {
                    Some(TaskStatus::Failed | TaskStatus::Cancelled) => {
                        blockers.insert(pred);
                    }
                    Some(_) => stack.push(pred),
                    None => {}
                }
            }
        }
        blockers
    }
}

/// A read-only view for dependency checks and status queries.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a BTreeMap<TaskId, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a BTreeMap<TaskId, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// True when every predecessor of `info` has completed.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.predecessors.iter().all(|(pred, _)| match self.tasks.get(pred) {
            Some(p) => p.status == TaskStatus::Completed,
            None => {
                warn!(task = %info.id, dep = %pred, "dependency missing from tasks map");
                false
            }
        })
    }

    pub fn with_status(&self, status: TaskStatus) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|info| info.status == status)
            .map(|info| info.id)
            .collect()
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|info| info.status == status).count()
    }

    /// No task can make further progress without outside help: everything is
    /// terminal or Blocked.
    pub fn all_tasks_settled(&self) -> bool {
        self.tasks
            .values()
            .all(|info| info.status.is_terminal() || info.status == TaskStatus::Blocked)
    }
}
