// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated scheduler state
//! - a list of "commands" describing what the IO shell should do next
//! - the scheduler events recorded along the way
//!
//! The async shell (`engine::runtime::Runtime`) reads events from channels,
//! forwards commands to the executor and handles shutdown. The core can be
//! tested without any Tokio types.

use tracing::{info, warn};

use crate::dag::{DagScheduler, SchedulerStep};
use crate::engine::event_handlers::{
    handle_memory_sample, handle_migration_requested, handle_node_at_risk,
    handle_node_evicted, handle_node_health_changed, handle_node_joined,
    handle_priority_override, handle_task_cancelled, handle_task_completed,
    handle_task_failed, CoreCommand, CoreStep,
};
use crate::engine::{RuntimeEvent, RuntimeOptions, SchedulerEvent};

/// Pure core runtime state.
///
/// Owns the scheduler and the runtime options. No channels, no IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: DagScheduler,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: DagScheduler, options: RuntimeOptions) -> Self {
        Self { scheduler, options }
    }

    pub fn scheduler(&self) -> &DagScheduler {
        &self.scheduler
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// First scheduling cycle, before any event arrived.
    pub fn start(&mut self) -> CoreStep {
        info!(dag = %self.scheduler.analyzer().description(), "core runtime starting");
        self.finish_step(Vec::new())
    }

    /// Handle a single runtime event, then run one scheduling cycle.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        let s = &mut self.scheduler;
        let commands = match event {
            RuntimeEvent::TaskCompleted { task, attempt } => {
                handle_task_completed(s, task, attempt)
            }
            RuntimeEvent::TaskFailed {
                task,
                attempt,
                reason,
            } => handle_task_failed(s, task, attempt, &reason),
            RuntimeEvent::TaskCancelled { task } => handle_task_cancelled(s, task),
            RuntimeEvent::NodeAtRisk { node } => handle_node_at_risk(s, node),
            RuntimeEvent::MigrationRequested { task, exclude_node } => {
                handle_migration_requested(s, task, exclude_node)
            }
            RuntimeEvent::NodeHealthChanged { node, healthy } => {
                handle_node_health_changed(s, node, healthy)
            }
            RuntimeEvent::NodeJoined { node, capacity } => handle_node_joined(s, node, capacity),
            RuntimeEvent::NodeEvicted { node } => handle_node_evicted(s, node),
            RuntimeEvent::PriorityOverride { task, priority } => {
                handle_priority_override(s, task, priority)
            }
            RuntimeEvent::MemorySample { task, gb } => handle_memory_sample(s, task, gb),
            RuntimeEvent::Tick => Vec::new(),
            RuntimeEvent::ShutdownRequested => {
                info!(status = %s.execution_status(), "shutdown requested");
                return CoreStep {
                    commands: Vec::new(),
                    events: s.drain_events(),
                    keep_running: false,
                };
            }
        };
        self.finish_step(commands)
    }

    /// Run the scheduling cycle and turn its results into commands.
    fn finish_step(&mut self, mut commands: Vec<CoreCommand>) -> CoreStep {
        let cycle = match self.scheduler.run_cycle() {
            Ok(step) => step,
            Err(e) => {
                warn!(error = %e, "scheduling cycle failed");
                SchedulerStep::default()
            }
        };

        let events = self.scheduler.drain_events();
        let relocated: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::Migrated(m) => Some(*m),
                _ => None,
            })
            .collect();
        if !relocated.is_empty() {
            commands.push(CoreCommand::RelocateTasks(relocated));
        }
        if !cycle.dispatched.is_empty() {
            commands.push(CoreCommand::DispatchTasks(cycle.dispatched));
        }

        let mut keep_running = true;
        if self.options.exit_when_idle && !self.scheduler.has_work_in_flight() {
            if !self.scheduler.is_settled() {
                warn!(
                    stranded = ?cycle.decisions.iter().map(|d| d.task_id).collect::<Vec<_>>(),
                    "idle with unfinished tasks that no node can take"
                );
            }
            info!(status = %self.scheduler.execution_status(), "nothing in flight; exiting");
            commands.push(CoreCommand::RequestExit);
            keep_running = false;
        }

        CoreStep {
            commands,
            events,
            keep_running,
        }
    }
}
