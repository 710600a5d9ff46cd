// src/engine/mod.rs

//! Orchestration engine for memdag.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the main runtime event loop that reacts to:
//!   - task completion, failure and cancellation reports
//!   - cluster changes (nodes joining, leaving, at risk, changing health)
//!   - migration requests and priority overrides from outside services
//!   - periodic ticks and shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use crate::resource::NodeCapacity;
use crate::types::{NodeId, TaskId};

pub use crate::dag::SchedulerEvent;

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Exit once no task holds a reservation after a scheduling cycle.
    pub exit_when_idle: bool,
    /// Run a scheduling cycle on this period even without other events.
    pub tick_interval: Option<Duration>,
}

/// Events flowing into the runtime from executors and cluster services.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// A dispatched run finished successfully. `attempt` comes from the
    /// `DispatchedTask` that started it.
    TaskCompleted { task: TaskId, attempt: u32 },
    /// A dispatched run failed.
    TaskFailed {
        task: TaskId,
        attempt: u32,
        reason: String,
    },
    /// Someone asked for a task to be cancelled.
    TaskCancelled { task: TaskId },
    /// A failure predictor expects this node to go down.
    NodeAtRisk { node: NodeId },
    /// Move one task away, optionally avoiding a specific node.
    MigrationRequested {
        task: TaskId,
        exclude_node: Option<NodeId>,
    },
    NodeHealthChanged { node: NodeId, healthy: bool },
    NodeJoined { node: NodeId, capacity: NodeCapacity },
    NodeEvicted { node: NodeId },
    /// External priority for a task (e.g. from a learned policy).
    PriorityOverride { task: TaskId, priority: f64 },
    /// Observed memory use of a running task.
    MemorySample { task: TaskId, gb: f64 },
    /// Periodic wake-up; only runs a scheduling cycle.
    Tick,
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
