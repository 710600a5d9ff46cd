// src/dag/mod.rs

//! DAG representation, analysis and scheduling.
//!
//! - [`graph`] holds the task graph ([`DagAnalyzer`]) with cycle-safe edits
//!   and topological queries.
//! - [`analysis`] derives critical paths, memory pressure and other metrics.
//! - [`scheduler`] contains the orchestrator that moves tasks through their
//!   lifecycle and talks to the resource registry.
//! - [`task_info`] provides task metadata, statuses and dispatch records.
//! - [`queue`] orders ready and placed tasks.
//! - [`scheduler_step`] defines the events and per-cycle results.
//! - [`state_manager`] applies status transitions and failure propagation.

pub mod analysis;
pub mod edge;
pub mod graph;
pub mod queue;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use analysis::DagNodeMetrics;
pub use edge::DependencyEdge;
pub use graph::DagAnalyzer;
pub use queue::ReadyQueue;
pub use scheduler::{DagScheduler, SchedulerReport};
pub use scheduler_step::{SchedulerEvent, SchedulerStep};
pub use task_info::{DependencySpec, DispatchedTask, Migration, TaskInfo, TaskSpec, TaskStatus};
