// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::dag::TaskStatus;
use crate::types::{NodeId, TaskId};

#[derive(Error, Debug)]
pub enum MemdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed input rejected before any state was touched.
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Cycle detected in DAG: {0}")]
    CycleDetected(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid transition for task {task}: {from:?} -> {to:?}")]
    InvalidTransition {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// An execution report for a run the scheduler no longer tracks.
    #[error("Stale report for task {task}: attempt {attempt} is not the running attempt")]
    StaleReport { task: TaskId, attempt: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MemdagError>;
