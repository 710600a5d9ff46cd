// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender,
//! so tests can substitute a fake that records dispatches and answers with
//! `TaskCompleted` straight away.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::dag::{DispatchedTask, Migration};
use crate::engine::RuntimeEvent;
use crate::errors::{Error, Result};
use crate::types::TaskId;

use super::executor_loop::{spawn_executor, ExecutorCommand};

/// Boxed future returned by [`ExecutorBackend`] methods.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting how dispatched tasks are executed.
pub trait ExecutorBackend: Send {
    /// Start the given tasks on their assigned nodes.
    fn spawn_ready_tasks(&mut self, tasks: Vec<DispatchedTask>) -> BackendFuture<'_>;

    /// Stop the given tasks without reporting a result. Unknown ids are
    /// ignored.
    fn abort_tasks(&mut self, tasks: Vec<TaskId>) -> BackendFuture<'_> {
        let _ = tasks;
        Box::pin(async { Ok(()) })
    }

    /// The scheduler moved these tasks to other nodes.
    fn relocate_tasks(&mut self, migrations: Vec<Migration>) -> BackendFuture<'_> {
        let _ = migrations;
        Box::pin(async { Ok(()) })
    }
}

/// Executor that plays each task out as a timer of its estimated duration
/// (scaled by `time_scale`) and then reports it completed.
///
/// Wraps the background loop from [`spawn_executor`]; every call just
/// forwards commands over an mpsc channel.
pub struct SimulatedExecutor {
    tx: mpsc::Sender<ExecutorCommand>,
}

impl SimulatedExecutor {
    /// Spawn the background executor loop, reporting to `runtime_tx`.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, time_scale: f64) -> Self {
        let tx = spawn_executor(runtime_tx, time_scale);
        Self { tx }
    }

    fn forward(&self, commands: Vec<ExecutorCommand>) -> BackendFuture<'static> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();
        Box::pin(async move {
            for command in commands {
                tx.send(command).await.map_err(Error::from)?;
            }
            Ok(())
        })
    }
}

impl ExecutorBackend for SimulatedExecutor {
    fn spawn_ready_tasks(&mut self, tasks: Vec<DispatchedTask>) -> BackendFuture<'_> {
        self.forward(tasks.into_iter().map(ExecutorCommand::Start).collect())
    }

    fn abort_tasks(&mut self, tasks: Vec<TaskId>) -> BackendFuture<'_> {
        self.forward(tasks.into_iter().map(ExecutorCommand::Abort).collect())
    }

    fn relocate_tasks(&mut self, migrations: Vec<Migration>) -> BackendFuture<'_> {
        self.forward(migrations.into_iter().map(ExecutorCommand::Relocate).collect())
    }
}
