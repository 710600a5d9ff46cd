// src/exec/executor_loop.rs

//! Background loop that tracks the tasks currently being executed.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dag::{DispatchedTask, Migration};
use crate::engine::RuntimeEvent;
use crate::exec::task_runner::run_task;
use crate::types::{NodeId, TaskId};

/// Instruction for the executor loop.
#[derive(Debug, Clone)]
pub enum ExecutorCommand {
    Start(DispatchedTask),
    Abort(TaskId),
    Relocate(Migration),
}

/// Internal handle for a task being executed.
///
/// - `cancel` stops the runner without a completion report.
/// - `handle` is the Tokio task driving it.
struct ActiveTask {
    node: NodeId,
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// The returned sender is what `SimulatedExecutor` forwards to. Each started
/// task runs in its own Tokio task, and there is never more than one runner
/// per task id.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    time_scale: f64,
) -> mpsc::Sender<ExecutorCommand> {
    let (tx, mut rx) = mpsc::channel::<ExecutorCommand>(32);

    tokio::spawn(async move {
        info!(time_scale, "executor loop started");

        let mut active: HashMap<TaskId, ActiveTask> = HashMap::new();

        while let Some(command) = rx.recv().await {
            active.retain(|_, t| !t.handle.is_finished());
            match command {
                ExecutorCommand::Start(task) => {
                    start_task(task, &mut active, &runtime_tx, time_scale);
                }
                ExecutorCommand::Abort(task) => abort_task(task, &mut active),
                ExecutorCommand::Relocate(migration) => relocate_task(migration, &mut active),
            }
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

fn start_task(
    task: DispatchedTask,
    active: &mut HashMap<TaskId, ActiveTask>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    time_scale: f64,
) {
    let id = task.task;
    if active.contains_key(&id) {
        warn!(task = %id, "task already executing; ignoring duplicate start");
        return;
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let rt_tx = runtime_tx.clone();
    let node = task.node;

    let handle = tokio::spawn(async move {
        run_task(task, time_scale, rt_tx, cancel_rx).await;
        debug!(task = %id, "task runner future finished");
    });

    active.insert(
        id,
        ActiveTask {
            node,
            cancel: Some(cancel_tx),
            handle,
        },
    );
}

fn abort_task(task: TaskId, active: &mut HashMap<TaskId, ActiveTask>) {
    let Some(mut existing) = active.remove(&task) else {
        debug!(task = %task, "abort for task that is not executing");
        return;
    };
    info!(task = %task, node = %existing.node, "aborting task");

    if let Some(cancel) = existing.cancel.take() {
        if cancel.send(()).is_err() {
            debug!(task = %task, "runner already finished while aborting");
        }
    }
}

fn relocate_task(migration: Migration, active: &mut HashMap<TaskId, ActiveTask>) {
    match active.get_mut(&migration.task) {
        Some(existing) => {
            info!(
                task = %migration.task,
                from = %migration.from,
                to = %migration.to,
                "task now accounted to new node"
            );
            existing.node = migration.to;
        }
        None => debug!(task = %migration.task, "relocation for task not yet executing"),
    }
}
