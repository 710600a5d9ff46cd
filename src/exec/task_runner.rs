// src/exec/task_runner.rs

//! Single task runner.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dag::DispatchedTask;
use crate::engine::RuntimeEvent;

/// How long the simulated run of `task` lasts. Saturates at
/// `Duration::MAX` for scales too large to represent.
pub fn simulated_duration(task: &DispatchedTask, time_scale: f64) -> Duration {
    let scale = if time_scale.is_finite() && time_scale >= 0.0 {
        time_scale
    } else {
        1.0
    };
    let secs = task.requirements.estimated_duration_ms as f64 * scale / 1000.0;
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Play out one task and report `TaskCompleted`.
///
/// If the cancel channel fires first (eviction, cancellation), nothing is
/// reported: the scheduler already decided what happens to the task.
pub async fn run_task(
    task: DispatchedTask,
    time_scale: f64,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let duration = simulated_duration(&task, time_scale);
    info!(
        task = %task.task,
        node = %task.node,
        duration_ms = duration.as_millis() as u64,
        "starting task"
    );

    tokio::select! {
        _ = tokio::time::sleep(duration) => {
            debug!(task = %task.task, "task finished");
            if runtime_tx
                .send(RuntimeEvent::TaskCompleted {
                    task: task.task,
                    attempt: task.attempt,
                })
                .await
                .is_err()
            {
                warn!(task = %task.task, "runtime gone; completion not delivered");
            }
        }
        _ = cancel_rx => {
            debug!(task = %task.task, "task aborted before finishing");
        }
    }
}
