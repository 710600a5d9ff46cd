use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use memdag::dag::DispatchedTask;
use memdag::engine::RuntimeEvent;
use memdag::exec::backend::{BackendFuture, ExecutorBackend};
use memdag::types::TaskId;

/// A fake executor that:
/// - records which tasks were dispatched (and to which node)
/// - immediately reports TaskCompleted for each one, or TaskFailed for ids
///   listed in `failing`
/// - records aborts.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<DispatchedTask>>>,
    aborted: Arc<Mutex<Vec<TaskId>>>,
    failing: HashSet<TaskId>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<DispatchedTask>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            aborted: Arc::new(Mutex::new(Vec::new())),
            failing: HashSet::new(),
        }
    }

    /// Report these tasks as failed instead of completed.
    pub fn failing(mut self, tasks: impl IntoIterator<Item = u32>) -> Self {
        self.failing.extend(tasks.into_iter().map(TaskId));
        self
    }

    pub fn aborted(&self) -> Arc<Mutex<Vec<TaskId>>> {
        Arc::clone(&self.aborted)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(&mut self, tasks: Vec<DispatchedTask>) -> BackendFuture<'_> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();

        Box::pin(async move {
            for t in tasks {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(t.clone());
                }

                let event = if failing.contains(&t.task) {
                    RuntimeEvent::TaskFailed {
                        task: t.task,
                        attempt: t.attempt,
                        reason: "fake failure".to_string(),
                    }
                } else {
                    RuntimeEvent::TaskCompleted {
                        task: t.task,
                        attempt: t.attempt,
                    }
                };
                tx.send(event).await.map_err(memdag::errors::Error::from)?;
            }
            Ok(())
        })
    }

    fn abort_tasks(&mut self, tasks: Vec<TaskId>) -> BackendFuture<'_> {
        self.aborted.lock().unwrap().extend(tasks);
        Box::pin(async { Ok(()) })
    }
}
