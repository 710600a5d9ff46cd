// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::dag::{DispatchedTask, Migration};
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::types::TaskId;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RuntimeEvent, SchedulerEvent};

/// Drives the DAG scheduler in response to `RuntimeEvent`s, and delegates
/// task execution to an `ExecutorBackend`.
///
/// This is an IO shell around `CoreRuntime`, which holds all the runtime
/// semantics. It reads events (plus an optional periodic tick), forwards the
/// core's commands to the executor and publishes scheduler events to an
/// optional subscriber.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    subscriber: Option<mpsc::Sender<SchedulerEvent>>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            subscriber: None,
        }
    }

    /// Publish every [`SchedulerEvent`] on `tx`.
    pub fn with_event_subscriber(mut self, tx: mpsc::Sender<SchedulerEvent>) -> Self {
        self.subscriber = Some(tx);
        self
    }

    /// Main event loop.
    ///
    /// - Runs an initial scheduling cycle.
    /// - Consumes `RuntimeEvent`s from `event_rx` and ticks from the timer.
    /// - Feeds them into the core runtime.
    /// - Executes the commands the core returns.
    ///
    /// Returns the core so callers can inspect the final scheduler state.
    pub async fn run(mut self) -> Result<CoreRuntime> {
        info!("memdag runtime started");

        let first = self.core.start();
        if !self.apply(first).await? {
            info!("runtime exiting after initial cycle");
            return Ok(self.core);
        }

        let mut ticker = self.core.options().tick_interval.map(|period| {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let event = tokio::select! {
                received = self.event_rx.recv() => match received {
                    Some(e) => e,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
                _ = next_tick(&mut ticker) => RuntimeEvent::Tick,
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            if !self.apply(step).await? {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!(status = %self.core.scheduler().execution_status(), "runtime exiting");
        Ok(self.core)
    }

    /// Publish events and execute commands of one core step. Returns
    /// `keep_running`.
    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        self.publish(step.events).await;
        for command in step.commands {
            self.execute_command(command).await?;
        }
        Ok(step.keep_running)
    }

    async fn publish(&mut self, events: Vec<SchedulerEvent>) {
        let Some(tx) = &self.subscriber else {
            return;
        };
        for event in events {
            if tx.send(event).await.is_err() {
                debug!("scheduler event subscriber dropped; no longer publishing");
                self.subscriber = None;
                return;
            }
        }
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::AbortTasks(tasks) => self.abort(tasks).await?,
            CoreCommand::RelocateTasks(migrations) => self.relocate(migrations).await?,
            CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await?,
            CoreCommand::RequestExit => {
                // keep_running is already false in this case; logged only.
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<DispatchedTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        let placements: Vec<_> = tasks.iter().map(|t| (t.task, t.node)).collect();
        debug!(?placements, "dispatching tasks");
        self.executor.spawn_ready_tasks(tasks).await
    }

    async fn abort(&mut self, tasks: Vec<TaskId>) -> Result<()> {
        debug!(?tasks, "aborting tasks");
        self.executor.abort_tasks(tasks).await
    }

    async fn relocate(&mut self, migrations: Vec<Migration>) -> Result<()> {
        debug!(count = migrations.len(), "relocating tasks");
        self.executor.relocate_tasks(migrations).await
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
