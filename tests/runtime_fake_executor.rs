// tests/runtime_fake_executor.rs

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use memdag::dag::{DagScheduler, SchedulerEvent, TaskStatus};
use memdag::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use memdag::exec::SimulatedExecutor;
use memdag::types::TaskId;
use memdag_test_utils::builders::{NodeSpecBuilder, TaskSpecBuilder, WorkloadBuilder};
use memdag_test_utils::{init_tracing, with_timeout, FakeExecutor};

type TestResult = Result<(), Box<dyn Error>>;

fn t(id: u32) -> TaskId {
    TaskId(id)
}

/// T1 -> {T2, T3} -> T4 on one roomy node.
fn diamond() -> DagScheduler {
    WorkloadBuilder::new()
        .with_node(NodeSpecBuilder::new(1, 16.0, 64.0).build())
        .with_task(TaskSpecBuilder::new(1).build())
        .with_task(TaskSpecBuilder::new(2).build())
        .with_task(TaskSpecBuilder::new(3).build())
        .with_task(TaskSpecBuilder::new(4).build())
        .with_dependency(1, 2)
        .with_dependency(1, 3)
        .with_dependency(2, 4)
        .with_dependency(3, 4)
        .build_scheduler()
}

fn idle_exit() -> RuntimeOptions {
    RuntimeOptions {
        exit_when_idle: true,
        tick_interval: None,
    }
}

#[tokio::test]
async fn runtime_with_fake_executor_runs_diamond() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());

    let core = CoreRuntime::new(diamond(), idle_exit());
    let core = with_timeout(Runtime::new(core, rt_rx, executor).run()).await?;

    let order: Vec<TaskId> = executed.lock().unwrap().iter().map(|d| d.task).collect();
    assert_eq!(order, vec![t(1), t(2), t(3), t(4)]);
    assert_eq!(core.scheduler().execution_progress(), 1.0);
    assert!(!core.scheduler().has_work_in_flight());
    Ok(())
}

#[tokio::test]
async fn failed_task_blocks_its_branch_only() -> TestResult {
    init_tracing();

    let scheduler = WorkloadBuilder::new()
        .with_node(NodeSpecBuilder::new(1, 16.0, 64.0).build())
        .with_task(TaskSpecBuilder::new(1).build())
        .with_task(TaskSpecBuilder::new(2).build())
        .with_task(TaskSpecBuilder::new(3).build())
        .with_dependency(1, 2)
        .build_scheduler();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone()).failing([1]);

    let core = CoreRuntime::new(scheduler, idle_exit());
    let core = with_timeout(Runtime::new(core, rt_rx, executor).run()).await?;

    let s = core.scheduler();
    assert_eq!(s.status_of(t(1)), Some(TaskStatus::Failed));
    assert_eq!(s.status_of(t(2)), Some(TaskStatus::Blocked));
    assert_eq!(s.status_of(t(3)), Some(TaskStatus::Completed));

    let order: Vec<TaskId> = executed.lock().unwrap().iter().map(|d| d.task).collect();
    assert_eq!(order, vec![t(1), t(3)]);
    Ok(())
}

#[tokio::test]
async fn subscriber_sees_every_completion() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let (ev_tx, mut ev_rx) = mpsc::channel::<SchedulerEvent>(256);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed);

    let core = CoreRuntime::new(diamond(), idle_exit());
    let runtime = Runtime::new(core, rt_rx, executor).with_event_subscriber(ev_tx);
    with_timeout(runtime.run()).await?;

    let mut completed = Vec::new();
    let mut decisions = 0;
    while let Ok(event) = ev_rx.try_recv() {
        match event {
            SchedulerEvent::StatusChanged {
                task,
                new: TaskStatus::Completed,
                ..
            } => completed.push(task),
            SchedulerEvent::Decision(_) => decisions += 1,
            _ => {}
        }
    }
    assert_eq!(completed, vec![t(1), t(2), t(3), t(4)]);
    assert_eq!(decisions, 4);
    Ok(())
}

#[tokio::test]
async fn shutdown_request_stops_the_loop() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());

    // Queued before T1's completion report.
    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;

    let core = CoreRuntime::new(diamond(), RuntimeOptions::default());
    let core = with_timeout(Runtime::new(core, rt_rx, executor).run()).await?;

    assert_eq!(executed.lock().unwrap().len(), 1);
    assert_eq!(core.scheduler().status_of(t(1)), Some(TaskStatus::Running));
    Ok(())
}

#[tokio::test]
async fn periodic_ticks_do_not_disturb_a_run() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());

    let options = RuntimeOptions {
        exit_when_idle: true,
        tick_interval: Some(Duration::from_millis(5)),
    };
    let core = CoreRuntime::new(diamond(), options);
    let core = with_timeout(Runtime::new(core, rt_rx, executor).run()).await?;

    assert_eq!(executed.lock().unwrap().len(), 4);
    assert!(core.scheduler().is_settled());
    Ok(())
}

#[tokio::test]
async fn simulated_executor_completes_instantly_at_zero_scale() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = SimulatedExecutor::new(rt_tx.clone(), 0.0);

    let core = CoreRuntime::new(diamond(), idle_exit());
    let core = with_timeout(Runtime::new(core, rt_rx, executor).run()).await?;

    assert_eq!(core.scheduler().report().completed, 4);
    Ok(())
}

#[tokio::test]
async fn cancelled_simulated_task_is_aborted() -> TestResult {
    init_tracing();

    let scheduler = WorkloadBuilder::new()
        .with_node(NodeSpecBuilder::new(1, 8.0, 16.0).build())
        .with_task(TaskSpecBuilder::new(1).duration_ms(60_000).build())
        .build_scheduler();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = SimulatedExecutor::new(rt_tx.clone(), 1.0);
    rt_tx.send(RuntimeEvent::TaskCancelled { task: t(1) }).await?;

    let core = CoreRuntime::new(scheduler, idle_exit());
    let core = with_timeout(Runtime::new(core, rt_rx, executor).run()).await?;

    assert_eq!(core.scheduler().status_of(t(1)), Some(TaskStatus::Cancelled));
    assert_eq!(
        core.scheduler()
            .registry()
            .snapshot(memdag::types::NodeId(1))?
            .memory_usage(),
        0.0
    );
    Ok(())
}
