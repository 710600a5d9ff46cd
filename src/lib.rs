// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod placement;
pub mod resource;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::dag::{DagScheduler, TaskStatus};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::SimulatedExecutor;
use crate::resource::ResourceRegistry;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - workload loading
/// - resource registry / scheduler / runtime
/// - the simulated executor
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let path = args.config.clone().unwrap_or_else(default_config_path);
    info!(path = %path.display(), "loading workload");
    let cfg = load_and_validate(&path)?;
    let scheduler = build_scheduler(&cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, &scheduler)?;
        return Ok(());
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let executor = SimulatedExecutor::new(rt_tx.clone(), args.time_scale);

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let options = RuntimeOptions {
        exit_when_idle: true,
        tick_interval: args.tick_ms.map(Duration::from_millis),
    };

    let core = CoreRuntime::new(scheduler, options);
    let runtime = Runtime::new(core, rt_rx, executor);
    let core = runtime.run().await?;

    print_report(core.scheduler());
    Ok(())
}

/// Register the configured nodes and load the configured DAG.
pub fn build_scheduler(cfg: &ConfigFile) -> crate::errors::Result<DagScheduler> {
    let registry = Arc::new(ResourceRegistry::new(cfg.scheduler.profile_window));
    for node in &cfg.node {
        registry.add_node(node.id, node.capacity())?;
        if !node.healthy {
            registry.set_health(node.id, false)?;
        }
    }

    let mut scheduler = DagScheduler::new(cfg.scheduler.clone(), registry)?;
    scheduler.build_dag(&cfg.task_specs(), &cfg.dependency_specs())?;
    info!(
        nodes = cfg.node.len(),
        tasks = cfg.task.len(),
        dependencies = cfg.dependency.len(),
        "workload loaded"
    );
    Ok(scheduler)
}

fn join_ids<T: ToString>(ids: &[T], sep: &str) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(sep)
}

/// Dry-run output: the cluster, the tasks and what the analyzer thinks of
/// them.
fn print_dry_run(cfg: &ConfigFile, scheduler: &DagScheduler) -> Result<()> {
    let analyzer = scheduler.analyzer();
    let s = &cfg.scheduler;

    println!("memdag dry-run");
    println!(
        "  scheduler.weights = memory {:.3}, cpu {:.3}, network {:.3}",
        s.memory_weight, s.cpu_weight, s.network_weight
    );
    println!("  scheduler.max_parallel_tasks = {}", s.max_parallel_tasks);
    println!("  scheduler.memory_threshold = {}", s.memory_threshold);
    println!(
        "  scheduler.migration_improvement_margin = {}",
        s.migration_improvement_margin
    );
    println!(
        "  scheduler.enable_dynamic_rescheduling = {}",
        s.enable_dynamic_rescheduling
    );
    println!();

    println!("nodes ({}):", cfg.node.len());
    for node in &cfg.node {
        println!(
            "  - {}: {} cores, {} GB memory, {} Mbps{}",
            node.id,
            node.cpu_cores,
            node.memory_gb,
            node.network_mbps,
            if node.healthy { "" } else { " (unhealthy)" }
        );
    }
    println!();

    println!("tasks ({}):", cfg.task.len());
    for id in analyzer.topological_order()? {
        let Some(info) = scheduler.task_info(id) else {
            continue;
        };
        let metrics = scheduler.node_metrics(id)?;
        let req = &info.requirements;
        println!("  - {} ({})", id, info.display_name());
        println!(
            "      requires: {} cores, {} GB, {} ms",
            req.cpu_cores, req.memory_gb, req.estimated_duration_ms
        );
        if !info.predecessors.is_empty() {
            let after: Vec<String> = info
                .predecessors
                .iter()
                .map(|(p, kind)| format!("{p} ({kind})"))
                .collect();
            println!("      after: {}", after.join(", "));
        }
        println!(
            "      depth {}, height {}, memory pressure {:.3}, priority {}",
            metrics.depth, metrics.height, metrics.memory_pressure, metrics.execution_priority
        );
        if info.status == TaskStatus::Ready {
            println!("      ready at start");
        }
    }
    println!();

    println!("analysis:");
    println!("  {}", analyzer.description());
    println!("  critical path: {}", join_ids(&analyzer.critical_path()?, " -> "));
    println!(
        "  memory-critical path: {}",
        join_ids(&analyzer.memory_critical_path()?, " -> ")
    );
    println!(
        "  estimated peak memory: {:.2} GB",
        analyzer.estimate_peak_memory()?
    );
    let components = analyzer.connected_components();
    println!("  connected components: {}", components.len());
    let critical = scheduler.memory_critical_tasks(s.memory_threshold)?;
    if !critical.is_empty() {
        let listed: Vec<String> = critical
            .iter()
            .map(|(id, p)| format!("{id} ({p:.3})"))
            .collect();
        println!("  memory-critical tasks: {}", listed.join(", "));
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_report(scheduler: &DagScheduler) {
    println!("{}", scheduler.execution_status());
    for (task, blockers) in scheduler.blocked_tasks() {
        println!("  {task} blocked by {}", join_ids(&blockers, ", "));
    }
}
