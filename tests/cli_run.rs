// tests/cli_run.rs

use std::error::Error;
use std::fs;

use clap::Parser;

use memdag::cli::{CliArgs, LogLevel};
use memdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

const WORKLOAD: &str = r#"
[scheduler]
max_parallel_tasks = 2

[[node]]
id = 1
cpu_cores = 8
memory_gb = 16

[[task]]
id = 1
name = "load"
estimated_duration_ms = 50

[[task]]
id = 2
name = "transform"
memory_gb = 4
estimated_duration_ms = 50

[[dependency]]
from = 1
to = 2
data_size_gb = 1
"#;

#[test]
fn defaults_match_documented_behaviour() {
    let args = CliArgs::try_parse_from(["memdag"]).unwrap();
    assert!(args.config.is_none());
    assert!(!args.dry_run);
    assert_eq!(args.time_scale, 1.0);
    assert!(args.tick_ms.is_none());
    assert!(args.log_level.is_none());

    let args = CliArgs::try_parse_from([
        "memdag",
        "--log-level",
        "debug",
        "--time-scale",
        "0",
        "--tick-ms",
        "250",
    ])
    .unwrap();
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    assert_eq!(args.time_scale, 0.0);
    assert_eq!(args.tick_ms, Some(250));
}

#[tokio::test]
async fn dry_run_validates_without_scheduling() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Cluster.toml");
    fs::write(&path, WORKLOAD)?;

    let args = CliArgs::try_parse_from([
        "memdag",
        "--config",
        path.to_str().unwrap(),
        "--dry-run",
    ])?;
    with_timeout(memdag::run(args)).await?;
    Ok(())
}

#[tokio::test]
async fn full_run_finishes_the_workload() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Cluster.toml");
    fs::write(&path, WORKLOAD)?;

    let args = CliArgs::try_parse_from([
        "memdag",
        "--config",
        path.to_str().unwrap(),
        "--time-scale",
        "0",
    ])?;
    with_timeout(memdag::run(args)).await?;
    Ok(())
}

#[tokio::test]
async fn invalid_workload_is_reported() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Cluster.toml");
    fs::write(&path, "[[task]]\nid = 1\n").unwrap();

    let args = CliArgs::try_parse_from(["memdag", "--config", path.to_str().unwrap()]).unwrap();
    let err = memdag::run(args).await.unwrap_err();
    assert!(err.to_string().contains("node"));
}
