// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `memdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "memdag",
    version,
    about = "Schedule a task DAG across a cluster with memory-aware placement.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workload file (TOML).
    ///
    /// Default: `$MEMDAG_CONFIG`, else `Cluster.toml` in the current working
    /// directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MEMDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the DAG analysis, but don't schedule anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Multiplier applied to each task's estimated duration when simulating
    /// execution. `0` completes tasks immediately.
    #[arg(long, value_name = "FACTOR", default_value_t = 1.0)]
    pub time_scale: f64,

    /// Run a scheduling cycle every this many milliseconds even without
    /// events.
    #[arg(long, value_name = "MS")]
    pub tick_ms: Option<u64>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
