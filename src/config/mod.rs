// src/config/mod.rs

//! Workload configuration for memdag.
//!
//! - `model.rs`: the TOML-backed data model and `SchedulerConfig`.
//! - `loader.rs`: reading a workload file from disk.
//! - `validate.rs`: ids, bounds and DAG acyclicity checks.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str, CONFIG_ENV};
pub use model::{
    ConfigFile, DependencyConfig, NodeConfig, RawConfigFile, SchedulerConfig, TaskConfig,
};
pub use validate::validate_config;
