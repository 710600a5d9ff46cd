// src/config/loader.rs

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable naming the workload file when `--config` is absent.
pub const CONFIG_ENV: &str = "MEMDAG_CONFIG";

/// Read a workload file into a `RawConfigFile`.
///
/// Only TOML deserialization happens here. Use [`load_and_validate`] for the
/// semantic checks (unique ids, weights, DAG acyclicity).
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading workload file");
    let contents = fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Parse workload TOML that is already in memory.
pub fn load_from_str(contents: &str) -> Result<RawConfigFile> {
    Ok(toml::from_str(contents)?)
}

/// Load a workload file and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw)?;
    debug!(
        nodes = config.node.len(),
        tasks = config.task.len(),
        dependencies = config.dependency.len(),
        "workload validated"
    );
    Ok(config)
}

/// `$MEMDAG_CONFIG` if set, otherwise `Cluster.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Cluster.toml"))
}
