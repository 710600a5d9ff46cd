// src/config/validate.rs

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{MemdagError, Result};
use crate::types::TaskId;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = MemdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Run every check `ConfigFile::try_from` runs, without consuming the input.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_nodes_and_tasks(cfg)?;
    validate_scheduler(cfg)?;
    validate_nodes(cfg)?;
    validate_tasks(cfg)?;
    validate_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_nodes_and_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.node.is_empty() {
        return Err(MemdagError::ConfigError(
            "config must contain at least one [[node]] entry".to_string(),
        ));
    }
    if cfg.task.is_empty() {
        return Err(MemdagError::ConfigError(
            "config must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler(cfg: &RawConfigFile) -> Result<()> {
    cfg.scheduler
        .validate()
        .map_err(|e| MemdagError::ConfigError(format!("[scheduler]: {e}")))
}

fn validate_nodes(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = BTreeSet::new();
    for node in &cfg.node {
        if !seen.insert(node.id) {
            return Err(MemdagError::ConfigError(format!(
                "node {} is defined more than once",
                node.id
            )));
        }
        node.capacity()
            .validate()
            .map_err(|e| MemdagError::ConfigError(format!("node {}: {e}", node.id)))?;
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = BTreeSet::new();
    for task in &cfg.task {
        if !seen.insert(task.id) {
            return Err(MemdagError::ConfigError(format!(
                "task {} is defined more than once",
                task.id
            )));
        }
        task.requirements()
            .validate()
            .map_err(|e| MemdagError::ConfigError(format!("task {}: {e}", task.id)))?;
        if let Some(priority) = task.priority {
            if !priority.is_finite() {
                return Err(MemdagError::ConfigError(format!(
                    "task {}: priority must be finite (got {priority})",
                    task.id
                )));
            }
        }
    }
    Ok(())
}

fn validate_dependencies(cfg: &RawConfigFile) -> Result<()> {
    let ids: BTreeSet<TaskId> = cfg.task.iter().map(|t| t.id).collect();
    for dep in &cfg.dependency {
        for endpoint in [dep.from, dep.to] {
            if !ids.contains(&endpoint) {
                return Err(MemdagError::ConfigError(format!(
                    "dependency {} -> {} references unknown task {}",
                    dep.from, dep.to, endpoint
                )));
            }
        }
        if dep.from == dep.to {
            return Err(MemdagError::ConfigError(format!(
                "task {} cannot depend on itself",
                dep.from
            )));
        }
        dep.edge().validate().map_err(|e| {
            MemdagError::ConfigError(format!("dependency {} -> {}: {e}", dep.from, dep.to))
        })?;
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: from -> to, i.e. predecessor -> dependent.
    let mut graph: DiGraphMap<TaskId, ()> = DiGraphMap::new();

    for task in &cfg.task {
        graph.add_node(task.id);
    }
    for dep in &cfg.dependency {
        graph.add_edge(dep.from, dep.to, ());
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(MemdagError::CycleDetected(format!(
            "cycle detected in task DAG involving task {}",
            cycle.node_id()
        ))),
    }
}
