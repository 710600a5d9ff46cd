// src/config/model.rs

use serde::Deserialize;

use crate::dag::edge::DependencyEdge;
use crate::dag::task_info::{DependencySpec, TaskSpec};
use crate::errors::{MemdagError, Result};
use crate::placement::ScoringWeights;
use crate::resource::{NodeCapacity, ResourceRequirements, DEFAULT_PROFILE_WINDOW};
use crate::types::{DependencyKind, NodeId, TaskId};

/// Workload file exactly as deserialized from TOML.
///
/// ```toml
/// [scheduler]
/// max_parallel_tasks = 2
/// memory_threshold = 0.8
///
/// [[node]]
/// id = 1
/// cpu_cores = 16
/// memory_gb = 64
///
/// [[task]]
/// id = 1
/// name = "extract"
/// memory_gb = 4
/// estimated_duration_ms = 2000
///
/// [[task]]
/// id = 2
/// memory_gb = 8
///
/// [[dependency]]
/// from = 1
/// to = 2
/// kind = "data"
/// data_size_gb = 2.5
/// ```
///
/// Nothing here has been checked yet. Convert it with
/// `ConfigFile::try_from(raw)` to get a validated [`ConfigFile`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub node: Vec<NodeConfig>,

    #[serde(default)]
    pub task: Vec<TaskConfig>,

    #[serde(default)]
    pub dependency: Vec<DependencyConfig>,
}

/// A validated workload: at least one node and task, unique ids, sane
/// scheduler settings and an acyclic dependency graph.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerConfig,
    pub node: Vec<NodeConfig>,
    pub task: Vec<TaskConfig>,
    pub dependency: Vec<DependencyConfig>,
}

impl ConfigFile {
    /// Only called from the `TryFrom<RawConfigFile>` impl after validation.
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            scheduler: raw.scheduler,
            node: raw.node,
            task: raw.task,
            dependency: raw.dependency,
        }
    }

    pub fn task_specs(&self) -> Vec<TaskSpec> {
        self.task.iter().map(TaskConfig::to_spec).collect()
    }

    pub fn dependency_specs(&self) -> Vec<DependencySpec> {
        self.dependency.iter().map(DependencyConfig::to_spec).collect()
    }
}

/// `[scheduler]` section, also the constructor argument of
/// [`DagScheduler`](crate::dag::DagScheduler).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_weight")]
    pub memory_weight: f64,

    #[serde(default = "default_weight")]
    pub cpu_weight: f64,

    #[serde(default = "default_weight")]
    pub network_weight: f64,

    /// Upper bound on tasks Running at once, independent of node capacity.
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,

    /// Cluster memory usage above which the pressure check looks for
    /// migrations. Also the per-node overload line.
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: f64,

    /// Minimum overall-score gain for a pressure-driven migration.
    #[serde(default = "default_migration_improvement_margin")]
    pub migration_improvement_margin: f64,

    #[serde(default = "default_true")]
    pub enable_dynamic_rescheduling: bool,

    /// Nodes scoring below this are never chosen.
    #[serde(default)]
    pub score_floor: f64,

    /// Number of samples kept per memory profile.
    #[serde(default = "default_profile_window")]
    pub profile_window: usize,
}

fn default_weight() -> f64 {
    1.0 / 3.0
}

fn default_max_parallel_tasks() -> usize {
    4
}

fn default_memory_threshold() -> f64 {
    0.85
}

fn default_migration_improvement_margin() -> f64 {
    0.1
}

fn default_true() -> bool {
    true
}

fn default_profile_window() -> usize {
    DEFAULT_PROFILE_WINDOW
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            memory_weight: default_weight(),
            cpu_weight: default_weight(),
            network_weight: default_weight(),
            max_parallel_tasks: default_max_parallel_tasks(),
            memory_threshold: default_memory_threshold(),
            migration_improvement_margin: default_migration_improvement_margin(),
            enable_dynamic_rescheduling: default_true(),
            score_floor: 0.0,
            profile_window: default_profile_window(),
        }
    }
}

impl SchedulerConfig {
    pub fn weights(&self) -> ScoringWeights {
        ScoringWeights {
            memory: self.memory_weight,
            cpu: self.cpu_weight,
            network: self.network_weight,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.weights().validate()?;

        if self.max_parallel_tasks == 0 {
            return Err(MemdagError::ValidationError(
                "max_parallel_tasks must be >= 1 (got 0)".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.memory_threshold) {
            return Err(MemdagError::ValidationError(format!(
                "memory_threshold must be within [0, 1] (got {})",
                self.memory_threshold
            )));
        }
        if !self.migration_improvement_margin.is_finite() || self.migration_improvement_margin < 0.0 {
            return Err(MemdagError::ValidationError(format!(
                "migration_improvement_margin must be >= 0 (got {})",
                self.migration_improvement_margin
            )));
        }
        if !self.score_floor.is_finite() {
            return Err(MemdagError::ValidationError(format!(
                "score_floor must be finite (got {})",
                self.score_floor
            )));
        }
        if self.profile_window == 0 {
            return Err(MemdagError::ValidationError(
                "profile_window must be >= 1 (got 0)".to_string(),
            ));
        }
        Ok(())
    }
}

/// `[[node]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    pub cpu_cores: f64,
    pub memory_gb: f64,

    #[serde(default = "default_node_disk_gb")]
    pub disk_gb: f64,

    #[serde(default = "default_node_network_mbps")]
    pub network_mbps: f64,

    /// Nodes may start out unhealthy and be brought in later.
    #[serde(default = "default_true")]
    pub healthy: bool,
}

fn default_node_disk_gb() -> f64 {
    500.0
}

fn default_node_network_mbps() -> f64 {
    1000.0
}

impl NodeConfig {
    pub fn capacity(&self) -> NodeCapacity {
        NodeCapacity {
            cpu_cores: self.cpu_cores,
            memory_gb: self.memory_gb,
            disk_gb: self.disk_gb,
            network_mbps: self.network_mbps,
        }
    }
}

/// `[[task]]` entry. Omitted requirements fall back to
/// [`ResourceRequirements::default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskConfig {
    pub id: TaskId,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub cpu_cores: Option<f64>,

    #[serde(default)]
    pub memory_gb: Option<f64>,

    #[serde(default)]
    pub disk_gb: Option<f64>,

    #[serde(default)]
    pub network_mbps: Option<f64>,

    #[serde(default)]
    pub estimated_duration_ms: Option<u64>,

    /// Initial execution priority; higher runs first within a depth level.
    #[serde(default)]
    pub priority: Option<f64>,
}

impl TaskConfig {
    pub fn requirements(&self) -> ResourceRequirements {
        let d = ResourceRequirements::default();
        ResourceRequirements {
            cpu_cores: self.cpu_cores.unwrap_or(d.cpu_cores),
            memory_gb: self.memory_gb.unwrap_or(d.memory_gb),
            disk_gb: self.disk_gb.unwrap_or(d.disk_gb),
            network_mbps: self.network_mbps.unwrap_or(d.network_mbps),
            estimated_duration_ms: self.estimated_duration_ms.unwrap_or(d.estimated_duration_ms),
        }
    }

    pub fn to_spec(&self) -> TaskSpec {
        TaskSpec {
            id: self.id,
            name: self.name.clone(),
            requirements: self.requirements(),
            priority: self.priority,
        }
    }
}

/// `[[dependency]]` entry: `to` waits for `from`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DependencyConfig {
    pub from: TaskId,
    pub to: TaskId,

    #[serde(default)]
    pub kind: DependencyKind,

    #[serde(default)]
    pub data_size_gb: f64,

    #[serde(default)]
    pub transfer_cost_ms: f64,

    #[serde(default)]
    pub memory_overlap_gb: f64,
}

impl DependencyConfig {
    pub fn edge(&self) -> DependencyEdge {
        DependencyEdge {
            kind: self.kind,
            data_size_gb: self.data_size_gb,
            transfer_cost_ms: self.transfer_cost_ms,
            memory_overlap_gb: self.memory_overlap_gb,
        }
    }

    pub fn to_spec(&self) -> DependencySpec {
        DependencySpec {
            from: self.from,
            to: self.to,
            edge: self.edge(),
        }
    }
}
