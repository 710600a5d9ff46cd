#![allow(dead_code)]

use memdag::config::{
    ConfigFile, DependencyConfig, NodeConfig, RawConfigFile, SchedulerConfig, TaskConfig,
};
use memdag::dag::{DagScheduler, TaskSpec};
use memdag::types::{DependencyKind, NodeId, TaskId};

/// Builder for a whole workload (`ConfigFile`) to simplify test setup.
pub struct WorkloadBuilder {
    config: RawConfigFile,
}

impl WorkloadBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.config.scheduler = scheduler;
        self
    }

    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.config.node.push(node);
        self
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.config.task.push(task);
        self
    }

    /// Plain data dependency `to` after `from`.
    pub fn with_dependency(mut self, from: u32, to: u32) -> Self {
        self.config.dependency.push(DependencyBuilder::new(from, to).build());
        self
    }

    pub fn with_edge(mut self, dep: DependencyConfig) -> Self {
        self.config.dependency.push(dep);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Registry with the configured nodes plus a scheduler with the DAG loaded.
    pub fn build_scheduler(self) -> DagScheduler {
        let cfg = self.build();
        memdag::build_scheduler(&cfg).expect("Failed to build scheduler from builder")
    }
}

impl Default for WorkloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `NodeConfig`.
pub struct NodeSpecBuilder {
    node: NodeConfig,
}

impl NodeSpecBuilder {
    pub fn new(id: u32, cpu_cores: f64, memory_gb: f64) -> Self {
        Self {
            node: NodeConfig {
                id: NodeId(id),
                cpu_cores,
                memory_gb,
                disk_gb: 500.0,
                network_mbps: 1000.0,
                healthy: true,
            },
        }
    }

    pub fn network_mbps(mut self, mbps: f64) -> Self {
        self.node.network_mbps = mbps;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.node.healthy = false;
        self
    }

    pub fn build(self) -> NodeConfig {
        self.node
    }
}

/// Builder for `TaskConfig`.
pub struct TaskSpecBuilder {
    task: TaskConfig,
}

impl TaskSpecBuilder {
    pub fn new(id: u32) -> Self {
        Self {
            task: TaskConfig {
                id: TaskId(id),
                name: None,
                cpu_cores: None,
                memory_gb: None,
                disk_gb: None,
                network_mbps: None,
                estimated_duration_ms: None,
                priority: None,
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = Some(name.to_string());
        self
    }

    pub fn cpu(mut self, cores: f64) -> Self {
        self.task.cpu_cores = Some(cores);
        self
    }

    pub fn memory(mut self, gb: f64) -> Self {
        self.task.memory_gb = Some(gb);
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.task.estimated_duration_ms = Some(ms);
        self
    }

    pub fn priority(mut self, priority: f64) -> Self {
        self.task.priority = Some(priority);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }

    pub fn spec(self) -> TaskSpec {
        self.task.to_spec()
    }
}

/// Builder for `DependencyConfig`.
pub struct DependencyBuilder {
    dep: DependencyConfig,
}

impl DependencyBuilder {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            dep: DependencyConfig {
                from: TaskId(from),
                to: TaskId(to),
                kind: DependencyKind::Data,
                data_size_gb: 0.0,
                transfer_cost_ms: 0.0,
                memory_overlap_gb: 0.0,
            },
        }
    }

    pub fn kind(mut self, kind: DependencyKind) -> Self {
        self.dep.kind = kind;
        self
    }

    pub fn data(mut self, size_gb: f64, transfer_cost_ms: f64) -> Self {
        self.dep.data_size_gb = size_gb;
        self.dep.transfer_cost_ms = transfer_cost_ms;
        self
    }

    pub fn overlap(mut self, gb: f64) -> Self {
        self.dep.memory_overlap_gb = gb;
        self
    }

    pub fn build(self) -> DependencyConfig {
        self.dep
    }
}
