// src/resource/registry.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{MemdagError, Result};
use crate::resource::node::{Node, NodeCapacity};
use crate::resource::profile::DEFAULT_PROFILE_WINDOW;
use crate::resource::requirements::ResourceRequirements;
use crate::types::NodeId;

/// Source of node health, queried once per scheduling cycle.
///
/// Implemented for any `Fn(NodeId) -> bool`, so tests and small embedders can
/// pass a closure.
pub trait HealthService: Send + Sync {
    fn is_healthy(&self, node: NodeId) -> bool;
}

impl<F> HealthService for F
where
    F: Fn(NodeId) -> bool + Send + Sync,
{
    fn is_healthy(&self, node: NodeId) -> bool {
        self(node)
    }
}

/// Point-in-time summary of the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ClusterMetrics {
    pub total_nodes: usize,
    pub healthy_nodes: usize,
    pub unhealthy_nodes: usize,
    /// Averages over healthy nodes only.
    pub average_cpu_usage: f64,
    pub average_memory_usage: f64,
}

/// Single owner of every node's live capacity numbers.
///
/// All other components refer to nodes by [`NodeId`] and go through the
/// registry. Every check-and-mutate happens under one lock, so two scheduling
/// cycles racing on the same node cannot over-commit it.
#[derive(Debug)]
pub struct ResourceRegistry {
    nodes: Mutex<BTreeMap<NodeId, Node>>,
    profile_window: usize,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PROFILE_WINDOW)
    }
}

impl ResourceRegistry {
    pub fn new(profile_window: usize) -> Self {
        Self {
            nodes: Mutex::new(BTreeMap::new()),
            profile_window,
        }
    }

    // Every mutation is a single step under the lock, so the map is still
    // consistent after a panic elsewhere.
    fn guard(&self) -> MutexGuard<'_, BTreeMap<NodeId, Node>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a node that joined the cluster.
    pub fn add_node(&self, id: NodeId, capacity: NodeCapacity) -> Result<()> {
        capacity.validate()?;
        let mut nodes = self.guard();
        if nodes.contains_key(&id) {
            return Err(MemdagError::ValidationError(format!(
                "node {id} is already registered"
            )));
        }
        nodes.insert(id, Node::new(id, capacity, self.profile_window));
        info!(node = %id, cpu = capacity.cpu_cores, memory_gb = capacity.memory_gb, "node joined");
        Ok(())
    }

    /// Remove an evicted node, returning its final state.
    pub fn remove_node(&self, id: NodeId) -> Result<Node> {
        let removed = self.guard().remove(&id).ok_or(MemdagError::NodeNotFound(id))?;
        info!(node = %id, "node evicted");
        Ok(removed)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.guard().contains_key(&id)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.guard().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Copy of a node's current state.
    pub fn snapshot(&self, id: NodeId) -> Result<Node> {
        self.guard()
            .get(&id)
            .cloned()
            .ok_or(MemdagError::NodeNotFound(id))
    }

    /// Copies of all nodes, ordered by id.
    pub fn snapshots(&self) -> Vec<Node> {
        self.guard().values().cloned().collect()
    }

    /// Reserve `req` on `id` if the node is healthy and both projected CPU and
    /// memory usage stay at or below 1.0. Returns `Ok(false)` without mutating
    /// anything otherwise.
    pub fn try_reserve(&self, id: NodeId, req: &ResourceRequirements) -> Result<bool> {
        req.validate()?;
        let mut nodes = self.guard();
        let node = nodes.get_mut(&id).ok_or(MemdagError::NodeNotFound(id))?;
        let accepted = node.reserve(req);
        if accepted {
            debug!(
                node = %id,
                cpu_usage = node.cpu_usage(),
                memory_usage = node.memory_usage(),
                "reservation committed"
            );
        } else {
            debug!(node = %id, healthy = node.is_healthy(), "reservation refused");
        }
        Ok(accepted)
    }

    /// Give back a reservation. Usage is clamped at zero.
    pub fn release(&self, id: NodeId, req: &ResourceRequirements) -> Result<()> {
        req.validate()?;
        let mut nodes = self.guard();
        let node = nodes.get_mut(&id).ok_or(MemdagError::NodeNotFound(id))?;
        node.release(req);
        debug!(
            node = %id,
            cpu_usage = node.cpu_usage(),
            memory_usage = node.memory_usage(),
            "reservation released"
        );
        Ok(())
    }

    /// Nodes for which [`try_reserve`](Self::try_reserve) would currently
    /// succeed. Read-only.
    pub fn available_nodes(&self, req: &ResourceRequirements) -> Result<BTreeSet<NodeId>> {
        req.validate()?;
        Ok(self
            .guard()
            .values()
            .filter(|n| n.can_accept(req))
            .map(Node::id)
            .collect())
    }

    pub fn set_health(&self, id: NodeId, healthy: bool) -> Result<()> {
        let mut nodes = self.guard();
        let node = nodes.get_mut(&id).ok_or(MemdagError::NodeNotFound(id))?;
        if node.is_healthy() != healthy {
            if healthy {
                info!(node = %id, "node marked healthy");
            } else {
                warn!(node = %id, "node marked unhealthy");
            }
        }
        node.set_healthy(healthy);
        Ok(())
    }

    /// Pull the current health of every node from an external service.
    pub fn refresh_health(&self, service: &dyn HealthService) {
        let mut nodes = self.guard();
        for node in nodes.values_mut() {
            let healthy = service.is_healthy(node.id());
            if node.is_healthy() != healthy {
                debug!(node = %node.id(), healthy, "health changed on refresh");
            }
            node.set_healthy(healthy);
        }
    }

    /// Largest memory capacity of any registered node, in GB.
    pub fn largest_memory_gb(&self) -> f64 {
        self.guard()
            .values()
            .map(|n| n.capacity().memory_gb)
            .fold(0.0, f64::max)
    }

    /// Mean memory usage across healthy nodes; 0 when there are none.
    pub fn cluster_memory_pressure(&self) -> f64 {
        self.metrics().average_memory_usage
    }

    pub fn metrics(&self) -> ClusterMetrics {
        let nodes = self.guard();
        let mut metrics = ClusterMetrics {
            total_nodes: nodes.len(),
            ..ClusterMetrics::default()
        };

        let mut cpu = 0.0;
        let mut memory = 0.0;
        for node in nodes.values() {
            if node.is_healthy() {
                metrics.healthy_nodes += 1;
                cpu += node.cpu_usage();
                memory += node.memory_usage();
            } else {
                metrics.unhealthy_nodes += 1;
            }
        }

        if metrics.healthy_nodes > 0 {
            metrics.average_cpu_usage = cpu / metrics.healthy_nodes as f64;
            metrics.average_memory_usage = memory / metrics.healthy_nodes as f64;
        }
        metrics
    }
}
