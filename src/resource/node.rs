// src/resource/node.rs

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::resource::profile::MemoryProfile;
use crate::resource::requirements::{positive, ResourceRequirements};
use crate::types::NodeId;

/// Static capacity of a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeCapacity {
    pub cpu_cores: f64,
    pub memory_gb: f64,
    pub disk_gb: f64,
    pub network_mbps: f64,
}

impl NodeCapacity {
    pub fn new(cpu_cores: f64, memory_gb: f64) -> Self {
        Self {
            cpu_cores,
            memory_gb,
            disk_gb: 500.0,
            network_mbps: 1000.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        positive("node cpu_cores", self.cpu_cores)?;
        positive("node memory_gb", self.memory_gb)?;
        positive("node disk_gb", self.disk_gb)?;
        positive("node network_mbps", self.network_mbps)?;
        Ok(())
    }

    fn cpu_millicores(&self) -> u64 {
        (self.cpu_cores * 1000.0).floor() as u64
    }

    fn memory_mib(&self) -> u64 {
        (self.memory_gb * 1024.0).floor() as u64
    }
}

/// Live accounting for one node.
///
/// Reservations are tracked in integer units (millicores and MiB) so that a
/// reserve followed by a release of the same requirements restores usage
/// exactly. Usage fractions are derived from those units.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    capacity: NodeCapacity,
    cpu_capacity_mc: u64,
    memory_capacity_mib: u64,
    reserved_cpu_mc: u64,
    reserved_memory_mib: u64,
    healthy: bool,
    memory_profile: MemoryProfile,
}

impl Node {
    pub fn new(id: NodeId, capacity: NodeCapacity, profile_window: usize) -> Self {
        Self {
            id,
            capacity,
            cpu_capacity_mc: capacity.cpu_millicores(),
            memory_capacity_mib: capacity.memory_mib(),
            reserved_cpu_mc: 0,
            reserved_memory_mib: 0,
            healthy: true,
            memory_profile: MemoryProfile::new(profile_window),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn capacity(&self) -> &NodeCapacity {
        &self.capacity
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub(crate) fn set_healthy(&mut self, healthy: bool) {
        self.healthy = healthy;
    }

    pub fn memory_profile(&self) -> &MemoryProfile {
        &self.memory_profile
    }

    pub fn cpu_usage(&self) -> f64 {
        ratio(self.reserved_cpu_mc, self.cpu_capacity_mc)
    }

    pub fn memory_usage(&self) -> f64 {
        ratio(self.reserved_memory_mib, self.memory_capacity_mib)
    }

    pub fn reserved_memory_gb(&self) -> f64 {
        self.reserved_memory_mib as f64 / 1024.0
    }

    /// CPU usage this node would have after also hosting `req`.
    pub fn projected_cpu_usage(&self, req: &ResourceRequirements) -> f64 {
        ratio(
            self.reserved_cpu_mc.saturating_add(req.cpu_millicores()),
            self.cpu_capacity_mc,
        )
    }

    /// Memory usage this node would have after also hosting `req`.
    pub fn projected_memory_usage(&self, req: &ResourceRequirements) -> f64 {
        ratio(
            self.reserved_memory_mib.saturating_add(req.memory_mib()),
            self.memory_capacity_mib,
        )
    }

    /// Whether a reservation of `req` would currently succeed. Requests too
    /// large to count are refused.
    pub fn can_accept(&self, req: &ResourceRequirements) -> bool {
        let fits = |reserved: u64, wanted: u64, capacity: u64| {
            reserved.checked_add(wanted).is_some_and(|total| total <= capacity)
        };
        self.healthy
            && fits(self.reserved_cpu_mc, req.cpu_millicores(), self.cpu_capacity_mc)
            && fits(self.reserved_memory_mib, req.memory_mib(), self.memory_capacity_mib)
    }

    pub(crate) fn reserve(&mut self, req: &ResourceRequirements) -> bool {
        if !self.can_accept(req) {
            return false;
        }
        self.reserved_cpu_mc = self.reserved_cpu_mc.saturating_add(req.cpu_millicores());
        self.reserved_memory_mib = self.reserved_memory_mib.saturating_add(req.memory_mib());
        self.memory_profile.record(self.reserved_memory_gb());
        true
    }

    /// Clamped at zero so a double release cannot underflow.
    pub(crate) fn release(&mut self, req: &ResourceRequirements) {
        self.reserved_cpu_mc = self.reserved_cpu_mc.saturating_sub(req.cpu_millicores());
        self.reserved_memory_mib = self
            .reserved_memory_mib
            .saturating_sub(req.memory_mib());
        self.memory_profile.record(self.reserved_memory_gb());
    }
}

fn ratio(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    used as f64 / total as f64
}
