// src/resource/requirements.rs

use serde::{Deserialize, Serialize};

use crate::errors::{MemdagError, Result};

/// Resources a task needs while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub cpu_cores: f64,
    pub memory_gb: f64,
    pub disk_gb: f64,
    pub network_mbps: f64,
    pub estimated_duration_ms: u64,
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self {
            cpu_cores: 1.0,
            memory_gb: 1.0,
            disk_gb: 1.0,
            network_mbps: 10.0,
            estimated_duration_ms: 1000,
        }
    }
}

impl ResourceRequirements {
    pub fn new(cpu_cores: f64, memory_gb: f64) -> Self {
        Self {
            cpu_cores,
            memory_gb,
            ..Self::default()
        }
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.estimated_duration_ms = ms;
        self
    }

    /// Reject zero, negative and non-finite values.
    pub fn validate(&self) -> Result<()> {
        positive("cpu_cores", self.cpu_cores)?;
        positive("memory_gb", self.memory_gb)?;
        positive("disk_gb", self.disk_gb)?;
        positive("network_mbps", self.network_mbps)?;
        if self.estimated_duration_ms == 0 {
            return Err(MemdagError::ValidationError(
                "estimated_duration_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Requested CPU in millicores, rounded up.
    pub(crate) fn cpu_millicores(&self) -> u64 {
        (self.cpu_cores * 1000.0).ceil() as u64
    }

    /// Requested memory in MiB, rounded up.
    pub(crate) fn memory_mib(&self) -> u64 {
        (self.memory_gb * 1024.0).ceil() as u64
    }
}

pub(crate) fn positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(MemdagError::ValidationError(format!(
            "{field} must be a positive finite number (got {value})"
        )));
    }
    Ok(())
}
