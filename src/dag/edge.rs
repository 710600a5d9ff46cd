// src/dag/edge.rs

use serde::{Deserialize, Serialize};

use crate::errors::{MemdagError, Result};
use crate::types::DependencyKind;

/// Attributes of a `from -> to` dependency.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub kind: DependencyKind,
    /// Data handed from `from` to `to`, in GB.
    #[serde(default)]
    pub data_size_gb: f64,
    /// Estimated time to move that data, in milliseconds.
    #[serde(default)]
    pub transfer_cost_ms: f64,
    /// Memory held concurrently if both endpoints run at the same time.
    #[serde(default)]
    pub memory_overlap_gb: f64,
}

impl DependencyEdge {
    pub fn new(kind: DependencyKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_transfer(mut self, data_size_gb: f64, transfer_cost_ms: f64) -> Self {
        self.data_size_gb = data_size_gb;
        self.transfer_cost_ms = transfer_cost_ms;
        self
    }

    pub fn with_memory_overlap(mut self, gb: f64) -> Self {
        self.memory_overlap_gb = gb;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("data_size_gb", self.data_size_gb),
            ("transfer_cost_ms", self.transfer_cost_ms),
            ("memory_overlap_gb", self.memory_overlap_gb),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MemdagError::ValidationError(format!(
                    "dependency {field} must be a non-negative finite number (got {value})"
                )));
            }
        }
        Ok(())
    }
}
