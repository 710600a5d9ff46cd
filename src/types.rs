// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a task in the DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Identifier of a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Why one task depends on another.
///
/// - `Data`: the dependent consumes output produced by the predecessor.
/// - `Compute`: the dependent needs the predecessor's computation to finish
///   but moves no significant data.
/// - `Resource`: the two tasks contend for the same resource and must not
///   overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    #[default]
    Data,
    Compute,
    Resource,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyKind::Data => "data",
            DependencyKind::Compute => "compute",
            DependencyKind::Resource => "resource",
        };
        f.write_str(s)
    }
}

impl FromStr for DependencyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "data" => Ok(DependencyKind::Data),
            "compute" => Ok(DependencyKind::Compute),
            "resource" => Ok(DependencyKind::Resource),
            other => Err(format!(
                "invalid dependency kind: {other} (expected \"data\", \"compute\" or \"resource\")"
            )),
        }
    }
}
