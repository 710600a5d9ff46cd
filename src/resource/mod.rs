// src/resource/mod.rs

//! Resource model: node capacity and task requirement accounting.
//!
//! - [`requirements`] describes what a task needs.
//! - [`node`] holds one node's capacity and live reservations.
//! - [`profile`] keeps bounded memory-usage histories.
//! - [`registry`] owns every node behind a single lock and is the only place
//!   capacity numbers change.

pub mod node;
pub mod profile;
pub mod registry;
pub mod requirements;

pub use node::{Node, NodeCapacity};
pub use profile::{MemoryProfile, DEFAULT_PROFILE_WINDOW};
pub use registry::{ClusterMetrics, HealthService, ResourceRegistry};
pub use requirements::ResourceRequirements;
