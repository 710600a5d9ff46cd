// src/placement/mod.rs

//! Memory-aware node selection.
//!
//! A simplified HEFT-style heuristic: every candidate node is scored on CPU
//! headroom, memory headroom (less the overlap with DAG neighbours already on
//! that node) and network cost of pulling predecessor outputs, and the
//! weighted sum decides.

pub mod decision;
pub mod selector;

pub use decision::{NodeScore, SchedulingDecision};
pub use selector::{NodeSelector, PlacementContext, ScoringWeights};
