// src/placement/selector.rs

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::dag::DagAnalyzer;
use crate::errors::{MemdagError, Result};
use crate::placement::decision::{NodeScore, SchedulingDecision};
use crate::resource::{Node, ResourceRequirements};
use crate::types::{NodeId, TaskId};

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Megabits per gigabyte, for turning `data_size_gb / network_mbps` into
/// seconds.
const MEGABITS_PER_GB: f64 = 8000.0;

/// Relative importance of the three scoring criteria. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub memory: f64,
    pub cpu: f64,
    pub network: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            memory: 1.0 / 3.0,
            cpu: 1.0 / 3.0,
            network: 1.0 / 3.0,
        }
    }
}

impl ScoringWeights {
    pub fn new(memory: f64, cpu: f64, network: f64) -> Result<Self> {
        let weights = Self {
            memory,
            cpu,
            network,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        let parts = [self.memory, self.cpu, self.network];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(MemdagError::ValidationError(format!(
                "scoring weights must be non-negative finite numbers (got {parts:?})"
            )));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(MemdagError::ValidationError(format!(
                "memory, cpu and network weights must sum to 1 (got {sum})"
            )));
        }
        Ok(())
    }
}

/// What the selector needs to know about the rest of the schedule.
#[derive(Debug, Clone, Copy)]
pub struct PlacementContext<'a> {
    pub analyzer: &'a DagAnalyzer,
    /// Node each task is on, or was last on if it already finished.
    pub locations: &'a BTreeMap<TaskId, NodeId>,
    /// Tasks currently holding a reservation.
    pub active: &'a BTreeSet<TaskId>,
}

/// Scores candidate nodes for one task and picks the best.
///
/// Pure: it never touches the resource registry, so scoring can be repeated
/// speculatively. Committing the reservation is the caller's job.
#[derive(Debug, Clone)]
pub struct NodeSelector {
    weights: ScoringWeights,
    score_floor: f64,
}

impl Default for NodeSelector {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            score_floor: 0.0,
        }
    }
}

impl NodeSelector {
    pub fn new(weights: ScoringWeights, score_floor: f64) -> Result<Self> {
        weights.validate()?;
        if !score_floor.is_finite() {
            return Err(MemdagError::ValidationError(format!(
                "score floor must be finite (got {score_floor})"
            )));
        }
        Ok(Self {
            weights,
            score_floor,
        })
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    pub fn score_floor(&self) -> f64 {
        self.score_floor
    }

    /// Score `node` for `task`.
    ///
    /// With `hosted = true` the task's reservation is assumed to already be
    /// on the node (used to rate a task's current placement), so projected
    /// usage is the node's present usage.
    pub fn score_node(
        &self,
        task: TaskId,
        req: &ResourceRequirements,
        node: &Node,
        ctx: &PlacementContext<'_>,
        hosted: bool,
    ) -> NodeScore {
        let (projected_cpu, projected_mem) = if hosted {
            (node.cpu_usage(), node.memory_usage())
        } else {
            (node.projected_cpu_usage(req), node.projected_memory_usage(req))
        };

        let cpu = 1.0 - projected_cpu;
        let memory = 1.0 - projected_mem - self.overlap_penalty(task, node, ctx);
        let network = self.network_score(task, node, ctx);
        let overall =
            self.weights.memory * memory + self.weights.cpu * cpu + self.weights.network * network;

        NodeScore {
            node: node.id(),
            memory,
            cpu,
            network,
            overall,
        }
    }

    /// Memory the task would share with DAG neighbours already resident on
    /// the node, as a fraction of that node's memory.
    fn overlap_penalty(&self, task: TaskId, node: &Node, ctx: &PlacementContext<'_>) -> f64 {
        let analyzer = ctx.analyzer;
        let on_node = |other: &TaskId| {
            ctx.active.contains(other) && ctx.locations.get(other) == Some(&node.id())
        };

        let from_preds: f64 = analyzer
            .predecessors(task)
            .iter()
            .filter(|p| on_node(*p))
            .filter_map(|p| analyzer.edge(*p, task))
            .map(|e| e.memory_overlap_gb)
            .sum();
        let from_deps: f64 = analyzer
            .dependents(task)
            .iter()
            .filter(|d| on_node(*d))
            .filter_map(|d| analyzer.edge(task, *d))
            .map(|e| e.memory_overlap_gb)
            .sum();

        (from_preds + from_deps) / node.capacity().memory_gb
    }

    /// `1 / (1 + seconds)` where `seconds` is the time to pull every
    /// predecessor's output that lives on another node over this node's link.
    fn network_score(&self, task: TaskId, node: &Node, ctx: &PlacementContext<'_>) -> f64 {
        let analyzer = ctx.analyzer;
        let seconds: f64 = analyzer
            .predecessors(task)
            .iter()
            .filter(|p| matches!(ctx.locations.get(*p), Some(n) if *n != node.id()))
            .filter_map(|p| analyzer.edge(*p, task))
            .map(|e| e.data_size_gb * MEGABITS_PER_GB / node.capacity().network_mbps)
            .sum();
        1.0 / (1.0 + seconds)
    }

    /// Pick a node for `task` among `candidates`.
    ///
    /// Highest overall score wins; equal scores go to the lowest node id.
    /// Candidates scoring below the floor are dropped. If nothing is left
    /// the decision has no target.
    pub fn select(
        &self,
        task: TaskId,
        candidates: &[Node],
        ctx: &PlacementContext<'_>,
    ) -> Result<SchedulingDecision> {
        let req = *ctx
            .analyzer
            .requirements(task)
            .ok_or(MemdagError::TaskNotFound(task))?;

        let mut scored: Vec<NodeScore> = candidates
            .iter()
            .map(|node| self.score_node(task, &req, node, ctx, false))
            .collect();
        scored.sort_by(|a, b| b.overall.total_cmp(&a.overall).then(a.node.cmp(&b.node)));

        let considered: Vec<NodeId> = scored.iter().map(|s| s.node).collect();
        let best = scored
            .iter()
            .find(|s| s.overall >= self.score_floor)
            .copied();

        let decision = match best {
            Some(best) => {
                let alternatives: Vec<NodeId> =
                    considered.into_iter().filter(|n| *n != best.node).collect();
                let rationale = format!(
                    "{} chosen with overall {:.3} (memory {:.3}, cpu {:.3}, network {:.3}) over {} alternative(s)",
                    best.node,
                    best.overall,
                    best.memory,
                    best.cpu,
                    best.network,
                    alternatives.len()
                );
                SchedulingDecision::placed(task, best, alternatives, rationale)
            }
            None if candidates.is_empty() => SchedulingDecision::unschedulable(
                task,
                Vec::new(),
                "no node currently has capacity for this task".to_string(),
            ),
            None => SchedulingDecision::unschedulable(
                task,
                considered,
                format!(
                    "all {} candidate(s) scored below the floor {:.3}",
                    candidates.len(),
                    self.score_floor
                ),
            ),
        };

        debug!(
            task = %task,
            target = ?decision.target_node,
            overall = decision.overall_score,
            "placement decision"
        );
        Ok(decision)
    }
}
