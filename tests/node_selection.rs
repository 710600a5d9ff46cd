// tests/node_selection.rs

use std::collections::{BTreeMap, BTreeSet};

use memdag::dag::{DagAnalyzer, DependencyEdge};
use memdag::errors::MemdagError;
use memdag::placement::{NodeSelector, PlacementContext, ScoringWeights};
use memdag::resource::{Node, NodeCapacity, ResourceRequirements};
use memdag::types::{DependencyKind, NodeId, TaskId};

fn node(id: u32, cpu: f64, mem: f64) -> Node {
    Node::new(NodeId(id), NodeCapacity::new(cpu, mem), 10)
}

fn single_task(cpu: f64, mem: f64) -> DagAnalyzer {
    let mut dag = DagAnalyzer::new();
    dag.add_task(TaskId(1), ResourceRequirements::new(cpu, mem))
        .unwrap();
    dag
}

struct View {
    locations: BTreeMap<TaskId, NodeId>,
    active: BTreeSet<TaskId>,
}

impl View {
    fn empty() -> Self {
        Self {
            locations: BTreeMap::new(),
            active: BTreeSet::new(),
        }
    }

    fn ctx<'a>(&'a self, analyzer: &'a DagAnalyzer) -> PlacementContext<'a> {
        PlacementContext {
            analyzer,
            locations: &self.locations,
            active: &self.active,
        }
    }
}

#[test]
fn balanced_node_beats_memory_rich_but_cpu_tight_node() {
    let dag = single_task(4.0, 8.0);
    let view = View::empty();
    let candidates = vec![node(1, 8.0, 16.0), node(2, 4.0, 32.0)];

    let selector = NodeSelector::default();
    let decision = selector
        .select(TaskId(1), &candidates, &view.ctx(&dag))
        .unwrap();

    assert_eq!(decision.target_node, Some(NodeId(1)));
    assert_eq!(decision.alternatives, vec![NodeId(2)]);
    assert!((decision.cpu_score - 0.5).abs() < 1e-9);
    assert!((decision.memory_score - 0.5).abs() < 1e-9);
    assert_eq!(decision.network_score, 1.0);
    assert!((decision.overall_score - 2.0 / 3.0).abs() < 1e-9);

    // Same answer every time, whatever the candidate order.
    let reversed: Vec<Node> = candidates.into_iter().rev().collect();
    let again = selector
        .select(TaskId(1), &reversed, &view.ctx(&dag))
        .unwrap();
    assert_eq!(again, decision);
}

#[test]
fn memory_weight_can_flip_the_choice() {
    let dag = single_task(4.0, 8.0);
    let view = View::empty();
    let candidates = vec![node(1, 8.0, 16.0), node(2, 4.0, 32.0)];

    let selector = NodeSelector::new(ScoringWeights::new(0.8, 0.1, 0.1).unwrap(), 0.0).unwrap();
    let decision = selector
        .select(TaskId(1), &candidates, &view.ctx(&dag))
        .unwrap();
    assert_eq!(decision.target_node, Some(NodeId(2)));
}

#[test]
fn equal_scores_go_to_lowest_node_id() {
    let dag = single_task(1.0, 1.0);
    let view = View::empty();
    let candidates = vec![node(3, 8.0, 16.0), node(2, 8.0, 16.0), node(5, 8.0, 16.0)];

    let decision = NodeSelector::default()
        .select(TaskId(1), &candidates, &view.ctx(&dag))
        .unwrap();
    assert_eq!(decision.target_node, Some(NodeId(2)));
    assert_eq!(decision.alternatives, vec![NodeId(3), NodeId(5)]);
}

#[test]
fn no_candidates_means_no_target() {
    let dag = single_task(1.0, 1.0);
    let view = View::empty();

    let decision = NodeSelector::default()
        .select(TaskId(1), &[], &view.ctx(&dag))
        .unwrap();
    assert!(!decision.is_schedulable());
    assert_eq!(decision.target_node, None);
    assert!(decision.alternatives.is_empty());
    assert!(!decision.rationale.is_empty());
}

#[test]
fn candidates_below_the_floor_are_dropped() {
    let dag = single_task(4.0, 8.0);
    let view = View::empty();
    let candidates = vec![node(1, 8.0, 16.0), node(2, 4.0, 32.0)];

    let selector = NodeSelector::new(ScoringWeights::default(), 0.9).unwrap();
    let decision = selector
        .select(TaskId(1), &candidates, &view.ctx(&dag))
        .unwrap();
    assert_eq!(decision.target_node, None);
    assert_eq!(decision.alternatives, vec![NodeId(1), NodeId(2)]);
    assert!(decision.rationale.contains("floor"));

    let relaxed = NodeSelector::new(ScoringWeights::default(), 0.6).unwrap();
    let decision = relaxed
        .select(TaskId(1), &candidates, &view.ctx(&dag))
        .unwrap();
    assert_eq!(decision.target_node, Some(NodeId(1)));
}

#[test]
fn unknown_task_is_an_error() {
    let dag = DagAnalyzer::new();
    let view = View::empty();
    assert!(matches!(
        NodeSelector::default().select(TaskId(4), &[node(1, 8.0, 8.0)], &view.ctx(&dag)),
        Err(MemdagError::TaskNotFound(TaskId(4)))
    ));
}

#[test]
fn weights_must_be_non_negative_and_sum_to_one() {
    assert!(ScoringWeights::new(0.5, 0.3, 0.2).is_ok());
    assert!(matches!(
        ScoringWeights::new(0.5, 0.5, 0.5),
        Err(MemdagError::ValidationError(_))
    ));
    assert!(matches!(
        ScoringWeights::new(-0.1, 0.6, 0.5),
        Err(MemdagError::ValidationError(_))
    ));
    assert!(matches!(
        ScoringWeights::new(f64::NAN, 0.5, 0.5),
        Err(MemdagError::ValidationError(_))
    ));
    assert!(ScoringWeights::default().validate().is_ok());
    assert!(matches!(
        NodeSelector::new(ScoringWeights::default(), f64::NAN),
        Err(MemdagError::ValidationError(_))
    ));
}

#[test]
fn remote_predecessor_output_lowers_network_score() {
    let mut dag = DagAnalyzer::new();
    dag.add_task(TaskId(1), ResourceRequirements::new(1.0, 1.0))
        .unwrap();
    dag.add_task(TaskId(2), ResourceRequirements::new(1.0, 1.0))
        .unwrap();
    dag.add_dependency(
        TaskId(1),
        TaskId(2),
        DependencyEdge::new(DependencyKind::Data).with_transfer(8.0, 0.0),
    )
    .unwrap();

    // T1 finished on N2.
    let mut view = View::empty();
    view.locations.insert(TaskId(1), NodeId(2));

    let candidates = vec![node(1, 8.0, 16.0), node(2, 8.0, 16.0)];
    let selector = NodeSelector::default();
    let decision = selector
        .select(TaskId(2), &candidates, &view.ctx(&dag))
        .unwrap();
    assert_eq!(decision.target_node, Some(NodeId(2)));
    assert_eq!(decision.network_score, 1.0);

    // 8 GB over 1000 Mbps is 64 s.
    let req = *dag.requirements(TaskId(2)).unwrap();
    let remote = selector.score_node(TaskId(2), &req, &candidates[0], &view.ctx(&dag), false);
    assert!((remote.network - 1.0 / 65.0).abs() < 1e-12);
}

#[test]
fn overlap_with_resident_neighbour_is_penalised() {
    let mut dag = DagAnalyzer::new();
    dag.add_task(TaskId(1), ResourceRequirements::new(1.0, 2.0))
        .unwrap();
    dag.add_task(TaskId(2), ResourceRequirements::new(1.0, 2.0))
        .unwrap();
    dag.add_dependency(
        TaskId(1),
        TaskId(2),
        DependencyEdge::new(DependencyKind::Resource).with_memory_overlap(8.0),
    )
    .unwrap();

    let mut view = View::empty();
    view.locations.insert(TaskId(1), NodeId(1));
    view.active.insert(TaskId(1));

    let n1 = node(1, 8.0, 16.0);
    let req = *dag.requirements(TaskId(2)).unwrap();
    let selector = NodeSelector::default();

    let with_neighbour = selector.score_node(TaskId(2), &req, &n1, &view.ctx(&dag), false);
    // 1 - 2/16 - 8/16
    assert!((with_neighbour.memory - 0.375).abs() < 1e-12);

    view.active.clear();
    let neighbour_gone = selector.score_node(TaskId(2), &req, &n1, &view.ctx(&dag), false);
    assert!((neighbour_gone.memory - 0.875).abs() < 1e-12);
}

#[test]
fn hosted_scoring_uses_current_usage() {
    let dag = single_task(2.0, 4.0);
    let view = View::empty();
    let n1 = node(1, 8.0, 16.0);
    let req = *dag.requirements(TaskId(1)).unwrap();
    let selector = NodeSelector::default();

    let hosted = selector.score_node(TaskId(1), &req, &n1, &view.ctx(&dag), true);
    assert_eq!(hosted.cpu, 1.0);
    assert_eq!(hosted.memory, 1.0);

    let projected = selector.score_node(TaskId(1), &req, &n1, &view.ctx(&dag), false);
    assert_eq!(projected.cpu, 0.75);
    assert_eq!(projected.memory, 0.75);
}
