// tests/dag_analysis.rs

use memdag::dag::{DagAnalyzer, DependencyEdge};
use memdag::errors::MemdagError;
use memdag::resource::ResourceRequirements;
use memdag::types::{DependencyKind, TaskId};

fn t(id: u32) -> TaskId {
    TaskId(id)
}

fn ids(raw: &[u32]) -> Vec<TaskId> {
    raw.iter().copied().map(TaskId).collect()
}

fn data() -> DependencyEdge {
    DependencyEdge::new(DependencyKind::Data)
}

/// T1 -> {T2, T3} -> T4, with per-task (memory GB, duration ms).
fn diamond(sizes: [(f64, u64); 4]) -> DagAnalyzer {
    let mut dag = DagAnalyzer::new();
    for (i, (mem, ms)) in sizes.into_iter().enumerate() {
        dag.add_task(
            t(i as u32 + 1),
            ResourceRequirements::new(1.0, mem).with_duration_ms(ms),
        )
        .unwrap();
    }
    for (from, to) in [(1, 2), (1, 3), (2, 4), (3, 4)] {
        dag.add_dependency(t(from), t(to), data()).unwrap();
    }
    dag
}

#[test]
fn topological_order_respects_edges_and_breaks_ties_by_id() {
    let dag = diamond([(1.0, 100); 4]);
    assert_eq!(dag.topological_order().unwrap(), ids(&[1, 2, 3, 4]));

    let mut dag = DagAnalyzer::new();
    for id in [5, 3, 1] {
        dag.add_task(t(id), ResourceRequirements::default()).unwrap();
    }
    dag.add_dependency(t(5), t(1), data()).unwrap();
    assert_eq!(dag.topological_order().unwrap(), ids(&[3, 5, 1]));
}

#[test]
fn depth_height_sources_and_sinks() {
    let dag = diamond([(1.0, 100); 4]);

    assert_eq!(dag.depth(t(1)).unwrap(), 0);
    assert_eq!(dag.depth(t(3)).unwrap(), 1);
    assert_eq!(dag.depth(t(4)).unwrap(), 2);
    assert_eq!(dag.height(t(1)).unwrap(), 2);
    assert_eq!(dag.height(t(4)).unwrap(), 0);
    assert_eq!(dag.sources(), ids(&[1]));
    assert_eq!(dag.sinks(), ids(&[4]));
    assert!(matches!(dag.depth(t(9)), Err(MemdagError::TaskNotFound(_))));
}

#[test]
fn cycle_closing_edge_is_rejected_and_graph_unchanged() {
    let mut dag = DagAnalyzer::new();
    for id in 1..=3 {
        dag.add_task(t(id), ResourceRequirements::default()).unwrap();
    }
    dag.add_dependency(t(1), t(2), data()).unwrap();
    dag.add_dependency(t(2), t(3), data()).unwrap();

    let err = dag.add_dependency(t(3), t(1), data()).unwrap_err();
    assert!(matches!(err, MemdagError::CycleDetected(_)));
    assert!(matches!(
        dag.add_dependency(t(2), t(2), data()),
        Err(MemdagError::CycleDetected(_))
    ));

    assert_eq!(dag.dependency_count(), 2);
    assert!(dag.edge(t(3), t(1)).is_none());
    assert!(!dag.has_cycles());
    assert_eq!(dag.topological_order().unwrap(), ids(&[1, 2, 3]));
}

#[test]
fn edges_need_known_endpoints_and_sane_attributes() {
    let mut dag = DagAnalyzer::new();
    dag.add_task(t(1), ResourceRequirements::default()).unwrap();

    assert!(matches!(
        dag.add_dependency(t(1), t(2), data()),
        Err(MemdagError::TaskNotFound(TaskId(2)))
    ));

    dag.add_task(t(2), ResourceRequirements::default()).unwrap();
    assert!(matches!(
        dag.add_dependency(t(1), t(2), data().with_transfer(-1.0, 0.0)),
        Err(MemdagError::ValidationError(_))
    ));
    assert_eq!(dag.dependency_count(), 0);
}

#[test]
fn re_adding_a_task_is_a_no_op() {
    let mut dag = DagAnalyzer::new();
    dag.add_task(t(1), ResourceRequirements::new(1.0, 2.0)).unwrap();
    dag.add_task(t(1), ResourceRequirements::new(4.0, 8.0)).unwrap();

    assert_eq!(dag.task_count(), 1);
    assert_eq!(dag.requirements(t(1)).unwrap().memory_gb, 2.0);
}

#[test]
fn removing_a_task_drops_its_edges() {
    let mut dag = diamond([(1.0, 100); 4]);
    dag.remove_task(t(2)).unwrap();

    assert_eq!(dag.task_count(), 3);
    assert_eq!(dag.dependency_count(), 2);
    assert_eq!(dag.predecessors(t(4)), ids(&[3]));
    assert_eq!(dag.depth(t(4)).unwrap(), 2);
    assert!(matches!(dag.remove_task(t(2)), Err(MemdagError::TaskNotFound(_))));
}

#[test]
fn critical_path_follows_longest_duration() {
    let dag = diamond([(1.0, 100), (1.0, 500), (1.0, 200), (1.0, 100)]);
    assert_eq!(dag.critical_path().unwrap(), ids(&[1, 2, 4]));
}

#[test]
fn critical_path_counts_transfer_cost() {
    let mut dag = DagAnalyzer::new();
    for (id, ms) in [(1, 100), (2, 500), (3, 200), (4, 100)] {
        dag.add_task(t(id), ResourceRequirements::new(1.0, 1.0).with_duration_ms(ms))
            .unwrap();
    }
    dag.add_dependency(t(1), t(2), data()).unwrap();
    dag.add_dependency(t(1), t(3), data().with_transfer(2.0, 1000.0))
        .unwrap();
    dag.add_dependency(t(2), t(4), data()).unwrap();
    dag.add_dependency(t(3), t(4), data()).unwrap();

    assert_eq!(dag.critical_path().unwrap(), ids(&[1, 3, 4]));
}

#[test]
fn critical_path_ties_prefer_memory_then_lower_ids() {
    // Equal durations on both branches; T3 is heavier.
    let dag = diamond([(1.0, 100), (1.0, 100), (6.0, 100), (1.0, 100)]);
    assert_eq!(dag.critical_path().unwrap(), ids(&[1, 3, 4]));

    let dag = diamond([(1.0, 100); 4]);
    assert_eq!(dag.critical_path().unwrap(), ids(&[1, 2, 4]));
}

#[test]
fn memory_critical_path_follows_heaviest_tasks() {
    let dag = diamond([(4.0, 100), (2.0, 900), (10.0, 100), (1.0, 100)]);
    assert_eq!(dag.memory_critical_path().unwrap(), ids(&[1, 3, 4]));
}

#[test]
fn empty_dag_has_empty_paths() {
    let dag = DagAnalyzer::new();
    assert!(dag.critical_path().unwrap().is_empty());
    assert!(dag.topological_order().unwrap().is_empty());
    assert_eq!(dag.estimate_peak_memory().unwrap(), 0.0);
}

#[test]
fn memory_pressure_adds_overlap_of_live_neighbours() {
    let mut dag = DagAnalyzer::new();
    dag.add_task(t(1), ResourceRequirements::new(1.0, 4.0)).unwrap();
    dag.add_task(t(2), ResourceRequirements::new(1.0, 2.0)).unwrap();
    dag.add_dependency(t(1), t(2), data().with_memory_overlap(2.0))
        .unwrap();

    // Own 4 GB plus 2 GB shared with the dependent.
    assert_eq!(dag.memory_pressure(t(1), 16.0, |_| false).unwrap(), 0.375);
    // Predecessor still live: 2 + 2.
    assert_eq!(dag.memory_pressure(t(2), 16.0, |_| false).unwrap(), 0.25);
    // Predecessor finished: only its own 2 GB.
    assert_eq!(
        dag.memory_pressure(t(2), 16.0, |id| id == t(1)).unwrap(),
        0.125
    );
    // Clamped to 1 on a tiny reference.
    assert_eq!(dag.memory_pressure(t(1), 1.0, |_| false).unwrap(), 1.0);
    assert!(matches!(
        dag.memory_pressure(t(7), 16.0, |_| false),
        Err(MemdagError::TaskNotFound(_))
    ));
}

#[test]
fn observed_peak_raises_effective_memory() {
    let mut dag = DagAnalyzer::new();
    dag.add_task(t(1), ResourceRequirements::new(1.0, 4.0)).unwrap();
    assert_eq!(dag.effective_memory_gb(t(1)), 4.0);

    dag.record_memory_sample(t(1), 6.0).unwrap();
    dag.record_memory_sample(t(1), 3.0).unwrap();
    assert_eq!(dag.effective_memory_gb(t(1)), 6.0);
    assert_eq!(dag.memory_pressure(t(1), 12.0, |_| false).unwrap(), 0.5);
}

#[test]
fn memory_critical_tasks_are_sorted_by_pressure() {
    let dag = diamond([(2.0, 100), (8.0, 100), (12.0, 100), (1.0, 100)]);
    let critical = dag.memory_critical_tasks(16.0, 0.5, |_| false).unwrap();
    let order: Vec<TaskId> = critical.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, ids(&[3, 2]));
    assert_eq!(critical[0].1, 0.75);
}

#[test]
fn peak_memory_is_the_heaviest_level() {
    let dag = diamond([(4.0, 100), (2.0, 100), (10.0, 100), (1.0, 100)]);
    assert_eq!(dag.estimate_peak_memory().unwrap(), 12.0);
}

#[test]
fn connected_components_are_weak_and_sorted() {
    let mut dag = DagAnalyzer::new();
    for id in [1, 2, 3, 4, 5] {
        dag.add_task(t(id), ResourceRequirements::default()).unwrap();
    }
    dag.add_dependency(t(2), t(1), data()).unwrap();
    dag.add_dependency(t(4), t(5), data()).unwrap();

    assert_eq!(
        dag.connected_components(),
        vec![ids(&[1, 2]), ids(&[3]), ids(&[4, 5])]
    );
}

#[test]
fn node_metrics_and_priorities() {
    let mut dag = diamond([(4.0, 100); 4]);
    dag.set_execution_priority(t(3), 2.5).unwrap();
    assert!(matches!(
        dag.set_execution_priority(t(3), f64::INFINITY),
        Err(MemdagError::ValidationError(_))
    ));

    let m = dag.node_metrics(t(3), 16.0, |_| false).unwrap();
    assert_eq!(m.task, t(3));
    assert_eq!(m.depth, 1);
    assert_eq!(m.height, 1);
    assert_eq!(m.memory_pressure, 0.25);
    assert_eq!(m.execution_priority, 2.5);
    assert_eq!(dag.execution_priority(t(2)), 0.0);
}

#[test]
fn description_summarises_shape() {
    let dag = diamond([(1.0, 100); 4]);
    assert_eq!(
        dag.description(),
        "4 tasks, 4 dependencies, sources [T1], sinks [T4]"
    );
}
