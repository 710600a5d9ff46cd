// tests/resource_registry.rs

use std::sync::Arc;
use std::thread;

use memdag::errors::MemdagError;
use memdag::resource::{MemoryProfile, NodeCapacity, ResourceRegistry, ResourceRequirements};
use memdag::types::NodeId;
use memdag_test_utils::init_tracing;

fn registry_with(nodes: &[(u32, f64, f64)]) -> ResourceRegistry {
    let registry = ResourceRegistry::default();
    for &(id, cpu, mem) in nodes {
        registry
            .add_node(NodeId(id), NodeCapacity::new(cpu, mem))
            .expect("add node");
    }
    registry
}

#[test]
fn reserve_then_release_restores_usage_exactly() {
    init_tracing();
    let registry = registry_with(&[(1, 8.0, 32.0)]);
    let req = ResourceRequirements::new(2.0, 8.0);

    assert!(registry.try_reserve(NodeId(1), &req).unwrap());
    let node = registry.snapshot(NodeId(1)).unwrap();
    assert_eq!(node.cpu_usage(), 0.25);
    assert_eq!(node.memory_usage(), 0.25);

    registry.release(NodeId(1), &req).unwrap();
    let node = registry.snapshot(NodeId(1)).unwrap();
    assert_eq!(node.cpu_usage(), 0.0);
    assert_eq!(node.memory_usage(), 0.0);
}

#[test]
fn fractional_requirements_round_trip_without_drift() {
    let registry = registry_with(&[(1, 3.0, 7.0)]);
    let req = ResourceRequirements::new(0.3, 0.7);

    for _ in 0..5 {
        assert!(registry.try_reserve(NodeId(1), &req).unwrap());
    }
    for _ in 0..5 {
        registry.release(NodeId(1), &req).unwrap();
    }
    let node = registry.snapshot(NodeId(1)).unwrap();
    assert_eq!(node.cpu_usage(), 0.0);
    assert_eq!(node.memory_usage(), 0.0);
}

#[test]
fn refused_reservation_leaves_node_untouched() {
    let registry = registry_with(&[(1, 4.0, 8.0)]);

    assert!(registry
        .try_reserve(NodeId(1), &ResourceRequirements::new(3.0, 6.0))
        .unwrap());
    // CPU would go to 5/4.
    assert!(!registry
        .try_reserve(NodeId(1), &ResourceRequirements::new(2.0, 1.0))
        .unwrap());
    // Memory would go to 9/8.
    assert!(!registry
        .try_reserve(NodeId(1), &ResourceRequirements::new(0.5, 3.0))
        .unwrap());

    let node = registry.snapshot(NodeId(1)).unwrap();
    assert_eq!(node.cpu_usage(), 0.75);
    assert_eq!(node.memory_usage(), 0.75);
}

#[test]
fn exact_fit_is_accepted() {
    let registry = registry_with(&[(1, 4.0, 8.0)]);
    assert!(registry
        .try_reserve(NodeId(1), &ResourceRequirements::new(4.0, 8.0))
        .unwrap());
    let node = registry.snapshot(NodeId(1)).unwrap();
    assert_eq!(node.cpu_usage(), 1.0);
    assert_eq!(node.memory_usage(), 1.0);
}

#[test]
fn huge_requirement_is_refused_without_overflow() {
    let registry = registry_with(&[(1, 8.0, 16.0)]);
    assert!(registry
        .try_reserve(NodeId(1), &ResourceRequirements::new(1.0, 1.0))
        .unwrap());

    let huge = ResourceRequirements::new(1e300, 1.0);
    assert!(!registry.try_reserve(NodeId(1), &huge).unwrap());
    assert!(registry.available_nodes(&huge).unwrap().is_empty());

    let node = registry.snapshot(NodeId(1)).unwrap();
    assert_eq!(node.cpu_usage(), 0.125);
    assert!(node.projected_cpu_usage(&huge) > 1.0);
}

#[test]
fn unhealthy_nodes_accept_nothing() {
    let registry = registry_with(&[(1, 8.0, 16.0), (2, 8.0, 16.0)]);
    registry.set_health(NodeId(1), false).unwrap();
    let req = ResourceRequirements::new(1.0, 1.0);

    assert!(!registry.try_reserve(NodeId(1), &req).unwrap());
    let available = registry.available_nodes(&req).unwrap();
    assert_eq!(available.into_iter().collect::<Vec<_>>(), vec![NodeId(2)]);

    registry.set_health(NodeId(1), true).unwrap();
    assert!(registry.try_reserve(NodeId(1), &req).unwrap());
}

#[test]
fn unknown_node_is_reported() {
    let registry = registry_with(&[(1, 8.0, 16.0)]);
    let req = ResourceRequirements::new(1.0, 1.0);

    assert!(matches!(
        registry.try_reserve(NodeId(9), &req),
        Err(MemdagError::NodeNotFound(NodeId(9)))
    ));
    assert!(matches!(
        registry.release(NodeId(9), &req),
        Err(MemdagError::NodeNotFound(NodeId(9)))
    ));
    assert!(matches!(
        registry.set_health(NodeId(9), false),
        Err(MemdagError::NodeNotFound(NodeId(9)))
    ));
}

#[test]
fn invalid_requirements_are_rejected() {
    let registry = registry_with(&[(1, 8.0, 16.0)]);

    for req in [
        ResourceRequirements::new(0.0, 1.0),
        ResourceRequirements::new(1.0, -2.0),
        ResourceRequirements::new(f64::NAN, 1.0),
        ResourceRequirements::new(1.0, 1.0).with_duration_ms(0),
    ] {
        assert!(matches!(
            registry.try_reserve(NodeId(1), &req),
            Err(MemdagError::ValidationError(_))
        ));
    }
    assert_eq!(registry.snapshot(NodeId(1)).unwrap().memory_usage(), 0.0);
}

#[test]
fn duplicate_and_invalid_nodes_are_rejected() {
    let registry = registry_with(&[(1, 8.0, 16.0)]);

    assert!(matches!(
        registry.add_node(NodeId(1), NodeCapacity::new(4.0, 4.0)),
        Err(MemdagError::ValidationError(_))
    ));
    assert!(matches!(
        registry.add_node(NodeId(2), NodeCapacity::new(0.0, 4.0)),
        Err(MemdagError::ValidationError(_))
    ));
    assert_eq!(registry.node_ids(), vec![NodeId(1)]);
}

#[test]
fn double_release_clamps_at_zero() {
    let registry = registry_with(&[(1, 8.0, 16.0)]);
    let req = ResourceRequirements::new(2.0, 4.0);

    registry.try_reserve(NodeId(1), &req).unwrap();
    registry.release(NodeId(1), &req).unwrap();
    registry.release(NodeId(1), &req).unwrap();

    let node = registry.snapshot(NodeId(1)).unwrap();
    assert_eq!(node.cpu_usage(), 0.0);
    assert_eq!(node.memory_usage(), 0.0);
}

#[test]
fn metrics_average_over_healthy_nodes_only() {
    let registry = registry_with(&[(1, 8.0, 16.0), (2, 8.0, 16.0), (3, 8.0, 16.0)]);
    registry
        .try_reserve(NodeId(1), &ResourceRequirements::new(4.0, 8.0))
        .unwrap();
    registry
        .try_reserve(NodeId(3), &ResourceRequirements::new(8.0, 16.0))
        .unwrap();
    registry.set_health(NodeId(3), false).unwrap();

    let m = registry.metrics();
    assert_eq!(m.total_nodes, 3);
    assert_eq!(m.healthy_nodes, 2);
    assert_eq!(m.unhealthy_nodes, 1);
    assert_eq!(m.average_cpu_usage, 0.25);
    assert_eq!(m.average_memory_usage, 0.25);
    assert_eq!(registry.cluster_memory_pressure(), 0.25);
    assert_eq!(registry.largest_memory_gb(), 16.0);
}

#[test]
fn empty_registry_has_zero_pressure() {
    let registry = ResourceRegistry::default();
    assert!(registry.is_empty());
    assert_eq!(registry.cluster_memory_pressure(), 0.0);
    assert_eq!(registry.metrics().total_nodes, 0);
}

#[test]
fn health_service_refresh_applies_to_every_node() {
    let registry = registry_with(&[(1, 8.0, 16.0), (2, 8.0, 16.0)]);
    let service = |node: NodeId| node != NodeId(2);

    registry.refresh_health(&service);

    assert!(registry.snapshot(NodeId(1)).unwrap().is_healthy());
    assert!(!registry.snapshot(NodeId(2)).unwrap().is_healthy());
}

#[test]
fn removed_node_is_gone() {
    let registry = registry_with(&[(1, 8.0, 16.0)]);
    let removed = registry.remove_node(NodeId(1)).unwrap();
    assert_eq!(removed.id(), NodeId(1));
    assert!(!registry.contains(NodeId(1)));
    assert!(matches!(
        registry.remove_node(NodeId(1)),
        Err(MemdagError::NodeNotFound(_))
    ));
}

#[test]
fn concurrent_reservations_never_over_commit() {
    let registry = Arc::new(registry_with(&[(1, 10.0, 10.0)]));
    let req = ResourceRequirements::new(1.0, 1.0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                (0..5)
                    .filter(|_| registry.try_reserve(NodeId(1), &req).unwrap())
                    .count()
            })
        })
        .collect();

    let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(accepted, 10);
    let node = registry.snapshot(NodeId(1)).unwrap();
    assert_eq!(node.cpu_usage(), 1.0);
    assert_eq!(node.memory_usage(), 1.0);
}

#[test]
fn node_profile_tracks_reserved_memory() {
    let registry = registry_with(&[(1, 8.0, 16.0)]);
    let req = ResourceRequirements::new(1.0, 4.0);

    registry.try_reserve(NodeId(1), &req).unwrap();
    registry.try_reserve(NodeId(1), &req).unwrap();
    registry.release(NodeId(1), &req).unwrap();

    let node = registry.snapshot(NodeId(1)).unwrap();
    let samples: Vec<f64> = node.memory_profile().samples().collect();
    assert_eq!(samples, vec![4.0, 8.0, 4.0]);
    assert_eq!(node.memory_profile().peak_gb(), 8.0);
}

#[test]
fn memory_profile_keeps_a_bounded_window() {
    let mut profile = MemoryProfile::new(3);
    for sample in [1.0, 2.0, 3.0, 4.0] {
        profile.record(sample);
    }
    profile.record(f64::NAN);

    assert_eq!(profile.len(), 3);
    assert_eq!(profile.samples().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    assert_eq!(profile.peak_gb(), 4.0);
    assert_eq!(profile.average_gb(), 3.0);
    assert!((profile.variance() - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(profile.latest(), Some(4.0));
}
