// src/dag/scheduler.rs

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::dag::analysis::DagNodeMetrics;
use crate::dag::graph::DagAnalyzer;
use crate::dag::queue::ReadyQueue;
use crate::dag::scheduler_step::{SchedulerEvent, SchedulerStep};
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{
    DependencySpec, DispatchedTask, Migration, TaskInfo, TaskSpec, TaskStatus,
};
use crate::errors::{MemdagError, Result};
use crate::placement::{NodeSelector, PlacementContext, SchedulingDecision};
use crate::resource::{
    ClusterMetrics, HealthService, Node, NodeCapacity, ResourceRegistry, ResourceRequirements,
};
use crate::types::{NodeId, TaskId};

#[derive(Debug, Default, Clone)]
struct SchedulerStats {
    placements: usize,
    migrations: usize,
    memory_score_sum: f64,
    execution_time_ms_sum: f64,
    timed_completions: usize,
    scheduling_time_ms_sum: f64,
    scheduling_passes: usize,
}

/// Snapshot of scheduler progress for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerReport {
    pub total_tasks: usize,
    pub pending: usize,
    pub ready: usize,
    pub scheduled: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub blocked: usize,
    pub placements: usize,
    pub migrations: usize,
    pub execution_progress: f64,
    pub memory_efficiency: f64,
    pub average_execution_time_ms: f64,
    pub average_scheduling_time_ms: f64,
    pub cluster: ClusterMetrics,
}

impl fmt::Display for SchedulerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} completed ({:.1}%), {} running, {} scheduled, {} ready, {} pending, \
             {} failed, {} cancelled, {} blocked; {} placements, {} migrations, \
             memory efficiency {:.3}, avg execution {:.1} ms, avg scheduling {:.3} ms, \
             cluster cpu {:.1}% memory {:.1}% ({}/{} nodes healthy)",
            self.completed,
            self.total_tasks,
            self.execution_progress * 100.0,
            self.running,
            self.scheduled,
            self.ready,
            self.pending,
            self.failed,
            self.cancelled,
            self.blocked,
            self.placements,
            self.migrations,
            self.memory_efficiency,
            self.average_execution_time_ms,
            self.average_scheduling_time_ms,
            self.cluster.average_cpu_usage * 100.0,
            self.cluster.average_memory_usage * 100.0,
            self.cluster.healthy_nodes,
            self.cluster.total_nodes,
        )
    }
}

/// Orchestrates a DAG of tasks over the cluster in the [`ResourceRegistry`].
///
/// It is responsible for:
/// - promoting tasks to Ready once every predecessor completed
/// - placing ready tasks through the [`NodeSelector`] and committing the
///   reservation
/// - starting placed tasks within `max_parallel_tasks`
/// - migrating tasks off memory-overloaded nodes
/// - releasing reservations and propagating failures to dependents
///
/// Every status change, placement and migration is also queued as a
/// [`SchedulerEvent`]; callers collect them with
/// [`drain_events`](Self::drain_events).
pub struct DagScheduler {
    config: SchedulerConfig,
    selector: NodeSelector,
    registry: Arc<ResourceRegistry>,
    health: Option<Arc<dyn HealthService>>,
    analyzer: DagAnalyzer,
    tasks: BTreeMap<TaskId, TaskInfo>,
    queue: ReadyQueue,
    events: VecDeque<SchedulerEvent>,
    stats: SchedulerStats,
}

impl fmt::Debug for DagScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DagScheduler")
            .field("config", &self.config)
            .field("tasks", &self.tasks.len())
            .field("queue", &self.queue)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl DagScheduler {
    /// Validates `config` and builds a scheduler with an empty DAG.
    pub fn new(config: SchedulerConfig, registry: Arc<ResourceRegistry>) -> Result<Self> {
        config.validate()?;
        let selector = NodeSelector::new(config.weights(), config.score_floor)?;
        Ok(Self {
            analyzer: DagAnalyzer::with_profile_window(config.profile_window),
            config,
            selector,
            registry,
            health: None,
            tasks: BTreeMap::new(),
            queue: ReadyQueue::new(),
            events: VecDeque::new(),
            stats: SchedulerStats::default(),
        })
    }

    /// Poll `service` for node health at the start of every scheduling pass.
    pub fn with_health_service(mut self, service: Arc<dyn HealthService>) -> Self {
        self.health = Some(service);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn analyzer(&self) -> &DagAnalyzer {
        &self.analyzer
    }

    // ----- DAG construction -------------------------------------------------

    /// Replace the current DAG with `tasks` and `dependencies`.
    ///
    /// The new graph is built on the side; if any task or edge is rejected
    /// (invalid requirements, unknown endpoint, cycle) the error is returned
    /// and the previous DAG stays in place.
    pub fn build_dag(&mut self, tasks: &[TaskSpec], dependencies: &[DependencySpec]) -> Result<()> {
        if let Some(busy) = self.tasks.values().find(|t| t.status.holds_reservation()) {
            return Err(MemdagError::ValidationError(format!(
                "cannot rebuild the DAG while {} holds a reservation",
                busy.id
            )));
        }

        let mut analyzer = DagAnalyzer::with_profile_window(self.config.profile_window);
        let mut infos: BTreeMap<TaskId, TaskInfo> = BTreeMap::new();

        for spec in tasks {
            if infos.contains_key(&spec.id) {
                return Err(MemdagError::ValidationError(format!(
                    "task {} is defined more than once",
                    spec.id
                )));
            }
            analyzer.add_task(spec.id, spec.requirements)?;
            if let Some(priority) = spec.priority {
                analyzer.set_execution_priority(spec.id, priority)?;
            }
            infos.insert(spec.id, TaskInfo::from_spec(spec));
        }

        for dep in dependencies {
            analyzer.add_dependency(dep.from, dep.to, dep.edge)?;
        }

        for info in infos.values_mut() {
            refresh_links(&analyzer, info);
        }

        self.analyzer = analyzer;
        self.tasks = infos;
        self.queue.clear();
        self.stats = SchedulerStats::default();

        info!(dag = %self.analyzer.description(), "DAG built");

        let all: Vec<TaskId> = self.tasks.keys().copied().collect();
        self.promote(all);
        Ok(())
    }

    /// Add a single task to the current DAG.
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<()> {
        if self.tasks.contains_key(&spec.id) {
            return Err(MemdagError::ValidationError(format!(
                "task {} already exists",
                spec.id
            )));
        }
        self.analyzer.add_task(spec.id, spec.requirements)?;
        if let Some(priority) = spec.priority {
            self.analyzer.set_execution_priority(spec.id, priority)?;
        }
        self.tasks.insert(spec.id, TaskInfo::from_spec(&spec));
        debug!(task = %spec.id, "task added");
        self.promote([spec.id]);
        Ok(())
    }

    /// Add a dependency to the current DAG.
    ///
    /// The dependent must not have started. A Ready dependent goes back to
    /// Pending until the new predecessor completes; a dependent of a failed,
    /// cancelled or blocked task becomes Blocked.
    pub fn add_dependency(&mut self, dep: DependencySpec) -> Result<()> {
        let target = self.task(dep.to)?.status;
        if !matches!(
            target,
            TaskStatus::Pending | TaskStatus::Ready | TaskStatus::Blocked
        ) {
            return Err(MemdagError::ValidationError(format!(
                "cannot add a dependency to {} while it is {target}",
                dep.to
            )));
        }

        self.analyzer.add_dependency(dep.from, dep.to, dep.edge)?;
        for id in [dep.from, dep.to] {
            if let Some(info) = self.tasks.get_mut(&id) {
                refresh_links(&self.analyzer, info);
            }
        }

        let upstream = self.task(dep.from)?;
        let roots: Vec<TaskId> = match upstream.status {
            TaskStatus::Failed | TaskStatus::Cancelled => vec![dep.from],
            TaskStatus::Blocked => upstream.blocked_by.iter().copied().collect(),
            _ => Vec::new(),
        };
        let upstream_done = upstream.status == TaskStatus::Completed;

        if target == TaskStatus::Ready && !upstream_done {
            self.queue.remove(dep.to);
            self.state().transition(dep.to, TaskStatus::Pending)?;
        }
        for root in roots {
            let blocked = self.state().block_dependents(root);
            for id in blocked {
                self.queue.remove(id);
            }
        }
        Ok(())
    }

    /// Remove a task that holds no reservation. Everything downstream has
    /// its blockers recomputed, and dependents whose other predecessors
    /// completed become Ready.
    pub fn remove_task(&mut self, id: TaskId) -> Result<()> {
        let info = self.task(id)?;
        if info.status.holds_reservation() {
            return Err(MemdagError::ValidationError(format!(
                "cannot remove {id} while it is {}",
                info.status
            )));
        }
        let neighbours: Vec<TaskId> = info
            .predecessors
            .iter()
            .map(|(p, _)| *p)
            .chain(info.dependents.iter().copied())
            .collect();
        let dependents = info.dependents.clone();
        let downstream = self.descendants(id);

        self.analyzer.remove_task(id)?;
        self.tasks.remove(&id);
        self.queue.remove(id);

        for n in neighbours {
            if let Some(info) = self.tasks.get_mut(&n) {
                refresh_links(&self.analyzer, info);
            }
        }
        let released = self.state().recompute_blockers(downstream);
        debug!(task = %id, released = released.len(), "task removed");
        self.promote(dependents.into_iter().chain(released));
        Ok(())
    }

    // ----- scheduling cycle -------------------------------------------------

    /// One full pass: pressure check, placement, dispatch.
    pub fn run_cycle(&mut self) -> Result<SchedulerStep> {
        let migrations = self.check_memory_pressure()?;
        let decisions = self.schedule_ready_tasks()?;
        let dispatched = self.execute_parallel_tasks()?;
        Ok(SchedulerStep {
            migrations,
            decisions,
            dispatched,
        })
    }

    /// Try to place every Ready task.
    ///
    /// Tasks are visited by ascending depth, then descending execution
    /// priority, then ascending id. A task that gets no node stays Ready and
    /// is tried again on the next call.
    pub fn schedule_ready_tasks(&mut self) -> Result<Vec<SchedulingDecision>> {
        let began = Instant::now();
        if let Some(service) = &self.health {
            self.registry.refresh_health(service.as_ref());
        }

        let pending: Vec<TaskId> = ReadOnlyStateManager::new(&self.tasks).with_status(TaskStatus::Pending);
        self.promote(pending);

        let order = self.queue.placement_order(&self.analyzer)?;
        let mut decisions = Vec::with_capacity(order.len());
        for task in order {
            decisions.push(self.place(task)?);
        }
        if !decisions.is_empty() {
            self.stats.scheduling_time_ms_sum += began.elapsed().as_secs_f64() * 1000.0;
            self.stats.scheduling_passes += 1;
        }
        Ok(decisions)
    }

    fn place(&mut self, task: TaskId) -> Result<SchedulingDecision> {
        let info = self.task(task)?;
        if info.status != TaskStatus::Ready {
            return Err(MemdagError::InvalidTransition {
                task,
                from: info.status,
                to: TaskStatus::Scheduled,
            });
        }
        let req = info.requirements;

        let candidates = self.candidate_nodes(&req, &[])?;
        let decision = {
            let (locations, active) = self.placement_view();
            let ctx = PlacementContext {
                analyzer: &self.analyzer,
                locations: &locations,
                active: &active,
            };
            self.selector.select(task, &candidates, &ctx)?
        };

        let decision = match decision.target_node {
            Some(node) if self.registry.try_reserve(node, &req)? => {
                self.commit_placement(task, node, &decision)?;
                decision
            }
            Some(node) => {
                warn!(task = %task, node = %node, "reservation refused at commit time; task stays ready");
                SchedulingDecision::unschedulable(
                    task,
                    candidates.iter().map(Node::id).collect(),
                    format!("reservation on {node} was refused at commit time"),
                )
            }
            None => {
                debug!(task = %task, rationale = %decision.rationale, "task stays ready");
                decision
            }
        };

        self.events.push_back(SchedulerEvent::Decision(decision.clone()));
        Ok(decision)
    }

    fn commit_placement(
        &mut self,
        task: TaskId,
        node: NodeId,
        decision: &SchedulingDecision,
    ) -> Result<()> {
        if let Err(e) = self.state().transition(task, TaskStatus::Scheduled) {
            let req = self.task(task)?.requirements;
            self.registry.release(node, &req)?;
            return Err(e);
        }
        if let Some(info) = self.tasks.get_mut(&task) {
            info.assigned_node = Some(node);
        }
        self.queue.push_launch(task);
        self.stats.placements += 1;
        self.stats.memory_score_sum += decision.memory_score;
        info!(
            task = %task,
            node = %node,
            overall = decision.overall_score,
            "task scheduled"
        );
        Ok(())
    }

    /// Start Scheduled tasks in placement order until `max_parallel_tasks`
    /// are Running.
    pub fn execute_parallel_tasks(&mut self) -> Result<Vec<DispatchedTask>> {
        let mut running = ReadOnlyStateManager::new(&self.tasks).count(TaskStatus::Running);
        let mut dispatched = Vec::new();

        while running < self.config.max_parallel_tasks {
            let Some(task) = self.queue.pop_launch() else {
                break;
            };
            let info = self.task(task)?;
            if info.status != TaskStatus::Scheduled {
                debug!(task = %task, status = %info.status, "dropping stale launch entry");
                continue;
            }
            let node = info.assigned_node.ok_or_else(|| {
                MemdagError::ValidationError(format!("{task} is scheduled without a node"))
            })?;

            self.state().transition(task, TaskStatus::Running)?;
            if let Some(info) = self.tasks.get_mut(&task) {
                info.attempt += 1;
                info.started_at = Some(Instant::now());
                info!(task = %task, node = %node, "task started");
                dispatched.push(DispatchedTask::from_task_info(info, node));
            }
            running += 1;
        }

        if self.queue.launch_len() > 0 {
            debug!(
                waiting = self.queue.launch_len(),
                max_parallel = self.config.max_parallel_tasks,
                "parallelism limit reached"
            );
        }
        Ok(dispatched)
    }

    // ----- dynamic rescheduling ---------------------------------------------

    /// Move tasks off memory-overloaded nodes when the cluster as a whole is
    /// under pressure.
    ///
    /// Only Scheduled or Running tasks on nodes whose memory usage exceeds
    /// `memory_threshold` are considered, most memory-pressured first. A task
    /// moves only if the best alternative beats its current placement by at
    /// least `migration_improvement_margin`.
    pub fn check_memory_pressure(&mut self) -> Result<Vec<Migration>> {
        if !self.config.enable_dynamic_rescheduling {
            return Ok(Vec::new());
        }
        let threshold = self.config.memory_threshold;
        let pressure = self.registry.cluster_memory_pressure();
        if pressure <= threshold {
            return Ok(Vec::new());
        }
        info!(pressure, threshold, "cluster memory pressure above threshold");

        let overloaded: BTreeSet<NodeId> = self
            .registry
            .snapshots()
            .iter()
            .filter(|n| n.memory_usage() > threshold)
            .map(Node::id)
            .collect();

        let mut candidates: Vec<(TaskId, f64)> = Vec::new();
        {
            let reference = self.registry.largest_memory_gb();
            let finished = |t: TaskId| {
                self.tasks
                    .get(&t)
                    .is_some_and(|i| i.status == TaskStatus::Completed)
            };
            for info in self.tasks.values() {
                let on_overloaded = info
                    .assigned_node
                    .is_some_and(|n| overloaded.contains(&n));
                if info.status.holds_reservation() && on_overloaded {
                    let p = self.analyzer.memory_pressure(info.id, reference, finished)?;
                    candidates.push((info.id, p));
                }
            }
        }
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut migrations = Vec::new();
        for (task, task_pressure) in candidates {
            let info = self.task(task)?;
            let (Some(from), req) = (info.assigned_node, info.requirements) else {
                continue;
            };
            let current = match self.registry.snapshot(from) {
                Ok(node) => node,
                Err(MemdagError::NodeNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if current.memory_usage() <= threshold {
                // Earlier moves already relieved this node.
                continue;
            }

            let others = self.candidate_nodes(&req, &[from])?;
            let (decision, current_overall) = {
                let (locations, active) = self.placement_view();
                let ctx = PlacementContext {
                    analyzer: &self.analyzer,
                    locations: &locations,
                    active: &active,
                };
                let decision = self.selector.select(task, &others, &ctx)?;
                let current_overall = self
                    .selector
                    .score_node(task, &req, &current, &ctx, true)
                    .overall;
                (decision, current_overall)
            };

            let Some(to) = decision.target_node else {
                debug!(task = %task, node = %from, "no alternative node for pressured task");
                continue;
            };
            let improvement = decision.overall_score - current_overall;
            if improvement < self.config.migration_improvement_margin {
                debug!(
                    task = %task,
                    from = %from,
                    to = %to,
                    improvement,
                    margin = self.config.migration_improvement_margin,
                    "migration gain below margin"
                );
                continue;
            }

            if let Some(migration) = self.migrate(task, from, to, improvement)? {
                debug!(task = %task, pressure = task_pressure, "pressure-driven migration");
                self.events.push_back(SchedulerEvent::Decision(decision));
                migrations.push(migration);
            }
        }
        Ok(migrations)
    }

    /// Proactively move `task` elsewhere, e.g. because its node is predicted
    /// to fail. The current node and `exclude` are never chosen. No margin
    /// applies: any node that can take the task is better than staying.
    ///
    /// Returns the decision; `target_node == None` means the task could not
    /// be moved and stays where it is.
    pub fn reschedule_task(&mut self, task: TaskId, exclude: Option<NodeId>) -> Result<SchedulingDecision> {
        let info = self.task(task)?;
        if !info.status.holds_reservation() {
            return Err(MemdagError::ValidationError(format!(
                "{task} is {} and has no placement to move",
                info.status
            )));
        }
        let req = info.requirements;
        let from = info.assigned_node.ok_or_else(|| {
            MemdagError::ValidationError(format!("{task} holds a reservation without a node"))
        })?;

        let excluded: Vec<NodeId> = std::iter::once(from).chain(exclude).collect();
        let others = self.candidate_nodes(&req, &excluded)?;
        let (decision, current_overall) = {
            let (locations, active) = self.placement_view();
            let ctx = PlacementContext {
                analyzer: &self.analyzer,
                locations: &locations,
                active: &active,
            };
            let decision = self.selector.select(task, &others, &ctx)?;
            let current_overall = self
                .registry
                .snapshot(from)
                .ok()
                .map(|node| self.selector.score_node(task, &req, &node, &ctx, true).overall);
            (decision, current_overall)
        };

        let decision = match decision.target_node {
            Some(to) => {
                let improvement = decision.overall_score - current_overall.unwrap_or(0.0);
                match self.migrate(task, from, to, improvement)? {
                    Some(_) => decision,
                    None => SchedulingDecision::unschedulable(
                        task,
                        others.iter().map(Node::id).collect(),
                        format!("reservation on {to} was refused at commit time"),
                    ),
                }
            }
            None => {
                warn!(task = %task, node = %from, "no node available to take rescheduled task");
                decision
            }
        };

        self.events.push_back(SchedulerEvent::Decision(decision.clone()));
        Ok(decision)
    }

    /// Reschedule every task on `node` away from it and stop placing new work
    /// there until it reports healthy again.
    pub fn handle_node_at_risk(&mut self, node: NodeId) -> Result<Vec<SchedulingDecision>> {
        self.registry.set_health(node, false)?;
        let hosted: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|i| i.status.holds_reservation() && i.assigned_node == Some(node))
            .map(|i| i.id)
            .collect();
        warn!(node = %node, tasks = hosted.len(), "node at risk; moving its tasks");

        let mut decisions = Vec::with_capacity(hosted.len());
        for task in hosted {
            decisions.push(self.reschedule_task(task, Some(node))?);
        }
        Ok(decisions)
    }

    /// Reserve on `to`, release on `from`, reassign. Returns `None` if `to`
    /// refused the reservation, in which case nothing changed.
    fn migrate(
        &mut self,
        task: TaskId,
        from: NodeId,
        to: NodeId,
        improvement: f64,
    ) -> Result<Option<Migration>> {
        let req = self.task(task)?.requirements;
        if !self.registry.try_reserve(to, &req)? {
            debug!(task = %task, to = %to, "migration target refused reservation");
            return Ok(None);
        }
        match self.registry.release(from, &req) {
            Ok(()) | Err(MemdagError::NodeNotFound(_)) => {}
            Err(e) => {
                self.registry.release(to, &req)?;
                return Err(e);
            }
        }

        if let Some(info) = self.tasks.get_mut(&task) {
            info.assigned_node = Some(to);
        }
        self.stats.migrations += 1;

        let migration = Migration {
            task,
            from,
            to,
            improvement,
        };
        info!(task = %task, from = %from, to = %to, improvement, "task migrated");
        self.events.push_back(SchedulerEvent::Migrated(migration));
        Ok(Some(migration))
    }

    // ----- completion, failure, cancellation --------------------------------

    /// Running → Completed. Releases the reservation and returns the
    /// dependents that became Ready.
    pub fn handle_task_completion(&mut self, task: TaskId) -> Result<Vec<TaskId>> {
        let info = self.task(task)?;
        if info.status != TaskStatus::Running {
            return Err(MemdagError::InvalidTransition {
                task,
                from: info.status,
                to: TaskStatus::Completed,
            });
        }
        let dependents = info.dependents.clone();

        self.release_reservation(task)?;
        self.state().transition(task, TaskStatus::Completed)?;
        if let Some(info) = self.tasks.get_mut(&task) {
            info.finished_at = Some(Instant::now());
            if let Some(ms) = info.execution_time_ms() {
                self.stats.execution_time_ms_sum += ms;
                self.stats.timed_completions += 1;
            }
        }
        info!(task = %task, "task completed");

        Ok(self.promote(dependents))
    }

    /// Executor report that `attempt` of `task` finished.
    ///
    /// Reports for an earlier attempt (the run was evicted and dispatched
    /// again) or for a task that is not Running are `StaleReport`s and
    /// change nothing.
    pub fn report_completion(&mut self, task: TaskId, attempt: u32) -> Result<Vec<TaskId>> {
        self.check_attempt(task, attempt)?;
        self.handle_task_completion(task)
    }

    /// Executor report that `attempt` of `task` failed. Same staleness rules
    /// as [`report_completion`](Self::report_completion).
    pub fn report_failure(&mut self, task: TaskId, attempt: u32) -> Result<Vec<TaskId>> {
        self.check_attempt(task, attempt)?;
        self.handle_task_failure(task)
    }

    fn check_attempt(&self, task: TaskId, attempt: u32) -> Result<()> {
        let info = self.task(task)?;
        if info.status != TaskStatus::Running || info.attempt != attempt {
            return Err(MemdagError::StaleReport { task, attempt });
        }
        Ok(())
    }

    /// Scheduled/Running → Failed. Releases the reservation and returns the
    /// transitive dependents newly marked Blocked.
    pub fn handle_task_failure(&mut self, task: TaskId) -> Result<Vec<TaskId>> {
        let info = self.task(task)?;
        if !info.status.holds_reservation() {
            return Err(MemdagError::InvalidTransition {
                task,
                from: info.status,
                to: TaskStatus::Failed,
            });
        }

        self.release_reservation(task)?;
        self.state().transition(task, TaskStatus::Failed)?;
        self.queue.remove(task);
        if let Some(info) = self.tasks.get_mut(&task) {
            info.assigned_node = None;
            info.finished_at = Some(Instant::now());
        }
        warn!(task = %task, "task failed; blocking dependents");

        Ok(self.block_from(task))
    }

    /// Cancel a task that has not finished.
    ///
    /// Any reservation is released and the task leaves both queues. Its
    /// transitive dependents become Blocked, which are returned. A Running
    /// task is stopped by the caller; here it is handled like a failure with
    /// a final status of Cancelled.
    pub fn cancel_task(&mut self, task: TaskId) -> Result<Vec<TaskId>> {
        let info = self.task(task)?;
        if info.status.is_terminal() {
            return Err(MemdagError::InvalidTransition {
                task,
                from: info.status,
                to: TaskStatus::Cancelled,
            });
        }
        let was_running = info.status == TaskStatus::Running;

        if info.status.holds_reservation() {
            self.release_reservation(task)?;
        }
        self.state().transition(task, TaskStatus::Cancelled)?;
        self.queue.remove(task);
        if let Some(info) = self.tasks.get_mut(&task) {
            info.assigned_node = None;
            info.finished_at = Some(Instant::now());
        }
        info!(task = %task, was_running, "task cancelled");

        Ok(self.block_from(task))
    }

    /// Failed → Pending. Dependents blocked only by this task return to
    /// Pending. Returns every task that is Ready afterwards as a result.
    pub fn retry_task(&mut self, task: TaskId) -> Result<Vec<TaskId>> {
        let info = self.task(task)?;
        if info.status != TaskStatus::Failed {
            return Err(MemdagError::InvalidTransition {
                task,
                from: info.status,
                to: TaskStatus::Pending,
            });
        }

        self.state().transition(task, TaskStatus::Pending)?;
        if let Some(info) = self.tasks.get_mut(&task) {
            info.started_at = None;
            info.finished_at = None;
        }
        let released = self.state().unblock_dependents(task);
        info!(task = %task, unblocked = released.len(), "task retried");

        Ok(self.promote(std::iter::once(task).chain(released)))
    }

    // ----- cluster changes --------------------------------------------------

    /// Register a node that joined the cluster.
    pub fn join_node(&mut self, node: NodeId, capacity: NodeCapacity) -> Result<()> {
        self.registry.add_node(node, capacity)
    }

    /// Remove `node` from the cluster. Tasks holding a reservation on it go
    /// back to Ready and are returned; the caller stops any that were running.
    pub fn evict_node(&mut self, node: NodeId) -> Result<Vec<TaskId>> {
        self.registry.remove_node(node)?;

        let stranded: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|i| i.status.holds_reservation() && i.assigned_node == Some(node))
            .map(|i| i.id)
            .collect();

        for &task in &stranded {
            self.queue.remove(task);
            self.state().transition(task, TaskStatus::Ready)?;
            if let Some(info) = self.tasks.get_mut(&task) {
                info.assigned_node = None;
                info.started_at = None;
            }
            self.queue.push_ready(task);
        }
        if !stranded.is_empty() {
            warn!(node = %node, requeued = ?stranded, "evicted node had tasks; requeued");
        }
        Ok(stranded)
    }

    pub fn set_node_health(&mut self, node: NodeId, healthy: bool) -> Result<()> {
        self.registry.set_health(node, healthy)
    }

    // ----- task feedback ----------------------------------------------------

    /// Override the execution priority of `task`, e.g. from an external
    /// policy service.
    pub fn set_execution_priority(&mut self, task: TaskId, priority: f64) -> Result<()> {
        self.analyzer.set_execution_priority(task, priority)?;
        debug!(task = %task, priority, "execution priority set");
        Ok(())
    }

    /// Feed an observed memory sample for `task` into its profile.
    pub fn record_memory_sample(&mut self, task: TaskId, gb: f64) -> Result<()> {
        self.analyzer.record_memory_sample(task, gb)
    }

    // ----- queries ----------------------------------------------------------

    pub fn status_of(&self, task: TaskId) -> Option<TaskStatus> {
        self.tasks.get(&task).map(|i| i.status)
    }

    pub fn task_info(&self, task: TaskId) -> Option<&TaskInfo> {
        self.tasks.get(&task)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskInfo> {
        self.tasks.values()
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<TaskId> {
        ReadOnlyStateManager::new(&self.tasks).with_status(status)
    }

    /// Blocked tasks with the failed or cancelled tasks responsible.
    pub fn blocked_tasks(&self) -> Vec<(TaskId, Vec<TaskId>)> {
        self.tasks
            .values()
            .filter(|i| i.status == TaskStatus::Blocked)
            .map(|i| (i.id, i.blocked_by.iter().copied().collect()))
            .collect()
    }

    /// Whether the dependencies of `task` are all completed. `None` for an
    /// unknown task.
    pub fn deps_satisfied(&self, task: TaskId) -> Option<bool> {
        let info = self.tasks.get(&task)?;
        Some(ReadOnlyStateManager::new(&self.tasks).deps_satisfied_for_info(info))
    }

    /// Memory pressure of `task` against the largest node in the cluster.
    pub fn memory_pressure(&self, task: TaskId) -> Result<f64> {
        self.analyzer
            .memory_pressure(task, self.registry.largest_memory_gb(), |t| self.is_completed(t))
    }

    pub fn memory_critical_tasks(&self, threshold: f64) -> Result<Vec<(TaskId, f64)>> {
        self.analyzer.memory_critical_tasks(
            self.registry.largest_memory_gb(),
            threshold,
            |t| self.is_completed(t),
        )
    }

    pub fn node_metrics(&self, task: TaskId) -> Result<DagNodeMetrics> {
        self.analyzer
            .node_metrics(task, self.registry.largest_memory_gb(), |t| self.is_completed(t))
    }

    /// Fraction of tasks Completed; 1.0 for an empty DAG.
    pub fn execution_progress(&self) -> f64 {
        if self.tasks.is_empty() {
            return 1.0;
        }
        let done = ReadOnlyStateManager::new(&self.tasks).count(TaskStatus::Completed);
        done as f64 / self.tasks.len() as f64
    }

    /// Mean memory score of every committed placement; 0.0 before the first.
    pub fn memory_efficiency(&self) -> f64 {
        if self.stats.placements == 0 {
            return 0.0;
        }
        self.stats.memory_score_sum / self.stats.placements as f64
    }

    pub fn average_execution_time_ms(&self) -> f64 {
        if self.stats.timed_completions == 0 {
            return 0.0;
        }
        self.stats.execution_time_ms_sum / self.stats.timed_completions as f64
    }

    /// Mean wall time of the placement passes that had a ready task to
    /// place; 0.0 before the first.
    pub fn average_scheduling_time_ms(&self) -> f64 {
        if self.stats.scheduling_passes == 0 {
            return 0.0;
        }
        self.stats.scheduling_time_ms_sum / self.stats.scheduling_passes as f64
    }

    /// True while any task holds a reservation.
    pub fn has_work_in_flight(&self) -> bool {
        self.tasks.values().any(|i| i.status.holds_reservation())
    }

    /// True once every task is terminal or Blocked.
    pub fn is_settled(&self) -> bool {
        ReadOnlyStateManager::new(&self.tasks).all_tasks_settled()
    }

    pub fn report(&self) -> SchedulerReport {
        let ro = ReadOnlyStateManager::new(&self.tasks);
        SchedulerReport {
            total_tasks: self.tasks.len(),
            pending: ro.count(TaskStatus::Pending),
            ready: ro.count(TaskStatus::Ready),
            scheduled: ro.count(TaskStatus::Scheduled),
            running: ro.count(TaskStatus::Running),
            completed: ro.count(TaskStatus::Completed),
            failed: ro.count(TaskStatus::Failed),
            cancelled: ro.count(TaskStatus::Cancelled),
            blocked: ro.count(TaskStatus::Blocked),
            placements: self.stats.placements,
            migrations: self.stats.migrations,
            execution_progress: self.execution_progress(),
            memory_efficiency: self.memory_efficiency(),
            average_execution_time_ms: self.average_execution_time_ms(),
            average_scheduling_time_ms: self.average_scheduling_time_ms(),
            cluster: self.registry.metrics(),
        }
    }

    /// One-line status summary.
    pub fn execution_status(&self) -> String {
        self.report().to_string()
    }

    /// Take every event recorded since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        self.events.drain(..).collect()
    }

    // ----- helpers ----------------------------------------------------------

    fn task(&self, task: TaskId) -> Result<&TaskInfo> {
        self.tasks.get(&task).ok_or(MemdagError::TaskNotFound(task))
    }

    fn is_completed(&self, task: TaskId) -> bool {
        self.status_of(task) == Some(TaskStatus::Completed)
    }

    fn state(&mut self) -> StateManager<'_> {
        StateManager::new(&mut self.tasks, &mut self.events)
    }

    /// Promote dependency-satisfied Pending tasks among `candidates` and
    /// queue them for placement.
    fn promote(&mut self, candidates: impl IntoIterator<Item = TaskId>) -> Vec<TaskId> {
        let ready = self.state().promote_ready(candidates);
        for &task in &ready {
            self.queue.push_ready(task);
        }
        ready
    }

    /// Every task reachable from `root` through dependents, `root` excluded.
    fn descendants(&self, root: TaskId) -> BTreeSet<TaskId> {
        let mut stack: Vec<TaskId> = self
            .tasks
            .get(&root)
            .map(|info| info.dependents.clone())
            .unwrap_or_default();
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(info) = self.tasks.get(&id) {
                stack.extend(info.dependents.iter().copied());
            }
        }
        seen
    }

    fn block_from(&mut self, root: TaskId) -> Vec<TaskId> {
        let blocked = self.state().block_dependents(root);
        for &task in &blocked {
            self.queue.remove(task);
        }
        if !blocked.is_empty() {
            warn!(root = %root, blocked = ?blocked, "dependents blocked");
        }
        blocked
    }

    /// Give back the reservation `task` holds. A node that was already evicted
    /// has nothing left to release.
    fn release_reservation(&mut self, task: TaskId) -> Result<()> {
        let info = self.task(task)?;
        let Some(node) = info.assigned_node else {
            return Ok(());
        };
        let req: ResourceRequirements = info.requirements;
        match self.registry.release(node, &req) {
            Ok(()) | Err(MemdagError::NodeNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Snapshots of nodes that could take `req` right now, minus `excluded`.
    fn candidate_nodes(&self, req: &ResourceRequirements, excluded: &[NodeId]) -> Result<Vec<Node>> {
        let ids = self.registry.available_nodes(req)?;
        Ok(ids
            .into_iter()
            .filter(|id| !excluded.contains(id))
            .filter_map(|id| self.registry.snapshot(id).ok())
            .collect())
    }

    /// Where every placed task lives, and which of them currently hold a
    /// reservation.
    fn placement_view(&self) -> (BTreeMap<TaskId, NodeId>, BTreeSet<TaskId>) {
        let mut locations = BTreeMap::new();
        let mut active = BTreeSet::new();
        for info in self.tasks.values() {
            if let Some(node) = info.assigned_node {
                locations.insert(info.id, node);
            }
            if info.status.holds_reservation() {
                active.insert(info.id);
            }
        }
        (locations, active)
    }
}

fn refresh_links(analyzer: &DagAnalyzer, info: &mut TaskInfo) {
    info.predecessors = analyzer
        .predecessors(info.id)
        .into_iter()
        .map(|p| (p, analyzer.edge(p, info.id).map(|e| e.kind).unwrap_or_default()))
        .collect();
    info.dependents = analyzer.dependents(info.id);
}
