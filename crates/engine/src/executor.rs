//! Workflow orchestrator.
//!
//! `Orchestrator` runs one validated graph per call:
//! 1. Validates the DAG against the registry and persists the execution
//!    record (best-effort).
//! 2. Schedules nodes off a dependency-counted ready heap: a node starts
//!    only once every direct upstream has settled, and simultaneously-ready
//!    nodes start in ascending node-id order.
//! 3. Independent nodes run concurrently on tokio tasks; fetch/output nodes
//!    are bounded by a semaphore and an injected timeout, and retryable
//!    provider errors back off exponentially.
//! 4. A failed node never aborts the run: its dependants are skipped and
//!    independent branches continue. Cancellation is honoured between node
//!    boundaries.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use nodes::{
    ExecutionContext, NodeCategory, NodeError, NodeInput, NodeRegistry, Payload, ProcessingNode,
};

use crate::dag;
use crate::error::EngineError;
use crate::log::{ExecutionLog, LogEntry};
use crate::models::{
    ExecutionRecord, ExecutionStatus, NodeOutcome, NodeResult, NodeStatus, WorkflowGraph,
};
use crate::state::ExecutionState;
use crate::store::ExecutionStore;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What happens to the rest of the graph when a node fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Skip the failed node's dependants; independent branches continue.
    CascadeSkip,
    /// Stop scheduling new nodes after the first failure.
    AbortAll,
}

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Bound on simultaneously in-flight fetch/output nodes, protecting
    /// rate-limited collaborators.
    pub max_parallel_nodes: usize,
    /// Maximum number of times a retryable node failure will be retried.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub retry_base_delay: Duration,
    /// Timeout applied to each fetch/output attempt.
    pub external_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 4,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            external_timeout: Duration::from_secs(30),
            failure_policy: FailurePolicy::CascadeSkip,
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cloneable handle to cancel an execution between node boundaries.
///
/// Already-completed node results are kept; in-flight nodes finish; nodes
/// that have not started are marked skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Output of a completed execution
// ---------------------------------------------------------------------------

/// The result of running a full workflow: the terminal record plus the
/// audit log.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub record: ExecutionRecord,
    pub log: ExecutionLog,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Stateless orchestrator that runs one workflow execution per call.
pub struct Orchestrator {
    registry: Arc<NodeRegistry>,
    store: Arc<dyn ExecutionStore>,
    config: ExecutorConfig,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<NodeRegistry>,
        store: Arc<dyn ExecutionStore>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    /// Run the workflow to a terminal execution record.
    ///
    /// # Errors
    /// [`EngineError::Validation`] if the graph is malformed, returned
    /// before any node executes and before a record is created.
    pub async fn run(&self, graph: &WorkflowGraph) -> Result<ExecutionOutcome, EngineError> {
        self.run_with_cancel(graph, CancelFlag::new()).await
    }

    /// Run the workflow with an external cancellation handle.
    #[instrument(skip_all, fields(workflow_id = %graph.id))]
    pub async fn run_with_cancel(
        &self,
        graph: &WorkflowGraph,
        cancel: CancelFlag,
    ) -> Result<ExecutionOutcome, EngineError> {
        let order = dag::validate(graph, &self.registry)?;
        info!(nodes = order.len(), "graph validated");

        let mut record = ExecutionRecord::new(graph.id);
        record.status = ExecutionStatus::Executing;
        if let Err(err) = self.store.record_started(&record).await {
            warn!(error = %err, "could not persist execution start; continuing");
        }

        let ctx = Arc::new(ExecutionContext {
            workflow_id: graph.id,
            execution_id: record.id,
        });

        // ------------------------------------------------------------------
        // Adjacency and dependency counts.
        // ------------------------------------------------------------------
        let node_map: HashMap<&str, _> = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut upstream_of: HashMap<String, Vec<String>> = HashMap::new();
        let mut downstream_of: HashMap<String, Vec<String>> = HashMap::new();
        let mut pending_upstreams: HashMap<String, usize> = HashMap::new();
        for spec in &graph.nodes {
            upstream_of.entry(spec.id.clone()).or_default();
            downstream_of.entry(spec.id.clone()).or_default();
            pending_upstreams.entry(spec.id.clone()).or_insert(0);
        }
        for edge in &graph.edges {
            upstream_of
                .entry(edge.target.clone())
                .or_default()
                .push(edge.source.clone());
            downstream_of
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
            *pending_upstreams.entry(edge.target.clone()).or_insert(0) += 1;
        }
        for list in upstream_of.values_mut() {
            list.sort();
        }

        // ------------------------------------------------------------------
        // Coordinator loop: single owner of state, results and statuses.
        // ------------------------------------------------------------------
        let mut ready: BinaryHeap<Reverse<String>> = pending_upstreams
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(id, _)| Reverse(id.clone()))
            .collect();

        let mut state = ExecutionState::new();
        let mut log = ExecutionLog::new();
        let mut statuses: HashMap<String, NodeStatus> = HashMap::new();
        let mut results: HashMap<String, NodeResult> = HashMap::new();
        let mut join_set: JoinSet<(String, DateTime<Utc>, Option<Payload>, NodeResult)> =
            JoinSet::new();
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_nodes.max(1)));
        let mut halted = false;
        let mut cancelled = false;

        loop {
            if cancel.is_cancelled() && !cancelled {
                cancelled = true;
                halted = true;
                info!("cancellation requested; no further nodes will start");
            }

            if !halted {
                while let Some(Reverse(node_id)) = ready.pop() {
                    if halted {
                        ready.push(Reverse(node_id));
                        break;
                    }
                    let spec = node_map[node_id.as_str()];
                    let upstreams = &upstream_of[&node_id];

                    let any_failed = upstreams
                        .iter()
                        .any(|u| statuses.get(u) == Some(&NodeStatus::Failed));
                    let all_skipped = !upstreams.is_empty()
                        && upstreams
                            .iter()
                            .all(|u| statuses.get(u) == Some(&NodeStatus::Skipped));
                    if any_failed || all_skipped {
                        info!(node = %node_id, "skipping: upstream failed or skipped");
                        let result = NodeResult::skipped();
                        log.append(settled_entry(&node_id, &spec.params, &result));
                        settle(
                            &node_id,
                            NodeStatus::Skipped,
                            &mut statuses,
                            &downstream_of,
                            &mut pending_upstreams,
                            &mut ready,
                        );
                        results.insert(node_id, result);
                        continue;
                    }

                    let input = NodeInput::from_upstream(
                        upstreams
                            .iter()
                            .filter(|u| statuses.get(*u) == Some(&NodeStatus::Success))
                            .filter_map(|u| state.get(u).map(|p| (u.clone(), p.clone())))
                            .collect(),
                    );

                    let required_upstream = spec
                        .params
                        .get("required_upstream")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    if required_upstream && input.is_empty() {
                        info!(node = %node_id, "skipping: required upstream output is empty");
                        let result = NodeResult::skipped();
                        log.append(settled_entry(&node_id, &spec.params, &result));
                        settle(
                            &node_id,
                            NodeStatus::Skipped,
                            &mut statuses,
                            &downstream_of,
                            &mut pending_upstreams,
                            &mut ready,
                        );
                        results.insert(node_id, result);
                        continue;
                    }

                    match self.registry.instantiate(&spec.node_type) {
                        Ok(node) => {
                            let category = node.category();
                            let params = spec.params.clone();
                            let ctx = ctx.clone();
                            let semaphore = semaphore.clone();
                            let config = self.config.clone();
                            let id = node_id.clone();
                            join_set.spawn(async move {
                                let started_at = Utc::now();
                                let input_view = input.merged();
                                let result =
                                    run_node(node, category, input, &params, ctx, semaphore, config)
                                        .await;
                                (id, started_at, Some(input_view), result)
                            });
                        }
                        Err(err) => {
                            let node_err = NodeError::Fatal(err.to_string());
                            let result = NodeResult::failed(&node_err, Duration::ZERO);
                            error!(node = %node_id, error = %node_err, "could not instantiate node");
                            log.append(settled_entry(&node_id, &spec.params, &result));
                            if self.config.failure_policy == FailurePolicy::AbortAll {
                                halted = true;
                            }
                            settle(
                                &node_id,
                                NodeStatus::Failed,
                                &mut statuses,
                                &downstream_of,
                                &mut pending_upstreams,
                                &mut ready,
                            );
                            results.insert(node_id, result);
                        }
                    }
                }
            }

            match join_set.join_next().await {
                None => break,
                Some(Ok((node_id, started_at, input_view, result))) => {
                    let params = node_map[node_id.as_str()].params.clone();
                    log.append(LogEntry {
                        sequence: 0,
                        node_id: node_id.clone(),
                        status: result.status,
                        started_at,
                        duration: result.duration,
                        params,
                        input: input_view,
                        output: result.output.clone(),
                        error: result.error.clone(),
                    });

                    match result.status {
                        NodeStatus::Success => {
                            if let Some(output) = &result.output {
                                state.insert(&node_id, output.clone());
                            }
                            info!(node = %node_id, ms = result.duration.as_millis() as u64, "node succeeded");
                        }
                        _ => {
                            error!(node = %node_id, error = ?result.error, "node failed");
                            if self.config.failure_policy == FailurePolicy::AbortAll {
                                halted = true;
                            }
                        }
                    }

                    settle(
                        &node_id,
                        result.status,
                        &mut statuses,
                        &downstream_of,
                        &mut pending_upstreams,
                        &mut ready,
                    );
                    results.insert(node_id, result);
                }
                Some(Err(join_err)) => {
                    return Err(EngineError::TaskJoin(join_err.to_string()));
                }
            }
        }

        // Anything never scheduled (cancellation, abort) ends up skipped.
        for spec in &graph.nodes {
            if !statuses.contains_key(&spec.id) {
                statuses.insert(spec.id.clone(), NodeStatus::Skipped);
                results.insert(spec.id.clone(), NodeResult::skipped());
            }
        }

        // ------------------------------------------------------------------
        // Terminal status and aggregation.
        // ------------------------------------------------------------------
        let sinks: Vec<&String> = graph
            .nodes
            .iter()
            .map(|s| &s.id)
            .filter(|id| downstream_of.get(*id).is_none_or(|d| d.is_empty()))
            .collect();
        let every_sink_succeeded = sinks
            .iter()
            .all(|id| statuses.get(*id) == Some(&NodeStatus::Success));

        record.status = if cancelled {
            ExecutionStatus::Cancelled
        } else if every_sink_succeeded {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        record.completed_at = Some(Utc::now());
        record.node_results = order
            .iter()
            .map(|id| NodeOutcome {
                node_id: id.clone(),
                result: results.remove(id).unwrap_or_else(NodeResult::skipped),
            })
            .collect();
        record.aggregated_output = aggregate_outputs(graph, &self.registry, &order, &sinks, &state);

        if let Err(err) = self.store.record_finished(&record, &log).await {
            warn!(error = %err, "could not persist terminal execution record");
        }
        info!(status = %record.status, "execution finished");

        Ok(ExecutionOutcome { record, log })
    }
}

/// Record a node's terminal status and release any dependants whose last
/// pending upstream this was.
fn settle(
    node_id: &str,
    status: NodeStatus,
    statuses: &mut HashMap<String, NodeStatus>,
    downstream_of: &HashMap<String, Vec<String>>,
    pending_upstreams: &mut HashMap<String, usize>,
    ready: &mut BinaryHeap<Reverse<String>>,
) {
    statuses.insert(node_id.to_owned(), status);
    if let Some(children) = downstream_of.get(node_id) {
        for child in children {
            if let Some(count) = pending_upstreams.get_mut(child) {
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse(child.clone()));
                }
            }
        }
    }
}

/// Log entry for a node settled without running (skipped, or failed before
/// dispatch).
fn settled_entry(node_id: &str, params: &Value, result: &NodeResult) -> LogEntry {
    LogEntry {
        sequence: 0,
        node_id: node_id.to_owned(),
        status: result.status,
        started_at: Utc::now(),
        duration: Duration::ZERO,
        params: params.clone(),
        input: None,
        output: None,
        error: result.error.clone(),
    }
}

/// The final aggregated output: the outputs of all output nodes in
/// execution order, falling back to sink nodes for graphs with no explicit
/// output node.
fn aggregate_outputs(
    graph: &WorkflowGraph,
    registry: &NodeRegistry,
    order: &[String],
    sinks: &[&String],
    state: &ExecutionState,
) -> Option<Payload> {
    let is_output = |id: &str| -> bool {
        graph
            .node(id)
            .and_then(|spec| registry.category_of(&spec.node_type).ok())
            == Some(NodeCategory::Output)
    };

    let mut chosen: Vec<&String> = order.iter().filter(|id| is_output(id.as_str())).collect();
    if chosen.is_empty() {
        chosen = order.iter().filter(|id| sinks.contains(id)).collect();
    }

    let mut outputs: Vec<Payload> = chosen
        .into_iter()
        .filter_map(|id| state.get(id).cloned())
        .collect();
    match outputs.len() {
        0 => None,
        1 => outputs.pop(),
        _ => Some(Payload::Many(outputs)),
    }
}

/// Run a single node to a terminal `NodeResult`, applying the external
/// concurrency bound, the injected timeout, and retry with back-off.
async fn run_node(
    node: Arc<dyn ProcessingNode>,
    category: NodeCategory,
    input: NodeInput,
    params: &Value,
    ctx: Arc<ExecutionContext>,
    semaphore: Arc<Semaphore>,
    config: ExecutorConfig,
) -> NodeResult {
    let _permit = if category.touches_external() {
        match semaphore.acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                let err = NodeError::Fatal("executor semaphore closed".into());
                return NodeResult::failed(&err, Duration::ZERO);
            }
        }
    } else {
        None
    };

    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        let attempt = node.execute(input.clone(), params, &ctx);
        let outcome = if category.touches_external() {
            match tokio::time::timeout(config.external_timeout, attempt).await {
                Ok(result) => result,
                Err(_) => Err(NodeError::Timeout(config.external_timeout)),
            }
        } else {
            attempt.await
        };

        match outcome {
            Ok(output) => return NodeResult::success(output, started.elapsed()),

            Err(err) if err.is_retryable() && attempts < config.max_retries => {
                attempts += 1;
                let delay = config.retry_base_delay * 2u32.pow(attempts.saturating_sub(1));
                warn!(
                    attempt = attempts,
                    max = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retryable node error; backing off"
                );
                tokio::time::sleep(delay).await;
            }

            Err(err) => return NodeResult::failed(&err, started.elapsed()),
        }
    }
}
