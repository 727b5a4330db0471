//! Integration tests for the orchestrator.
//!
//! These run real node implementations against in-memory collaborators:
//! no database, no live rate feed, no renderer service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use calc::{Currency, FixedRateTable};
use nodes::collab::{InMemoryInvoices, InMemoryRenderer};
use nodes::mock::MockNode;
use nodes::{
    ExecutionContext, InvoiceCategory, InvoiceRecord, NodeCategory, NodeError, NodeInput,
    NodeRegistry, Payload, ProcessingNode,
};

use crate::executor::{CancelFlag, ExecutionOutcome, ExecutorConfig, FailurePolicy, Orchestrator};
use crate::log::ExecutionLog;
use crate::models::{Edge, ExecutionRecord, ExecutionStatus, NodeSpec, NodeStatus, WorkflowGraph};
use crate::store::{ExecutionStore, InMemoryStore, NoopStore, StoreError};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn invoice(id: &str, date: NaiveDate, total: Decimal) -> InvoiceRecord {
    InvoiceRecord {
        id: id.into(),
        invoice_number: format!("INV-{id}"),
        category: InvoiceCategory::Sales,
        company_id: None,
        entity_id: None,
        entity_name: None,
        invoice_date: date,
        due_date: None,
        currency: Currency::new("INR"),
        subtotal: total,
        tax: dec!(0),
        total,
        paid: dec!(0),
        outstanding: total,
        aging_days: None,
        overdue_days: None,
        aging_bucket: None,
        payment_state: None,
    }
}

/// 100 invoices whose ages as of 2024-12-31 cycle through 5, 35, 65 and 95
/// days, 25 per default aging bucket.
fn hundred_invoices() -> Vec<InvoiceRecord> {
    let as_of = d(2024, 12, 31);
    (0..100)
        .map(|i| {
            let age = [5i64, 35, 65, 95][i % 4];
            invoice(
                &format!("inv-{i:03}"),
                as_of - chrono::Duration::days(age),
                dec!(100),
            )
        })
        .collect()
}

fn builtin_registry(records: Vec<InvoiceRecord>) -> Arc<NodeRegistry> {
    Arc::new(NodeRegistry::with_builtins(
        Arc::new(InMemoryInvoices::new(records)),
        Arc::new(FixedRateTable::new().with_rate("USD", "INR", dec!(83.0))),
        InMemoryRenderer::new(),
    ))
}

fn orchestrator(registry: Arc<NodeRegistry>) -> Orchestrator {
    Orchestrator::new(registry, Arc::new(NoopStore), ExecutorConfig::default())
}

fn mock_registry(mocks: Vec<(&str, Arc<MockNode>)>) -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    for (key, mock) in mocks {
        registry
            .register(
                key,
                Arc::new(move || mock.clone() as Arc<dyn ProcessingNode>),
            )
            .unwrap();
    }
    Arc::new(registry)
}

fn status_of(record: &ExecutionRecord, node_id: &str) -> NodeStatus {
    record.result_for(node_id).expect("node result missing").status
}

// ============================================================
// Full pipeline: fetch -> aging -> group -> summary
// ============================================================

fn aging_report_graph() -> WorkflowGraph {
    WorkflowGraph::new(
        "ar-aging",
        vec![
            NodeSpec::new("1_fetch", "invoice_fetch").with_params(json!({ "category": "sales" })),
            NodeSpec::new("2_aging", "aging").with_params(json!({ "as_of_date": "2024-12-31" })),
            NodeSpec::new("3_group", "group_by").with_params(json!({ "group_by": "aging_bucket" })),
            NodeSpec::new("4_summary", "summary"),
        ],
        vec![
            Edge::new("1_fetch", "2_aging"),
            Edge::new("2_aging", "3_group"),
            Edge::new("3_group", "4_summary"),
        ],
    )
}

#[tokio::test]
async fn aging_pipeline_buckets_one_hundred_invoices() {
    let orchestrator = orchestrator(builtin_registry(hundred_invoices()));
    let graph = aging_report_graph();

    let ExecutionOutcome { record, log } = orchestrator.run(&graph).await.unwrap();

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.node_results.len(), 4);
    assert!(record
        .node_results
        .iter()
        .all(|o| o.result.status == NodeStatus::Success));

    // Grouping put 25 invoices into each of the four default buckets.
    let group_output = record
        .result_for("3_group")
        .and_then(|r| r.output.as_ref())
        .expect("group output");
    match group_output {
        Payload::Groups(groups) => {
            let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
            assert_eq!(keys, vec!["0-30", "30-60", "60-90", "90+"]);
            assert!(groups.iter().all(|g| g.count == 25));
            assert!(groups.iter().all(|g| g.total_amount == dec!(2500)));
        }
        other => panic!("unexpected group output: {other:?}"),
    }

    // The summary is the sink, so it is also the aggregated output.
    match record.aggregated_output.as_ref().expect("aggregated output") {
        Payload::Summary(summary) => {
            assert_eq!(summary.count, 100);
            assert_eq!(summary.total_amount, dec!(10000));
            assert_eq!(summary.group_count, Some(4));
        }
        other => panic!("unexpected aggregated output: {other:?}"),
    }

    // One log entry per node, sequenced in completion order.
    assert_eq!(log.len(), 4);
    let sequences: Vec<usize> = log.entries().iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn four_invoices_land_in_four_buckets() {
    let as_of = d(2024, 12, 31);
    let records = [5i64, 35, 65, 95]
        .iter()
        .enumerate()
        .map(|(i, &age)| invoice(&format!("i{i}"), as_of - chrono::Duration::days(age), dec!(1)))
        .collect();
    let orchestrator = orchestrator(builtin_registry(records));

    let graph = WorkflowGraph::new(
        "buckets",
        vec![
            NodeSpec::new("1_fetch", "invoice_fetch"),
            NodeSpec::new("2_aging", "aging").with_params(json!({ "as_of_date": "2024-12-31" })),
        ],
        vec![Edge::new("1_fetch", "2_aging")],
    );
    let outcome = orchestrator.run(&graph).await.unwrap();

    match outcome.record.aggregated_output.expect("output") {
        Payload::Records(v) => {
            let buckets: Vec<&str> = v.iter().map(|r| r.aging_bucket.as_deref().unwrap()).collect();
            assert_eq!(buckets, vec!["0-30", "30-60", "60-90", "90+"]);
        }
        other => panic!("unexpected output: {other:?}"),
    }
}

#[tokio::test]
async fn rerunning_the_same_graph_is_deterministic() {
    let registry = builtin_registry(hundred_invoices());
    let orchestrator = orchestrator(registry);
    let graph = aging_report_graph();

    let first = orchestrator.run(&graph).await.unwrap();
    let second = orchestrator.run(&graph).await.unwrap();

    assert_eq!(
        first.record.aggregated_output,
        second.record.aggregated_output
    );
}

// ============================================================
// Validation failures
// ============================================================

#[tokio::test]
async fn cyclic_graph_fails_validation_with_zero_nodes_executed() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = Orchestrator::new(
        builtin_registry(vec![]),
        store.clone(),
        ExecutorConfig::default(),
    );

    let mut graph = aging_report_graph();
    graph.edges.push(Edge::new("4_summary", "1_fetch"));

    let err = orchestrator.run(&graph).await.unwrap_err();
    assert!(matches!(
        err,
        crate::error::EngineError::Validation(crate::dag::ValidationError::CycleDetected)
    ));

    // Nothing was started, nothing persisted.
    assert_eq!(store.started_count(), 0);
    assert!(store.finished_records().is_empty());
}

// ============================================================
// Partial failure and cascading skip
// ============================================================

/// Diamond with an extra independent leaf:
///
///   a ──> b(fails) ──> d
///    \──> c ─────────/
///    \──> e
fn cascade_fixture() -> (Arc<MockNode>, Arc<NodeRegistry>, WorkflowGraph) {
    let ok = |name: &str| {
        Arc::new(MockNode::returning(
            name,
            Payload::Records(vec![invoice("x", d(2024, 6, 1), dec!(10))]),
        ))
    };
    let boom = Arc::new(MockNode::failing_fatal("boom", "bad parameters"));
    let d_node = ok("d");

    let registry = mock_registry(vec![
        ("ok_a", ok("a")),
        ("boom", boom),
        ("ok_c", ok("c")),
        ("ok_d", d_node.clone()),
        ("ok_e", ok("e")),
    ]);

    let graph = WorkflowGraph::new(
        "cascade",
        vec![
            NodeSpec::new("a", "ok_a"),
            NodeSpec::new("b", "boom"),
            NodeSpec::new("c", "ok_c"),
            NodeSpec::new("d", "ok_d"),
            NodeSpec::new("e", "ok_e"),
        ],
        vec![
            Edge::new("a", "b"),
            Edge::new("a", "c"),
            Edge::new("b", "d"),
            Edge::new("c", "d"),
            Edge::new("a", "e"),
        ],
    );
    (d_node, registry, graph)
}

#[tokio::test]
async fn failed_node_skips_dependants_but_independent_branches_complete() {
    let (d_node, registry, graph) = cascade_fixture();
    let orchestrator = orchestrator(registry);

    let outcome = orchestrator.run(&graph).await.unwrap();
    let record = &outcome.record;

    assert_eq!(status_of(record, "a"), NodeStatus::Success);
    assert_eq!(status_of(record, "b"), NodeStatus::Failed);
    assert_eq!(status_of(record, "c"), NodeStatus::Success);
    assert_eq!(status_of(record, "d"), NodeStatus::Skipped);
    assert_eq!(status_of(record, "e"), NodeStatus::Success);

    // The skipped node was never executed.
    assert_eq!(d_node.call_count(), 0);

    // A sink was skipped, so the overall execution is failed.
    assert_eq!(record.status, ExecutionStatus::Failed);

    // The failure detail is preserved on the failed node.
    let failure = record.result_for("b").unwrap().error.as_ref().unwrap();
    assert!(failure.message.contains("bad parameters"));
}

#[tokio::test]
async fn abort_all_policy_stops_the_whole_run() {
    let (_d, registry, graph) = cascade_fixture();
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(NoopStore),
        ExecutorConfig {
            failure_policy: FailurePolicy::AbortAll,
            ..ExecutorConfig::default()
        },
    );

    let outcome = orchestrator.run(&graph).await.unwrap();
    assert_eq!(outcome.record.status, ExecutionStatus::Failed);
    // The failed node is recorded; everything not yet finished is skipped.
    assert_eq!(status_of(&outcome.record, "b"), NodeStatus::Failed);
    assert_eq!(status_of(&outcome.record, "d"), NodeStatus::Skipped);
}

#[tokio::test]
async fn required_upstream_with_empty_output_skips_transitively() {
    let empty = Arc::new(MockNode::returning("empty", Payload::Records(vec![])));
    let consumer = Arc::new(MockNode::returning(
        "consumer",
        Payload::Records(vec![invoice("x", d(2024, 6, 1), dec!(1))]),
    ));
    let tail = Arc::new(MockNode::returning("tail", Payload::Records(vec![])));

    let registry = mock_registry(vec![
        ("empty", empty),
        ("consumer", consumer.clone()),
        ("tail", tail.clone()),
    ]);
    let graph = WorkflowGraph::new(
        "required-upstream",
        vec![
            NodeSpec::new("a", "empty"),
            NodeSpec::new("b", "consumer").with_params(json!({ "required_upstream": true })),
            NodeSpec::new("c", "tail"),
        ],
        vec![Edge::new("a", "b"), Edge::new("b", "c")],
    );

    let outcome = orchestrator(registry).run(&graph).await.unwrap();
    let record = &outcome.record;

    assert_eq!(status_of(record, "a"), NodeStatus::Success);
    assert_eq!(status_of(record, "b"), NodeStatus::Skipped);
    assert_eq!(status_of(record, "c"), NodeStatus::Skipped);
    assert_eq!(consumer.call_count(), 0);
    assert_eq!(tail.call_count(), 0);
    assert_eq!(record.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn node_without_required_upstream_runs_on_empty_input() {
    let empty = Arc::new(MockNode::returning("empty", Payload::Records(vec![])));
    let consumer = Arc::new(MockNode::returning(
        "consumer",
        Payload::Records(vec![]),
    ));
    let registry = mock_registry(vec![("empty", empty), ("consumer", consumer.clone())]);

    let graph = WorkflowGraph::new(
        "empty-ok",
        vec![NodeSpec::new("a", "empty"), NodeSpec::new("b", "consumer")],
        vec![Edge::new("a", "b")],
    );
    let outcome = orchestrator(registry).run(&graph).await.unwrap();

    assert_eq!(outcome.record.status, ExecutionStatus::Completed);
    assert_eq!(consumer.call_count(), 1);
}

// ============================================================
// Retry
// ============================================================

#[tokio::test]
async fn retryable_provider_errors_are_retried_then_failed() {
    let flaky = Arc::new(
        MockNode::failing_retryable("flaky", "connection reset").with_category(NodeCategory::Fetch),
    );
    let registry = mock_registry(vec![("flaky", flaky.clone())]);
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(NoopStore),
        ExecutorConfig {
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1),
            ..ExecutorConfig::default()
        },
    );

    let graph = WorkflowGraph::new("flaky", vec![NodeSpec::new("f", "flaky")], vec![]);
    let outcome = orchestrator.run(&graph).await.unwrap();

    // Initial attempt plus two retries.
    assert_eq!(flaky.call_count(), 3);
    assert_eq!(status_of(&outcome.record, "f"), NodeStatus::Failed);
    assert_eq!(outcome.record.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn fatal_errors_are_not_retried() {
    let boom = Arc::new(MockNode::failing_fatal("boom", "no retry"));
    let registry = mock_registry(vec![("boom", boom.clone())]);
    let graph = WorkflowGraph::new("boom", vec![NodeSpec::new("b", "boom")], vec![]);

    let outcome = orchestrator(registry).run(&graph).await.unwrap();

    assert_eq!(boom.call_count(), 1);
    assert_eq!(outcome.record.status, ExecutionStatus::Failed);
}

// ============================================================
// Cancellation
// ============================================================

/// Node that requests cancellation of its own execution while running,
/// then succeeds. The orchestrator must honour the flag at the next node
/// boundary.
struct CancelDuringExecute {
    flag: CancelFlag,
}

#[async_trait]
impl ProcessingNode for CancelDuringExecute {
    fn category(&self) -> NodeCategory {
        NodeCategory::Calculation
    }

    async fn execute(
        &self,
        _input: NodeInput,
        _params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        self.flag.cancel();
        Ok(Payload::Records(vec![]))
    }
}

#[tokio::test]
async fn cancellation_between_node_boundaries() {
    let cancel = CancelFlag::new();
    let mut registry = NodeRegistry::new();
    let flag = cancel.clone();
    registry
        .register(
            "canceller",
            Arc::new(move || {
                Arc::new(CancelDuringExecute { flag: flag.clone() }) as Arc<dyn ProcessingNode>
            }),
        )
        .unwrap();
    let tail = Arc::new(MockNode::returning("tail", Payload::Records(vec![])));
    registry
        .register("tail", {
            let tail = tail.clone();
            Arc::new(move || tail.clone() as Arc<dyn ProcessingNode>)
        })
        .unwrap();

    let graph = WorkflowGraph::new(
        "cancel",
        vec![
            NodeSpec::new("n1", "canceller"),
            NodeSpec::new("n2", "tail"),
            NodeSpec::new("n3", "tail"),
        ],
        vec![Edge::new("n1", "n2"), Edge::new("n2", "n3")],
    );

    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        Arc::new(NoopStore),
        ExecutorConfig::default(),
    );
    let outcome = orchestrator
        .run_with_cancel(&graph, cancel)
        .await
        .unwrap();
    let record = &outcome.record;

    assert_eq!(record.status, ExecutionStatus::Cancelled);
    assert_eq!(status_of(record, "n1"), NodeStatus::Success);
    assert_eq!(status_of(record, "n2"), NodeStatus::Skipped);
    assert_eq!(status_of(record, "n3"), NodeStatus::Skipped);
    assert_eq!(tail.call_count(), 0);
}

// ============================================================
// Best-effort persistence
// ============================================================

struct FailingStore;

#[async_trait]
impl ExecutionStore for FailingStore {
    async fn record_started(&self, _record: &ExecutionRecord) -> Result<(), StoreError> {
        Err(StoreError("database unreachable".into()))
    }

    async fn record_finished(
        &self,
        _record: &ExecutionRecord,
        _log: &ExecutionLog,
    ) -> Result<(), StoreError> {
        Err(StoreError("database unreachable".into()))
    }
}

#[tokio::test]
async fn store_failures_never_fail_the_run() {
    let orchestrator = Orchestrator::new(
        builtin_registry(hundred_invoices()),
        Arc::new(FailingStore),
        ExecutorConfig::default(),
    );
    let outcome = orchestrator.run(&aging_report_graph()).await.unwrap();
    assert_eq!(outcome.record.status, ExecutionStatus::Completed);
}

// ============================================================
// Output nodes and aggregation
// ============================================================

#[tokio::test]
async fn output_node_renders_and_aggregation_uses_it() {
    let renderer = InMemoryRenderer::new();
    let registry = Arc::new(NodeRegistry::with_builtins(
        Arc::new(InMemoryInvoices::new(hundred_invoices())),
        Arc::new(FixedRateTable::new()),
        renderer.clone(),
    ));
    let orchestrator = orchestrator(registry);

    let graph = WorkflowGraph::new(
        "render",
        vec![
            NodeSpec::new("1_fetch", "invoice_fetch"),
            NodeSpec::new("2_summary", "summary"),
            NodeSpec::new("3_out", "report_output")
                .with_params(json!({ "branding": { "company_name": "acme" } })),
        ],
        vec![Edge::new("1_fetch", "2_summary"), Edge::new("2_summary", "3_out")],
    );

    let outcome = orchestrator.run(&graph).await.unwrap();
    assert_eq!(outcome.record.status, ExecutionStatus::Completed);
    assert_eq!(renderer.rendered_count(), 1);
    match outcome.record.aggregated_output.expect("aggregated output") {
        Payload::Artifact(artifact) => {
            assert_eq!(artifact.locator, "memory://reports/acme-summary.json");
        }
        other => panic!("unexpected aggregated output: {other:?}"),
    }
}

#[tokio::test]
async fn multiple_output_nodes_merge_in_graph_order() {
    let first = Arc::new(
        MockNode::returning("first", Payload::Records(vec![invoice("1", d(2024, 1, 1), dec!(1))]))
            .with_category(NodeCategory::Output),
    );
    let second = Arc::new(
        MockNode::returning("second", Payload::Records(vec![invoice("2", d(2024, 1, 1), dec!(2))]))
            .with_category(NodeCategory::Output),
    );
    let source = Arc::new(MockNode::returning("src", Payload::Records(vec![])));

    let registry = mock_registry(vec![
        ("src", source),
        ("out_first", first),
        ("out_second", second),
    ]);
    let graph = WorkflowGraph::new(
        "two-outputs",
        vec![
            NodeSpec::new("a_src", "src"),
            NodeSpec::new("x_out", "out_first"),
            NodeSpec::new("y_out", "out_second"),
        ],
        vec![Edge::new("a_src", "x_out"), Edge::new("a_src", "y_out")],
    );

    let outcome = orchestrator(registry).run(&graph).await.unwrap();
    match outcome.record.aggregated_output.expect("aggregated output") {
        Payload::Many(parts) => {
            assert_eq!(parts.len(), 2);
            match (&parts[0], &parts[1]) {
                (Payload::Records(a), Payload::Records(b)) => {
                    assert_eq!(a[0].id, "1");
                    assert_eq!(b[0].id, "2");
                }
                other => panic!("unexpected parts: {other:?}"),
            }
        }
        other => panic!("unexpected aggregated output: {other:?}"),
    }
}
