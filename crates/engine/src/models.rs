//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow graph and an
//! execution look like in memory. They serialise cleanly so the storage
//! collaborator can persist them as JSON documents.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use nodes::{NodeError, Payload};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// WorkflowGraph
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique identifier within this graph (referenced by edges).
    pub id: String,
    /// Maps to a registered node factory.
    pub node_type: String,
    /// Human-readable label.
    pub name: String,
    /// Configuration passed to the node at execution time.
    #[serde(default)]
    pub params: Value,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            node_type: node_type.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Directed edge: `target` must run after `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A complete workflow graph, produced by the external planner.
///
/// The orchestrator treats the graph as immutable (it only ever takes a
/// shared borrow) and re-validates it on every execution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub id: Uuid,
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<Edge>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowGraph {
    pub fn new(name: impl Into<String>, nodes: Vec<NodeSpec>, edges: Vec<Edge>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes,
            edges,
            created_at: Utc::now(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Replace the params of an existing node. Topology never changes.
    ///
    /// Mid-execution updates are impossible by construction: this requires
    /// `&mut self`, and an in-flight execution holds a shared borrow.
    ///
    /// # Errors
    /// [`EngineError::UnknownNode`] if `node_id` does not exist.
    pub fn update_node_params(&mut self, node_id: &str, params: Value) -> Result<(), EngineError> {
        match self.nodes.iter_mut().find(|n| n.id == node_id) {
            Some(node) => {
                node.params = params;
                Ok(())
            }
            None => Err(EngineError::UnknownNode(node_id.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution results
// ---------------------------------------------------------------------------

/// Status of a single node within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Success,
    Failed,
    Skipped,
}

/// What kind of failure a node reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Calculation,
    MissingField,
    MalformedInput,
    Provider,
    Timeout,
    Fatal,
}

/// Structured failure detail preserved on a failed node result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&NodeError> for NodeFailure {
    fn from(err: &NodeError) -> Self {
        let kind = match err {
            NodeError::Calculation(_) => FailureKind::Calculation,
            NodeError::MissingField(_) => FailureKind::MissingField,
            NodeError::MalformedInput(_) => FailureKind::MalformedInput,
            NodeError::Provider(_) => FailureKind::Provider,
            NodeError::Timeout(_) => FailureKind::Timeout,
            NodeError::Fatal(_) => FailureKind::Fatal,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Outcome of one node's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub status: NodeStatus,
    pub output: Option<Payload>,
    pub error: Option<NodeFailure>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl NodeResult {
    pub fn success(output: Payload, duration: Duration) -> Self {
        Self {
            status: NodeStatus::Success,
            output: Some(output),
            error: None,
            duration,
        }
    }

    pub fn failed(err: &NodeError, duration: Duration) -> Self {
        Self {
            status: NodeStatus::Failed,
            output: None,
            error: Some(NodeFailure::from(err)),
            duration,
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: NodeStatus::Skipped,
            output: None,
            error: None,
            duration: Duration::ZERO,
        }
    }
}

/// A node result keyed by its node id, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutcome {
    pub node_id: String,
    #[serde(flatten)]
    pub result: NodeResult,
}

// ---------------------------------------------------------------------------
// ExecutionRecord
// ---------------------------------------------------------------------------

/// Lifecycle of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Planned,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Planned => "planned",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// The full record of one execution, mutated only by the orchestrator and
/// terminal once status reaches completed/failed/cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub node_results: Vec<NodeOutcome>,
    pub aggregated_output: Option<Payload>,
}

impl ExecutionRecord {
    pub fn new(workflow_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            status: ExecutionStatus::Planned,
            started_at: Utc::now(),
            completed_at: None,
            node_results: Vec::new(),
            aggregated_output: None,
        }
    }

    pub fn result_for(&self, node_id: &str) -> Option<&NodeResult> {
        self.node_results
            .iter()
            .find(|o| o.node_id == node_id)
            .map(|o| &o.result)
    }
}

/// Serialize a `Duration` as integer milliseconds.
pub(crate) mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
