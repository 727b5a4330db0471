//! The `ProcessingNode` trait — the contract every node must fulfil.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NodeError;
use crate::payload::{InvoiceRecord, Payload};

/// Coarse classification of a node, used for registry discovery and for the
/// engine's treatment of external resources (concurrency bounds, timeouts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Fetch,
    Calculation,
    Filter,
    Aggregation,
    Output,
}

impl NodeCategory {
    /// Fetch and output nodes talk to shared, potentially rate-limited
    /// collaborators; the engine bounds and times out their execution.
    pub fn touches_external(&self) -> bool {
        matches!(self, Self::Fetch | Self::Output)
    }
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fetch => "fetch",
            Self::Calculation => "calculation",
            Self::Filter => "filter",
            Self::Aggregation => "aggregation",
            Self::Output => "output",
        };
        f.write_str(s)
    }
}

/// Shared context passed to every node during execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the parent workflow.
    pub workflow_id: uuid::Uuid,
    /// ID of the current execution run.
    pub execution_id: uuid::Uuid,
}

/// The outputs of a node's direct upstreams, ordered by ascending node id
/// so repeated executions see identical input.
#[derive(Debug, Clone, Default)]
pub struct NodeInput {
    upstream: Vec<(String, Payload)>,
}

impl NodeInput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_upstream(mut upstream: Vec<(String, Payload)>) -> Self {
        upstream.sort_by(|a, b| a.0.cmp(&b.0));
        Self { upstream }
    }

    /// True when there is no upstream output, or every upstream payload is
    /// empty. This is what `required_upstream` nodes are skipped on.
    pub fn is_empty(&self) -> bool {
        self.upstream.iter().all(|(_, p)| p.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Payload)> {
        self.upstream.iter().map(|(id, p)| (id.as_str(), p))
    }

    /// The default merge policy: a single upstream passes through unchanged,
    /// multiple upstreams become a list in ascending node-id order.
    pub fn merged(&self) -> Payload {
        match self.upstream.len() {
            1 => self.upstream[0].1.clone(),
            _ => Payload::Many(self.upstream.iter().map(|(_, p)| p.clone()).collect()),
        }
    }

    /// Every invoice record reachable from any upstream payload.
    pub fn records(&self) -> Vec<InvoiceRecord> {
        let mut out = Vec::new();
        for (_, p) in &self.upstream {
            p.collect_records(&mut out);
        }
        out
    }
}

/// The core node trait.
///
/// A node consumes its upstream outputs and parameters, produces one
/// payload, and never raises uncaught: every failure mode is a
/// [`NodeError`] variant.
#[async_trait]
pub trait ProcessingNode: Send + Sync {
    fn category(&self) -> NodeCategory;

    async fn execute(
        &self,
        input: NodeInput,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError>;
}

/// Deserialize a node's params value into its typed param struct.
///
/// Absent params (`null`) mean defaults; anything malformed is a
/// [`NodeError::MalformedInput`].
pub fn parse_params<T>(params: &Value) -> Result<T, NodeError>
where
    T: DeserializeOwned + Default,
{
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).map_err(|e| NodeError::MalformedInput(e.to_string()))
}
