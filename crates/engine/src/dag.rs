//! DAG validation — run on every execution request before anything starts.
//!
//! Rules enforced:
//! 1. The graph has at least one node.
//! 2. Node IDs are unique within the graph.
//! 3. Every edge references valid node IDs (both `source` and `target`).
//! 4. Every node type resolves in the registry.
//! 5. No edge leaves an output node; output nodes are terminal.
//! 6. The directed graph is acyclic (topological sort succeeds).
//!
//! Returns node IDs in topological execution order on success. Nodes with
//! no mutual dependency are ordered by ascending node id, which keeps the
//! execution log readable and timing attribution reproducible.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use thiserror::Error;

use nodes::{NodeCategory, NodeRegistry};

use crate::models::WorkflowGraph;

/// Graph validation failures. All are fatal and pre-execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The graph has no nodes.
    #[error("workflow graph has no nodes")]
    EmptyGraph,

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the graph.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    /// A node's type has no factory in the registry.
    #[error("node '{node_id}' has unresolvable type '{node_type}'")]
    UnknownNodeType { node_id: String, node_type: String },

    /// An output node has a downstream dependant.
    #[error("output node '{node_id}' must be terminal")]
    OutputNodeHasDownstream { node_id: String },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,
}

/// Validate the graph against the registry and return nodes in topological
/// execution order.
pub fn validate(
    graph: &WorkflowGraph,
    registry: &NodeRegistry,
) -> Result<Vec<String>, ValidationError> {
    if graph.nodes.is_empty() {
        return Err(ValidationError::EmptyGraph);
    }

    // -----------------------------------------------------------------------
    // 1. Unique node IDs, resolvable node types
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut categories: HashMap<&str, NodeCategory> = HashMap::new();
    for node in &graph.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateNodeId(node.id.clone()));
        }
        let category = registry.category_of(&node.node_type).map_err(|_| {
            ValidationError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            }
        })?;
        categories.insert(node.id.as_str(), category);
    }

    // -----------------------------------------------------------------------
    // 2. Edge endpoints exist; output nodes are terminal
    // -----------------------------------------------------------------------
    for edge in &graph.edges {
        if !seen_ids.contains(edge.source.as_str()) {
            return Err(ValidationError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if !seen_ids.contains(edge.target.as_str()) {
            return Err(ValidationError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: "target",
            });
        }
        if categories.get(edge.source.as_str()) == Some(&NodeCategory::Output) {
            return Err(ValidationError::OutputNodeHasDownstream {
                node_id: edge.source.clone(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3. Topological sort (Kahn's algorithm, ascending-id tie-break)
    // -----------------------------------------------------------------------
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for node in &graph.nodes {
        adjacency.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }
    for edge in &graph.edges {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
    }

    let mut ready: BinaryHeap<Reverse<&str>> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| Reverse(id))
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(graph.nodes.len());

    while let Some(Reverse(node_id)) = ready.pop() {
        sorted.push(node_id.to_owned());

        if let Some(neighbours) = adjacency.get(node_id) {
            for &neighbour in neighbours {
                let degree = in_degree.entry(neighbour).or_insert(0);
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(neighbour));
                }
            }
        }
    }

    // If we didn't visit every node the graph contains a cycle.
    if sorted.len() != graph.nodes.len() {
        return Err(ValidationError::CycleDetected);
    }

    Ok(sorted)
}
