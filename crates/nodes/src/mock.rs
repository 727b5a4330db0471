//! `MockNode` — a test double for `ProcessingNode`.
//!
//! Useful in unit and integration tests where a real node implementation is
//! either unavailable or irrelevant.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::NodeError;
use crate::payload::Payload;
use crate::traits::{ExecutionContext, NodeCategory, NodeInput, ProcessingNode};

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return a specific payload.
    ReturnPayload(Payload),
    /// Fail with a retryable (provider) error.
    FailRetryable(String),
    /// Fail with a fatal error.
    FailFatal(String),
}

/// A mock node that records every call it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions.
    pub name: String,
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// Reported category; defaults to `Calculation`.
    pub category: NodeCategory,
    /// All inputs seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<NodeInput>>>,
}

impl MockNode {
    /// Create a mock that always succeeds with the given payload.
    pub fn returning(name: impl Into<String>, payload: Payload) -> Self {
        Self::new(name, MockBehaviour::ReturnPayload(payload))
    }

    /// Create a mock that always fails with a fatal error.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::FailFatal(msg.into()))
    }

    /// Create a mock that always fails with a retryable error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::FailRetryable(msg.into()))
    }

    fn new(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            category: NodeCategory::Calculation,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_category(mut self, category: NodeCategory) -> Self {
        self.category = category;
        self
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock lock poisoned").len()
    }
}

#[async_trait]
impl ProcessingNode for MockNode {
    fn category(&self) -> NodeCategory {
        self.category
    }

    async fn execute(
        &self,
        input: NodeInput,
        _params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        self.calls.lock().expect("mock lock poisoned").push(input);

        match &self.behaviour {
            MockBehaviour::ReturnPayload(p) => Ok(p.clone()),
            MockBehaviour::FailRetryable(msg) => Err(NodeError::Provider(msg.clone())),
            MockBehaviour::FailFatal(msg) => Err(NodeError::Fatal(msg.clone())),
        }
    }
}
