//! `engine` crate — workflow graph model, DAG validation, and the
//! orchestrator that executes graphs node by node.

pub mod dag;
pub mod error;
pub mod executor;
pub mod log;
pub mod models;
pub mod state;
pub mod store;

pub use dag::{validate, ValidationError};
pub use error::EngineError;
pub use executor::{
    CancelFlag, ExecutionOutcome, ExecutorConfig, FailurePolicy, Orchestrator,
};
pub use log::{ExecutionLog, LogEntry};
pub use models::{
    Edge, ExecutionRecord, ExecutionStatus, NodeOutcome, NodeResult, NodeSpec, NodeStatus,
    WorkflowGraph,
};
pub use state::ExecutionState;
pub use store::{ExecutionStore, InMemoryStore, NoopStore, StoreError};

#[cfg(test)]
mod executor_tests;
