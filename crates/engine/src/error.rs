//! Engine-level error types.

use thiserror::Error;

use crate::dag::ValidationError;

/// Errors produced by the workflow engine.
///
/// Per-node failures are not here; they are caught at the node boundary
/// and recorded on the execution; only pre-execution validation and
/// executor-internal faults surface as `EngineError`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The graph is malformed. Fatal, raised before any node executes.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A graph operation referenced a node id that does not exist.
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// A node task could not be joined (it panicked or was aborted).
    #[error("node task failed to join: {0}")]
    TaskJoin(String),
}
