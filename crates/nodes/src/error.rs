//! Node-level error type.

use thiserror::Error;

use crate::collab::ProviderError;

/// Errors returned by a node's `execute` method.
///
/// These are always caught at the node boundary: the engine converts them
/// into a failed node result and carries on with independent branches. The
/// variant also decides retry behaviour: provider faults and timeouts are
/// transient and retried with back-off, everything else fails immediately.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// A calculation-engine error, preserved as raised.
    #[error("calculation failed: {0}")]
    Calculation(#[from] calc::CalcError),

    /// A required field or parameter was absent.
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// Parameters or upstream payload did not have the expected shape.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Transient failure talking to an external collaborator.
    #[error("provider error: {0}")]
    Provider(String),

    /// An external collaborator did not answer within the injected timeout.
    #[error("provider timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Permanent failure; no retry should be attempted.
    #[error("fatal node error: {0}")]
    Fatal(String),
}

impl NodeError {
    /// Whether the engine should re-try the node.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Timeout(_))
    }
}

impl From<ProviderError> for NodeError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.0)
    }
}
