//! Execution log — an ordered, append-only audit trail.
//!
//! One entry per settled node, in completion order, carrying the params
//! snapshot, the merged input view, the output, and timing. Persisted
//! best-effort by the storage collaborator alongside the execution record.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use nodes::Payload;

use crate::models::{duration_millis, NodeFailure, NodeStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub sequence: usize,
    pub node_id: String,
    pub status: NodeStatus,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// Params snapshot as executed, for audit of later param updates.
    pub params: Value,
    /// Merged upstream view the node saw; absent for skipped nodes.
    pub input: Option<Payload>,
    pub output: Option<Payload>,
    pub error: Option<NodeFailure>,
}

/// Append-only sequence of log entries.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, stamping its sequence number.
    pub fn append(&mut self, mut entry: LogEntry) {
        entry.sequence = self.entries.len();
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
