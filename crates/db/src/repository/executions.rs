//! Execution repository functions.

use uuid::Uuid;

use engine::{ExecutionLog, ExecutionRecord};

use crate::models::ExecutionRow;
use crate::{DbError, DbPool};

/// Insert a freshly started execution.
pub async fn insert_execution(pool: &DbPool, record: &ExecutionRecord) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO workflow_executions (id, workflow_id, status, started_at, record)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(record.id)
    .bind(record.workflow_id)
    .bind(record.status.to_string())
    .bind(record.started_at)
    .bind(serde_json::to_value(record)?)
    .execute(pool)
    .await?;

    Ok(())
}

/// Write the terminal state of an execution, including the audit log.
pub async fn finalize_execution(
    pool: &DbPool,
    record: &ExecutionRecord,
    log: &ExecutionLog,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE workflow_executions
        SET status = $1, completed_at = $2, record = $3, log = $4
        WHERE id = $5
        "#,
    )
    .bind(record.status.to_string())
    .bind(record.completed_at)
    .bind(serde_json::to_value(record)?)
    .bind(serde_json::to_value(log)?)
    .bind(record.id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a single execution row by id.
pub async fn fetch_execution(pool: &DbPool, execution_id: Uuid) -> Result<ExecutionRow, DbError> {
    let row = sqlx::query_as::<_, ExecutionRow>(
        r#"
        SELECT id, workflow_id, status, started_at, completed_at, record, log
        FROM workflow_executions
        WHERE id = $1
        "#,
    )
    .bind(execution_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

/// List executions for a workflow, newest first.
pub async fn list_executions(
    pool: &DbPool,
    workflow_id: Uuid,
    limit: i64,
) -> Result<Vec<ExecutionRow>, DbError> {
    let rows = sqlx::query_as::<_, ExecutionRow>(
        r#"
        SELECT id, workflow_id, status, started_at, completed_at, record, log
        FROM workflow_executions
        WHERE workflow_id = $1
        ORDER BY started_at DESC
        LIMIT $2
        "#,
    )
    .bind(workflow_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
