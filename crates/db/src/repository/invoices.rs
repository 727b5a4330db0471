//! Invoice repository functions.

use nodes::collab::InvoiceQuery;

use crate::models::InvoiceRow;
use crate::{DbError, DbPool};

/// Fetch invoices scoped by company and category.
///
/// Finer-grained filters (date windows, amounts, entities) are applied by
/// the fetch node itself; the repository only narrows the scan.
pub async fn fetch_invoices(
    pool: &DbPool,
    query: &InvoiceQuery,
) -> Result<Vec<InvoiceRow>, DbError> {
    let rows = sqlx::query_as::<_, InvoiceRow>(
        r#"
        SELECT id, company_id, category, invoice_number, entity_id, entity_name,
               invoice_date, due_date, currency, subtotal, tax, total, paid, created_at
        FROM invoices
        WHERE ($1::text IS NULL OR company_id = $1)
          AND ($2::text IS NULL OR category = $2)
        ORDER BY id
        "#,
    )
    .bind(query.company_id.as_deref())
    .bind(query.category.map(|c| c.to_string()))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
