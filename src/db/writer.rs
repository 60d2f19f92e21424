use sqlx::SqlitePool;
use tracing::debug;

#[cfg(test)]
use crate::db::models::FlowRow;
use crate::db::table_router::{create_table_sql, insert_sql, TableName};
use crate::error::{AppError, Result};
use crate::types::FlowRecord;

/// Persists normalized rows, one table per combination.
///
/// Each write replaces the table's whole contents in a single transaction, so a
/// reader sees either the previous snapshot or the new one, never a mix.
#[derive(Debug, Clone)]
pub struct FlowWriter {
    pool: SqlitePool,
}

impl FlowWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the table with the fixed column layout if it does not exist yet.
    /// An existing table is left exactly as it is.
    pub async fn ensure_schema(&self, table: &TableName) -> Result<()> {
        sqlx::query(&create_table_sql(table))
            .execute(&self.pool)
            .await
            .map_err(|source| AppError::WriteFailure {
                table: table.to_string(),
                source,
            })?;
        Ok(())
    }

    /// Delete every row in `table` and insert `records`, atomically.
    /// Returns the number of rows inserted.
    pub async fn replace_all(&self, table: &TableName, records: &[FlowRecord]) -> Result<u64> {
        let fail = |source: sqlx::Error| AppError::WriteFailure {
            table: table.to_string(),
            source,
        };

        // Dropping `tx` on an early return rolls back.
        let mut tx = self.pool.begin().await.map_err(fail)?;

        sqlx::query(&format!("DELETE FROM {}", table.quoted()))
            .execute(&mut *tx)
            .await
            .map_err(fail)?;

        let insert = insert_sql(table);
        let mut inserted = 0u64;
        for r in records {
            let result = sqlx::query(&insert)
                .bind(i64::from(r.rank))
                .bind(&r.code)
                .bind(&r.name)
                .bind(r.scope_kind.label())
                .bind(&r.scope_selector)
                .bind(r.period.label())
                .bind(r.latest_price)
                .bind(r.change_percentage)
                .bind(r.main.net_amount)
                .bind(r.main.net_percentage)
                .bind(r.extra_large.net_amount)
                .bind(r.extra_large.net_percentage)
                .bind(r.large.net_amount)
                .bind(r.large.net_percentage)
                .bind(r.medium.net_amount)
                .bind(r.medium.net_percentage)
                .bind(r.small.net_amount)
                .bind(r.small.net_percentage)
                .bind(&r.captured_at)
                .execute(&mut *tx)
                .await
                .map_err(fail)?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(fail)?;

        debug!(table = %table, rows = inserted, "Replaced table contents");
        Ok(inserted)
    }

    /// `ensure_schema` followed by `replace_all`.
    pub async fn write_combination(&self, table: &TableName, records: &[FlowRecord]) -> Result<u64> {
        self.ensure_schema(table).await?;
        self.replace_all(table, records).await
    }
}

#[cfg(test)]
impl FlowWriter {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Current contents of `table`, in rank order.
    pub async fn load_records(&self, table: &TableName) -> Result<Vec<FlowRow>> {
        let rows = sqlx::query_as::<_, FlowRow>(&format!(
            "SELECT * FROM {} ORDER BY rank ASC, id ASC",
            table.quoted()
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
