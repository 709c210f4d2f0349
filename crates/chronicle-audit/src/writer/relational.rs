//! Relational (Postgres) writer.
//!
//! One row per record in a schema-qualified audit table, with JSON columns
//! for the change list, snapshots, and metadata. Batch writes build one
//! multi-row insert statement per chunk instead of N single-row statements.

use async_trait::async_trait;
use sqlx::Arguments;
use sqlx::postgres::PgArguments;
use sqlx::types::Json;

use crate::error::AuditError;
use crate::record::AuditLog;
use crate::writer::AuditWriter;
use chronicle_core::WriterKind;

const INSERT_COLUMNS: &str =
    "id, entity_id, operation, user_id, occurred_at, changes, snapshot_before, snapshot_after, metadata";
const COLUMN_COUNT: usize = 9;

/// Rows per multi-row insert statement; bounds statement size.
const MAX_BATCH_ROWS: usize = 100;

pub struct RelationalWriter {
    pool: sqlx::PgPool,
    schema: String,
}

fn args_add<T>(args: &mut PgArguments, v: T) -> Result<(), AuditError>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    args.add(v)
        .map_err(|e| AuditError::Internal(anyhow::anyhow!(e)))
}

/// Strict identifier quoting; only plain alphanumeric/underscore names are
/// expected here (computed destination names or configured overrides).
fn quote_ident(ident: &str) -> Result<String, AuditError> {
    if ident.is_empty()
        || !ident
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AuditError::InvalidIdentifier(ident.to_string()));
    }
    Ok(format!("\"{ident}\""))
}

/// Multi-row insert statement with sequential placeholders.
fn insert_sql(qualified_table: &str, row_count: usize) -> String {
    let mut rows = Vec::with_capacity(row_count);
    for row in 0..row_count {
        let first = row * COLUMN_COUNT + 1;
        let placeholders: Vec<String> = (first..first + COLUMN_COUNT)
            .map(|i| format!("${i}"))
            .collect();
        rows.push(format!("({})", placeholders.join(", ")));
    }
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified_table,
        INSERT_COLUMNS,
        rows.join(", ")
    )
}

impl RelationalWriter {
    pub fn new(pool: sqlx::PgPool, schema: String) -> Self {
        Self { pool, schema }
    }

    fn qualified_table(&self, table: &str) -> Result<String, AuditError> {
        Ok(format!(
            "{}.{}",
            quote_ident(&self.schema)?,
            quote_ident(table)?
        ))
    }

    fn bind_record(args: &mut PgArguments, record: &AuditLog) -> Result<(), AuditError> {
        args_add(args, record.id)?;
        args_add(args, record.entity_id.clone())?;
        args_add(args, record.operation.to_string())?;
        args_add(args, record.user_id.clone())?;
        args_add(args, record.timestamp)?;
        args_add(args, Json(serde_json::to_value(&record.changes)?))?;
        args_add(args, record.snapshot_before.clone().map(Json))?;
        args_add(args, record.snapshot_after.clone().map(Json))?;
        args_add(args, Json(serde_json::to_value(&record.metadata)?))?;
        Ok(())
    }
}

#[async_trait]
impl AuditWriter for RelationalWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Relational
    }

    async fn write(&self, record: &AuditLog, destination: &str) -> Result<(), AuditError> {
        let sql = insert_sql(&self.qualified_table(destination)?, 1);
        let mut args = PgArguments::default();
        Self::bind_record(&mut args, record)?;
        sqlx::query_with(&sql, args).execute(&self.pool).await?;
        tracing::debug!(record_id = %record.id, destination, "audit row inserted");
        Ok(())
    }

    async fn write_batch(
        &self,
        records: &[AuditLog],
        destination: &str,
    ) -> Result<(), AuditError> {
        if records.is_empty() {
            return Ok(());
        }
        let table = self.qualified_table(destination)?;
        for chunk in records.chunks(MAX_BATCH_ROWS) {
            let sql = insert_sql(&table, chunk.len());
            let mut args = PgArguments::default();
            for record in chunk {
                Self::bind_record(&mut args, record)?;
            }
            sqlx::query_with(&sql, args).execute(&self.pool).await?;
        }
        tracing::debug!(count = records.len(), destination, "audit rows inserted");
        Ok(())
    }
}
