//! No-op writer.
//!
//! Accepts and discards. Used for disabled paths and as the degradation
//! target when a backend handle is missing; still emits a debug line per
//! call for observability parity with the real writers.

use async_trait::async_trait;

use crate::error::AuditError;
use crate::record::AuditLog;
use crate::writer::AuditWriter;
use chronicle_core::WriterKind;

pub struct NoopWriter;

#[async_trait]
impl AuditWriter for NoopWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Noop
    }

    async fn write(&self, record: &AuditLog, destination: &str) -> Result<(), AuditError> {
        tracing::debug!(record_id = %record.id, destination, "no-op writer discarded audit record");
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
        tracing::debug!(count = records.len(), destination, "no-op writer discarded audit batch");
        Ok(())
    }
}
