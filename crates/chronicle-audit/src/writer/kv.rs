//! Durable key-value writer.
//!
//! Serializes each record as one item keyed by its id. When a TTL is
//! configured, items carry an `expiresAt` epoch-seconds attribute so the
//! store can auto-purge old audit data.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::AuditError;
use crate::record::AuditLog;
use crate::store::KeyValueStore;
use crate::writer::AuditWriter;
use chronicle_core::{KeyValueWriterConfig, WriterKind};

/// Per-request item limit of the reference backend.
const MAX_BATCH_ITEMS: usize = 25;

pub struct KeyValueWriter {
    store: Arc<dyn KeyValueStore>,
    config: KeyValueWriterConfig,
}

impl KeyValueWriter {
    pub fn new(store: Arc<dyn KeyValueStore>, config: KeyValueWriterConfig) -> Self {
        Self { store, config }
    }

    fn to_item(&self, record: &AuditLog) -> Result<Value, AuditError> {
        let mut item = serde_json::to_value(record)?;
        if let Some(ttl_days) = self.config.ttl_days {
            let expires_at = record.timestamp + chrono::Duration::days(i64::from(ttl_days));
            if let Some(fields) = item.as_object_mut() {
                fields.insert("expiresAt".to_string(), json!(expires_at.timestamp()));
            }
        }
        Ok(item)
    }

    fn write_error(destination: &str, error: anyhow::Error) -> AuditError {
        AuditError::WriteFailed {
            destination: destination.to_string(),
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl AuditWriter for KeyValueWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::KeyValue
    }

    async fn write(&self, record: &AuditLog, destination: &str) -> Result<(), AuditError> {
        let item = self.to_item(record)?;
        self.store
            .put_item(destination, item)
            .await
            .map_err(|e| Self::write_error(destination, e))?;
        tracing::debug!(record_id = %record.id, destination, "audit record stored");
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
        // Chunks are issued sequentially, preserving order within the call.
        for chunk in records.chunks(MAX_BATCH_ITEMS) {
            let items = chunk
                .iter()
                .map(|record| self.to_item(record))
                .collect::<Result<Vec<_>, _>>()?;
            self.store
                .put_items(destination, items)
                .await
                .map_err(|e| Self::write_error(destination, e))?;
        }
        tracing::debug!(count = records.len(), destination, "audit batch stored");
        Ok(())
    }
}
