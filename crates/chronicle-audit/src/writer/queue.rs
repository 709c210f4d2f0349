//! Async queue writer.
//!
//! Publishes one message per record, embedding both the record and its
//! destination table name so a downstream consumer can fan out to real
//! storage. Without a publisher or endpoint the writer degrades to an
//! error log and a skip; it never fails the caller over configuration.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::AuditError;
use crate::record::AuditLog;
use crate::store::{QueueMessage, QueuePublisher};
use crate::writer::AuditWriter;
use chronicle_core::{QueueWriterConfig, WriterKind};

/// Per-request message limit of the reference backend.
const MAX_BATCH_MESSAGES: usize = 10;

pub struct QueueWriter {
    publisher: Option<Arc<dyn QueuePublisher>>,
    config: QueueWriterConfig,
}

impl QueueWriter {
    pub fn new(publisher: Option<Arc<dyn QueuePublisher>>, config: QueueWriterConfig) -> Self {
        Self { publisher, config }
    }

    fn target(&self) -> Option<(&Arc<dyn QueuePublisher>, &str)> {
        match (&self.publisher, self.config.endpoint.as_deref()) {
            (Some(publisher), Some(endpoint)) => Some((publisher, endpoint)),
            _ => None,
        }
    }

    fn to_message(&self, record: &AuditLog, destination: &str) -> Result<QueueMessage, AuditError> {
        let body = serde_json::to_string(&json!({
            "record": record,
            "table": destination,
        }))?;
        let (group_id, dedup_id) = if self.config.fifo {
            (Some(destination.to_string()), Some(record.id.to_string()))
        } else {
            (None, None)
        };
        Ok(QueueMessage {
            body,
            group_id,
            dedup_id,
        })
    }

    fn write_error(endpoint: &str, error: anyhow::Error) -> AuditError {
        AuditError::WriteFailed {
            destination: endpoint.to_string(),
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl AuditWriter for QueueWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Queue
    }

    async fn write(&self, record: &AuditLog, destination: &str) -> Result<(), AuditError> {
        let Some((publisher, endpoint)) = self.target() else {
            tracing::error!(
                record_id = %record.id,
                destination,
                "queue backend unavailable; audit record dropped"
            );
            return Ok(());
        };
        let message = self.to_message(record, destination)?;
        publisher
            .send(endpoint, message)
            .await
            .map_err(|e| Self::write_error(endpoint, e))?;
        tracing::debug!(record_id = %record.id, destination, endpoint, "audit record queued");
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
        let Some((publisher, endpoint)) = self.target() else {
            tracing::error!(
                count = records.len(),
                destination,
                "queue backend unavailable; audit batch dropped"
            );
            return Ok(());
        };
        for chunk in records.chunks(MAX_BATCH_MESSAGES) {
            let messages = chunk
                .iter()
                .map(|record| self.to_message(record, destination))
                .collect::<Result<Vec<_>, _>>()?;
            publisher
                .send_batch(endpoint, messages)
                .await
                .map_err(|e| Self::write_error(endpoint, e))?;
        }
        tracing::debug!(count = records.len(), destination, endpoint, "audit batch queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuditOperation;
    use crate::store::MemoryQueue;

    fn fifo_config(endpoint: &str) -> QueueWriterConfig {
        QueueWriterConfig {
            endpoint: Some(endpoint.to_string()),
            fifo: true,
        }
    }

    #[tokio::test]
    async fn test_message_embeds_record_and_table() {
        let queue = Arc::new(MemoryQueue::new());
        let writer = QueueWriter::new(
            Some(queue.clone()),
            QueueWriterConfig {
                endpoint: Some("audit-events".to_string()),
                fifo: false,
            },
        );
        let record = AuditLog::new(AuditOperation::Create, "inv_1");

        writer.write(&record, "invoice-audit-logs").await.unwrap();

        let messages = queue.messages("audit-events");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].group_id.is_none());

        let body: serde_json::Value = serde_json::from_str(&messages[0].body).unwrap();
        assert_eq!(body["table"], json!("invoice-audit-logs"));
        assert_eq!(body["record"]["entityId"], json!("inv_1"));
    }

    #[tokio::test]
    async fn test_fifo_sets_group_and_dedup_ids() {
        let queue = Arc::new(MemoryQueue::new());
        let writer = QueueWriter::new(Some(queue.clone()), fifo_config("audit-events.fifo"));
        let record = AuditLog::new(AuditOperation::Update, "inv_1");

        writer.write(&record, "invoice-audit-logs").await.unwrap();

        let messages = queue.messages("audit-events.fifo");
        assert_eq!(messages[0].group_id.as_deref(), Some("invoice-audit-logs"));
        assert_eq!(messages[0].dedup_id, Some(record.id.to_string()));
    }

    #[tokio::test]
    async fn test_missing_publisher_skips_without_error() {
        let writer = QueueWriter::new(None, fifo_config("audit-events.fifo"));
        let record = AuditLog::new(AuditOperation::Delete, "inv_1");

        writer.write(&record, "invoice-audit-logs").await.unwrap();
        writer
            .write_batch(std::slice::from_ref(&record), "invoice-audit-logs")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_endpoint_skips_without_error() {
        let queue = Arc::new(MemoryQueue::new());
        let writer = QueueWriter::new(Some(queue.clone()), QueueWriterConfig::default());
        let record = AuditLog::new(AuditOperation::Create, "inv_1");

        writer.write(&record, "invoice-audit-logs").await.unwrap();
        assert!(queue.messages("audit-events").is_empty());
    }

    #[tokio::test]
    async fn test_batch_chunks_to_backend_limit() {
        let queue = Arc::new(MemoryQueue::new());
        let writer = QueueWriter::new(Some(queue.clone()), fifo_config("audit-events.fifo"));
        let records: Vec<AuditLog> = (0..25)
            .map(|i| AuditLog::new(AuditOperation::Create, format!("inv_{i}")))
            .collect();

        writer
            .write_batch(&records, "invoice-audit-logs")
            .await
            .unwrap();

        assert_eq!(queue.messages("audit-events.fifo").len(), 25);
    }
}
