//! Composite fan-out writer.
//!
//! Wraps an ordered list of other writers and dispatches every call to all
//! of them concurrently, waiting for all to settle. Partial failure is
//! logged with counts and reasons but never propagated: one slow or broken
//! backend must not take the others down with it.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::error::AuditError;
use crate::record::AuditLog;
use crate::writer::AuditWriter;
use chronicle_core::WriterKind;

pub struct CompositeWriter {
    children: Vec<Arc<dyn AuditWriter>>,
}

impl CompositeWriter {
    pub fn new(children: Vec<Arc<dyn AuditWriter>>) -> Self {
        Self { children }
    }

    /// Log the settled outcomes; failures are absorbed here.
    fn settle(&self, destination: &str, results: Vec<Result<(), AuditError>>) {
        let total_writers = results.len();
        let reasons: Vec<String> = self
            .children
            .iter()
            .zip(&results)
            .filter_map(|(child, result)| {
                result
                    .as_ref()
                    .err()
                    .map(|e| format!("{}: {e}", child.kind()))
            })
            .collect();

        if reasons.is_empty() {
            tracing::debug!(total_writers, destination, "composite write settled");
        } else {
            tracing::error!(
                failed_writers = reasons.len(),
                total_writers,
                destination,
                reasons = ?reasons,
                "composite write partially failed"
            );
        }
    }
}

#[async_trait]
impl AuditWriter for CompositeWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Composite
    }

    async fn write(&self, record: &AuditLog, destination: &str) -> Result<(), AuditError> {
        let results = join_all(
            self.children
                .iter()
                .map(|child| child.write(record, destination)),
        )
        .await;
        self.settle(destination, results);
        Ok(())
    }

    async fn write_batch(
        &self,
        records: &[AuditLog],
        destination: &str,
    ) -> Result<(), AuditError> {
        // Short-circuits before touching any child writer.
        if records.is_empty() {
            return Ok(());
        }
        let results = join_all(
            self.children
                .iter()
                .map(|child| child.write_batch(records, destination)),
        )
        .await;
        self.settle(destination, results);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuditOperation;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingWriter {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingWriter {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AuditWriter for RecordingWriter {
        fn kind(&self) -> WriterKind {
            WriterKind::Noop
        }

        async fn write(&self, record: &AuditLog, _destination: &str) -> Result<(), AuditError> {
            self.calls.lock().unwrap().push(record.id.to_string());
            Ok(())
        }

        async fn write_batch(
            &self,
            records: &[AuditLog],
            _destination: &str,
        ) -> Result<(), AuditError> {
            let mut calls = self.calls.lock().unwrap();
            for record in records {
                calls.push(record.id.to_string());
            }
            Ok(())
        }
    }

    struct FailingWriter {
        attempts: AtomicUsize,
    }

    impl FailingWriter {
        fn new() -> Self {
            Self {
                attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuditWriter for FailingWriter {
        fn kind(&self) -> WriterKind {
            WriterKind::KeyValue
        }

        async fn write(&self, _record: &AuditLog, destination: &str) -> Result<(), AuditError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AuditError::WriteFailed {
                destination: destination.to_string(),
                reason: "backend down".to_string(),
            })
        }

        async fn write_batch(
            &self,
            _records: &[AuditLog],
            destination: &str,
        ) -> Result<(), AuditError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AuditError::WriteFailed {
                destination: destination.to_string(),
                reason: "backend down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_partial_failure_still_resolves_and_reaches_all_children() {
        let healthy = Arc::new(RecordingWriter::new());
        let broken = Arc::new(FailingWriter::new());
        let composite = CompositeWriter::new(vec![
            healthy.clone() as Arc<dyn AuditWriter>,
            broken.clone() as Arc<dyn AuditWriter>,
        ]);
        let record = AuditLog::new(AuditOperation::Update, "inv_1");

        composite.write(&record, "invoice-audit-logs").await.unwrap();

        assert_eq!(healthy.call_count(), 1);
        assert_eq!(broken.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_fans_out_to_every_child() {
        let first = Arc::new(RecordingWriter::new());
        let second = Arc::new(RecordingWriter::new());
        let composite = CompositeWriter::new(vec![
            first.clone() as Arc<dyn AuditWriter>,
            second.clone() as Arc<dyn AuditWriter>,
        ]);
        let records: Vec<AuditLog> = (0..3)
            .map(|i| AuditLog::new(AuditOperation::Create, format!("inv_{i}")))
            .collect();

        composite
            .write_batch(&records, "invoice-audit-logs")
            .await
            .unwrap();

        assert_eq!(first.call_count(), 3);
        assert_eq!(second.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_batch_short_circuits() {
        let child = Arc::new(RecordingWriter::new());
        let broken = Arc::new(FailingWriter::new());
        let composite = CompositeWriter::new(vec![
            child.clone() as Arc<dyn AuditWriter>,
            broken.clone() as Arc<dyn AuditWriter>,
        ]);

        composite
            .write_batch(&[], "invoice-audit-logs")
            .await
            .unwrap();

        assert_eq!(child.call_count(), 0);
        assert_eq!(broken.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_composite_resolves() {
        let composite = CompositeWriter::new(Vec::new());
        let record = AuditLog::new(AuditOperation::Delete, "inv_1");
        composite.write(&record, "invoice-audit-logs").await.unwrap();
    }
}
