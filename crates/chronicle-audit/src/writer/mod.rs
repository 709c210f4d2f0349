//! Writer contract and backend registry.

pub mod composite;
pub mod kv;
pub mod noop;
pub mod queue;
pub mod relational;

pub use composite::CompositeWriter;
pub use kv::KeyValueWriter;
pub use noop::NoopWriter;
pub use queue::QueueWriter;
pub use relational::RelationalWriter;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::AuditError;
use crate::record::AuditLog;
use crate::store::{KeyValueStore, QueuePublisher};
use chronicle_core::{AuditConfig, WriterKind};

/// Common contract every audit writer backend implements.
///
/// Writers surface failures through `Result`; containment happens once, at
/// the orchestrator boundary (the composite additionally aggregates its
/// children's outcomes). `write_batch` with no records is a guaranteed
/// no-op that performs no I/O.
#[async_trait]
pub trait AuditWriter: Send + Sync {
    /// Which backend this writer is.
    fn kind(&self) -> WriterKind;

    /// Persist one record to a destination.
    async fn write(&self, record: &AuditLog, destination: &str) -> Result<(), AuditError>;

    /// Persist a batch of records to a destination.
    async fn write_batch(&self, records: &[AuditLog], destination: &str)
    -> Result<(), AuditError>;
}

/// Backend handles the registry builds writers from.
///
/// Any handle may be absent; a kind whose backend is missing degrades to
/// the no-op writer with a warning instead of failing.
#[derive(Clone, Default)]
pub struct WriterBackends {
    pub key_value: Option<Arc<dyn KeyValueStore>>,
    pub relational: Option<sqlx::PgPool>,
    pub queue: Option<Arc<dyn QueuePublisher>>,
}

/// Lazily-populated writer cache keyed by kind.
///
/// Writer instances live for the process lifetime once built; `clear` exists
/// for test harnesses only. A concurrent first access may build a writer
/// twice; the cache keeps one and the other is dropped.
pub struct WriterRegistry {
    backends: WriterBackends,
    cache: RwLock<HashMap<WriterKind, Arc<dyn AuditWriter>>>,
}

impl WriterRegistry {
    pub fn new(backends: WriterBackends) -> Self {
        Self {
            backends,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The cached writer for a kind, building it on first use.
    pub fn resolve(&self, kind: WriterKind, config: &AuditConfig) -> Arc<dyn AuditWriter> {
        if let Some(writer) = self
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
        {
            return writer.clone();
        }

        // Built outside the lock; a racing builder just loses its copy.
        let writer = self.build(kind, config);
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(kind)
            .or_insert(writer)
            .clone()
    }

    /// Drop all cached writer instances. Test isolation hook.
    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn build(&self, kind: WriterKind, config: &AuditConfig) -> Arc<dyn AuditWriter> {
        match kind {
            WriterKind::KeyValue => match &self.backends.key_value {
                Some(store) => Arc::new(KeyValueWriter::new(
                    store.clone(),
                    config.writers.key_value.clone(),
                )),
                None => self.degrade(kind),
            },
            WriterKind::Relational => match &self.backends.relational {
                Some(pool) => Arc::new(RelationalWriter::new(
                    pool.clone(),
                    config.writers.relational.schema.clone(),
                )),
                None => self.degrade(kind),
            },
            // The queue writer handles a missing publisher itself, by
            // logging and skipping at write time.
            WriterKind::Queue => Arc::new(QueueWriter::new(
                self.backends.queue.clone(),
                config.writers.queue.clone(),
            )),
            WriterKind::Noop => Arc::new(NoopWriter),
            WriterKind::Composite => {
                let mut children: Vec<Arc<dyn AuditWriter>> = Vec::new();
                for target in &config.writers.composite.targets {
                    if *target == WriterKind::Composite {
                        tracing::warn!("composite writer cannot nest itself; target skipped");
                        continue;
                    }
                    children.push(self.resolve(*target, config));
                }
                Arc::new(CompositeWriter::new(children))
            }
        }
    }

    fn degrade(&self, kind: WriterKind) -> Arc<dyn AuditWriter> {
        tracing::warn!(
            writer = %kind,
            "writer backend not configured; falling back to no-op"
        );
        Arc::new(NoopWriter)
    }
}
