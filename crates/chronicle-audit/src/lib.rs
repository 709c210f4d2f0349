//! # chronicle-audit
//!
//! Decoupled audit logging for domain entities.
//!
//! This crate provides functionality for:
//! - Detecting field-level changes between entity snapshots (deep structural
//!   diff with exclusion rules and a recursion bound)
//! - Recording CREATE/UPDATE/DELETE operations as immutable audit records
//! - Persisting records through pluggable writer backends (key-value,
//!   relational, queue, no-op, and a concurrent fan-out composite)
//! - Resolving per-entity-type configuration: enablement, writer selection,
//!   destination naming, field exclusion, snapshot policy
//!
//! ## Fail-safe contract
//!
//! Auditing is strictly an observer. Every public [`AuditService`] operation
//! resolves successfully regardless of backend outcome; failures are logged
//! at error level and swallowed at the orchestrator boundary, never
//! propagated to the business operation that triggered them.
//!
//! ## Destination naming
//!
//! | Writer kind | Convention | Example (`Invoice`, prefix `myapp`) |
//! |-------------|------------|-------------------------------------|
//! | key-value (with prefix) | `{prefix}-{lowercase}-audit-logs` | `myapp-invoice-audit-logs` |
//! | key-value (no prefix) | `{lowercase}-audit-logs` | `invoice-audit-logs` |
//! | relational | `{snake_case}_audit_logs` | `invoice_audit_logs` |
//!
//! An explicit per-entity `table_name` override is always used verbatim.
//! The entity type is never stored inside a record; the destination name
//! carries it.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chronicle_audit::{
//!     AuditConfigHandle, AuditCreate, AuditService, MemoryKeyValueStore, WriterBackends,
//! };
//!
//! # async fn example() {
//! let config = Arc::new(AuditConfigHandle::default());
//! let backends = WriterBackends {
//!     key_value: Some(Arc::new(MemoryKeyValueStore::new())),
//!     ..Default::default()
//! };
//! let audit = AuditService::new(config, backends);
//!
//! // After the business write has completed:
//! audit
//!     .audit_create(AuditCreate {
//!         entity_type: "Invoice".to_string(),
//!         entity_id: "inv_1".to_string(),
//!         entity: serde_json::json!({"id": "inv_1", "total": 100}),
//!         user_id: Some("user_7".to_string()),
//!         metadata: None,
//!     })
//!     .await;
//! # }
//! ```

pub mod diff;
pub mod error;
pub mod record;
pub mod service;
pub mod settings;
pub mod store;
pub mod writer;

pub use diff::{DEFAULT_MAX_DEPTH, DiffOptions, detect_changes, detect_create_changes, detect_delete_changes};
pub use error::AuditError;
pub use record::{AuditLog, AuditLogBuilder, AuditMetadata, AuditOperation, ChangeRecord, SYSTEM_USER, ValueType};
pub use service::{AuditCreate, AuditDelete, AuditService, AuditUpdate};
pub use settings::AuditConfigHandle;
pub use store::{KeyValueStore, MemoryKeyValueStore, MemoryQueue, QueueMessage, QueuePublisher};
pub use writer::{
    AuditWriter, CompositeWriter, KeyValueWriter, NoopWriter, QueueWriter, RelationalWriter,
    WriterBackends, WriterRegistry,
};
