//! Audit service orchestrator.
//!
//! The only entry point business-entity services call. Each operation
//! resolves the effective configuration, runs change detection, builds the
//! record, and dispatches it to the resolved writer. Failures anywhere in
//! that pipeline are caught here, logged, and swallowed: an audit failure
//! must never fail the business operation that triggered it.

use std::sync::Arc;

use serde_json::Value;

use crate::diff::{DiffOptions, detect_changes, detect_create_changes, detect_delete_changes};
use crate::error::AuditError;
use crate::record::{AuditLog, AuditLogBuilder, AuditMetadata, AuditOperation};
use crate::settings::AuditConfigHandle;
use crate::writer::{WriterBackends, WriterRegistry};
use chronicle_core::AuditConfig;

/// Parameters for auditing an entity creation.
#[derive(Debug, Clone)]
pub struct AuditCreate {
    pub entity_type: String,
    pub entity_id: String,
    /// The entity as persisted.
    pub entity: Value,
    /// Actor identity; defaults to `"system"`.
    pub user_id: Option<String>,
    pub metadata: Option<AuditMetadata>,
}

/// Parameters for auditing an entity update.
#[derive(Debug, Clone)]
pub struct AuditUpdate {
    pub entity_type: String,
    pub entity_id: String,
    /// State before the update.
    pub before: Value,
    /// State after the update.
    pub after: Value,
    pub user_id: Option<String>,
    pub metadata: Option<AuditMetadata>,
}

/// Parameters for auditing an entity deletion.
#[derive(Debug, Clone)]
pub struct AuditDelete {
    pub entity_type: String,
    pub entity_id: String,
    /// The entity as it was before deletion.
    pub entity: Value,
    pub user_id: Option<String>,
    pub metadata: Option<AuditMetadata>,
}

/// The audit orchestrator.
///
/// Stateless per call apart from the configuration handle and the writer
/// cache, both explicitly resettable for test isolation.
pub struct AuditService {
    config: Arc<AuditConfigHandle>,
    registry: WriterRegistry,
}

impl AuditService {
    pub fn new(config: Arc<AuditConfigHandle>, backends: WriterBackends) -> Self {
        Self {
            config,
            registry: WriterRegistry::new(backends),
        }
    }

    /// The configuration handle this service resolves against.
    pub fn config(&self) -> &AuditConfigHandle {
        &self.config
    }

    /// Drop all cached writer instances. Test isolation hook.
    pub fn clear_writers(&self) {
        self.registry.clear();
    }

    /// Record an entity creation. Never fails the caller.
    pub async fn audit_create(&self, request: AuditCreate) {
        if let Err(error) = self.try_audit_create(&request).await {
            tracing::error!(
                entity_type = %request.entity_type,
                entity_id = %request.entity_id,
                %error,
                "audit create failed; business operation unaffected"
            );
        }
    }

    /// Record an entity update. Never fails the caller.
    pub async fn audit_update(&self, request: AuditUpdate) {
        if let Err(error) = self.try_audit_update(&request).await {
            tracing::error!(
                entity_type = %request.entity_type,
                entity_id = %request.entity_id,
                %error,
                "audit update failed; business operation unaffected"
            );
        }
    }

    /// Record an entity deletion. Never fails the caller.
    pub async fn audit_delete(&self, request: AuditDelete) {
        if let Err(error) = self.try_audit_delete(&request).await {
            tracing::error!(
                entity_type = %request.entity_type,
                entity_id = %request.entity_id,
                %error,
                "audit delete failed; business operation unaffected"
            );
        }
    }

    async fn try_audit_create(&self, request: &AuditCreate) -> Result<(), AuditError> {
        let Some((config, plan)) = self.plan(&request.entity_type) else {
            return Ok(());
        };

        let changes = detect_create_changes(&request.entity, &plan.options);
        let mut builder = AuditLog::builder(AuditOperation::Create, request.entity_id.as_str())
            .changes(changes);
        if plan.include_snapshots {
            builder = builder.snapshot_after(request.entity.clone());
        }
        let record = Self::finish(builder, &request.user_id, &request.metadata);

        self.dispatch(&config, &plan, &record).await
    }

    async fn try_audit_update(&self, request: &AuditUpdate) -> Result<(), AuditError> {
        let Some((config, plan)) = self.plan(&request.entity_type) else {
            return Ok(());
        };

        let changes = detect_changes(&request.before, &request.after, &plan.options);
        if changes.is_empty() {
            tracing::debug!(
                entity_type = %request.entity_type,
                entity_id = %request.entity_id,
                "no changes detected; skipping audit"
            );
            return Ok(());
        }

        let mut builder = AuditLog::builder(AuditOperation::Update, request.entity_id.as_str())
            .changes(changes);
        if plan.include_snapshots {
            builder = builder
                .snapshot_before(request.before.clone())
                .snapshot_after(request.after.clone());
        }
        let record = Self::finish(builder, &request.user_id, &request.metadata);

        self.dispatch(&config, &plan, &record).await
    }

    async fn try_audit_delete(&self, request: &AuditDelete) -> Result<(), AuditError> {
        let Some((config, plan)) = self.plan(&request.entity_type) else {
            return Ok(());
        };

        let changes = detect_delete_changes(&request.entity, &plan.options);
        let mut builder = AuditLog::builder(AuditOperation::Delete, request.entity_id.as_str())
            .changes(changes);
        if plan.include_snapshots {
            builder = builder.snapshot_before(request.entity.clone());
        }
        let record = Self::finish(builder, &request.user_id, &request.metadata);

        self.dispatch(&config, &plan, &record).await
    }

    /// Resolve the effective settings for an entity type, or `None` when
    /// auditing is disabled for it.
    fn plan(&self, entity_type: &str) -> Option<(Arc<AuditConfig>, AuditPlan)> {
        let config = self.config.current();
        if !config.is_enabled(entity_type) {
            tracing::debug!(entity_type, "audit disabled; skipping");
            return None;
        }
        let kind = config.writer_for(entity_type);
        let plan = AuditPlan {
            kind,
            destination: config.table_name_for(entity_type, kind),
            options: DiffOptions::with_excluded(config.excluded_fields_for(entity_type)),
            include_snapshots: config.include_snapshots_for(entity_type),
        };
        Some((config, plan))
    }

    fn finish(
        mut builder: AuditLogBuilder,
        user_id: &Option<String>,
        metadata: &Option<AuditMetadata>,
    ) -> AuditLog {
        if let Some(user_id) = user_id {
            builder = builder.user_id(user_id.as_str());
        }
        if let Some(metadata) = metadata {
            builder = builder.metadata(metadata.clone());
        }
        builder.build()
    }

    async fn dispatch(
        &self,
        config: &AuditConfig,
        plan: &AuditPlan,
        record: &AuditLog,
    ) -> Result<(), AuditError> {
        let writer = self.registry.resolve(plan.kind, config);
        writer.write(record, &plan.destination).await
    }
}

/// Effective per-call settings resolved from the configuration.
struct AuditPlan {
    kind: chronicle_core::WriterKind,
    destination: String,
    options: DiffOptions,
    include_snapshots: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryKeyValueStore};
    use async_trait::async_trait;
    use chronicle_core::{AuditConfigPatch, EntityAuditConfig, KeyValueWriterConfig, WritersPatch};
    use serde_json::json;

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn put_item(&self, _table: &str, _item: Value) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }

        async fn put_items(&self, _table: &str, _items: Vec<Value>) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    fn service_with_memory_store() -> (Arc<MemoryKeyValueStore>, AuditService) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let service = AuditService::new(
            Arc::new(AuditConfigHandle::default()),
            WriterBackends {
                key_value: Some(store.clone()),
                ..Default::default()
            },
        );
        (store, service)
    }

    fn create_request(entity: Value) -> AuditCreate {
        AuditCreate {
            entity_type: "Invoice".to_string(),
            entity_id: "inv_1".to_string(),
            entity,
            user_id: None,
            metadata: None,
        }
    }

    fn update_request(before: Value, after: Value) -> AuditUpdate {
        AuditUpdate {
            entity_type: "Invoice".to_string(),
            entity_id: "inv_1".to_string(),
            before,
            after,
            user_id: Some("user_7".to_string()),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_create_writes_record_to_derived_destination() {
        let (store, service) = service_with_memory_store();

        service
            .audit_create(create_request(json!({"id": "inv_1", "total": 100})))
            .await;

        let items = store.items("invoice-audit-logs");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["operation"], json!("CREATE"));
        assert_eq!(items[0]["entityId"], json!("inv_1"));
        assert_eq!(items[0]["userId"], json!("system"));
        // CREATE has no before snapshot, only after.
        assert!(items[0].get("snapshotBefore").is_none());
        assert_eq!(items[0]["snapshotAfter"]["total"], json!(100));
        // Create changes carry an explicit null old side.
        assert_eq!(items[0]["changes"][0]["oldValue"], Value::Null);
    }

    #[tokio::test]
    async fn test_update_with_only_bookkeeping_changes_skips_writer() {
        let (store, service) = service_with_memory_store();

        service
            .audit_update(update_request(
                json!({"name": "John", "version": 1, "updatedAt": "2026-01-01"}),
                json!({"name": "John", "version": 2, "updatedAt": "2026-02-01"}),
            ))
            .await;

        assert!(store.items("invoice-audit-logs").is_empty());
    }

    #[tokio::test]
    async fn test_update_records_changes_and_both_snapshots() {
        let (store, service) = service_with_memory_store();

        service
            .audit_update(update_request(
                json!({"name": "John", "email": "john@x.com"}),
                json!({"name": "Jane", "email": "john@x.com"}),
            ))
            .await;

        let items = store.items("invoice-audit-logs");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["operation"], json!("UPDATE"));
        assert_eq!(items[0]["userId"], json!("user_7"));
        assert_eq!(items[0]["changes"][0]["path"], json!("name"));
        assert_eq!(items[0]["changes"][0]["newValue"], json!("Jane"));
        assert_eq!(items[0]["snapshotBefore"]["name"], json!("John"));
        assert_eq!(items[0]["snapshotAfter"]["name"], json!("Jane"));
    }

    #[tokio::test]
    async fn test_delete_keeps_only_before_snapshot() {
        let (store, service) = service_with_memory_store();

        service
            .audit_delete(AuditDelete {
                entity_type: "Invoice".to_string(),
                entity_id: "inv_1".to_string(),
                entity: json!({"id": "inv_1", "name": "John"}),
                user_id: None,
                metadata: None,
            })
            .await;

        let items = store.items("invoice-audit-logs");
        assert_eq!(items[0]["operation"], json!("DELETE"));
        assert!(items[0].get("snapshotAfter").is_none());
        assert_eq!(items[0]["snapshotBefore"]["name"], json!("John"));
        assert_eq!(items[0]["changes"][0]["newValue"], Value::Null);
    }

    #[tokio::test]
    async fn test_global_kill_switch_bypasses_everything() {
        let (store, service) = service_with_memory_store();
        service.config().update(AuditConfigPatch {
            global_enabled: Some(false),
            ..Default::default()
        });

        service
            .audit_create(create_request(json!({"id": "inv_1"})))
            .await;
        service
            .audit_update(update_request(json!({"a": 1}), json!({"a": 2})))
            .await;

        assert!(store.items("invoice-audit-logs").is_empty());
    }

    #[tokio::test]
    async fn test_entity_disable_only_affects_that_type() {
        let (store, service) = service_with_memory_store();
        service.config().configure_entity(
            "Invoice",
            EntityAuditConfig {
                enabled: Some(false),
                ..Default::default()
            },
        );

        service
            .audit_create(create_request(json!({"id": "inv_1"})))
            .await;
        service
            .audit_create(AuditCreate {
                entity_type: "Customer".to_string(),
                entity_id: "cus_1".to_string(),
                entity: json!({"id": "cus_1"}),
                user_id: None,
                metadata: None,
            })
            .await;

        assert!(store.items("invoice-audit-logs").is_empty());
        assert_eq!(store.items("customer-audit-logs").len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_policy_off_omits_snapshots() {
        let (store, service) = service_with_memory_store();
        service.config().configure_entity(
            "Invoice",
            EntityAuditConfig {
                include_snapshots: Some(false),
                ..Default::default()
            },
        );

        service
            .audit_update(update_request(json!({"a": 1}), json!({"a": 2})))
            .await;

        let items = store.items("invoice-audit-logs");
        assert_eq!(items.len(), 1);
        assert!(items[0].get("snapshotBefore").is_none());
        assert!(items[0].get("snapshotAfter").is_none());
        // The change list itself is unaffected by the snapshot policy.
        assert_eq!(items[0]["changes"][0]["path"], json!("a"));
    }

    #[tokio::test]
    async fn test_entity_exclusions_extend_defaults() {
        let (store, service) = service_with_memory_store();
        service.config().configure_entity(
            "Invoice",
            EntityAuditConfig {
                exclude_fields: vec!["internalNotes".to_string()],
                ..Default::default()
            },
        );

        service
            .audit_update(update_request(
                json!({"name": "John", "internalNotes": "a", "version": 1}),
                json!({"name": "John", "internalNotes": "b", "version": 2}),
            ))
            .await;

        assert!(store.items("invoice-audit-logs").is_empty());
    }

    #[tokio::test]
    async fn test_table_prefix_flows_into_destination() {
        let (store, service) = service_with_memory_store();
        service.config().update(AuditConfigPatch {
            writers: Some(WritersPatch {
                key_value: Some(KeyValueWriterConfig {
                    table_prefix: Some("myapp".to_string()),
                    ttl_days: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
        service.clear_writers();

        service
            .audit_create(create_request(json!({"id": "inv_1"})))
            .await;

        assert_eq!(store.items("myapp-invoice-audit-logs").len(), 1);
        assert!(store.items("invoice-audit-logs").is_empty());
    }

    #[tokio::test]
    async fn test_metadata_is_carried_through() {
        let (store, service) = service_with_memory_store();
        let mut metadata = AuditMetadata {
            request_id: Some("req_9".to_string()),
            source: Some("api".to_string()),
            ..Default::default()
        };
        metadata.extra.insert("tenant".to_string(), json!("acme"));

        service
            .audit_create(AuditCreate {
                metadata: Some(metadata),
                ..create_request(json!({"id": "inv_1"}))
            })
            .await;

        let items = store.items("invoice-audit-logs");
        assert_eq!(items[0]["metadata"]["requestId"], json!("req_9"));
        assert_eq!(items[0]["metadata"]["tenant"], json!("acme"));
    }

    #[tokio::test]
    async fn test_writer_failure_never_reaches_the_caller() {
        let service = AuditService::new(
            Arc::new(AuditConfigHandle::default()),
            WriterBackends {
                key_value: Some(Arc::new(BrokenStore)),
                ..Default::default()
            },
        );

        // All three operations resolve despite the backend erroring.
        service
            .audit_create(create_request(json!({"id": "inv_1"})))
            .await;
        service
            .audit_update(update_request(json!({"a": 1}), json!({"a": 2})))
            .await;
        service
            .audit_delete(AuditDelete {
                entity_type: "Invoice".to_string(),
                entity_id: "inv_1".to_string(),
                entity: json!({"id": "inv_1"}),
                user_id: None,
                metadata: None,
            })
            .await;
    }

    #[tokio::test]
    async fn test_missing_backend_degrades_to_noop_without_error() {
        let service = AuditService::new(
            Arc::new(AuditConfigHandle::default()),
            WriterBackends::default(),
        );

        service
            .audit_create(create_request(json!({"id": "inv_1"})))
            .await;
    }
}
