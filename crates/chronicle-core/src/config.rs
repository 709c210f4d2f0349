//! Audit engine configuration.
//!
//! Global settings, per-entity-type overrides, and the resolution rules that
//! decide how a given entity type is audited. All lookups here are pure; no
//! I/O happens in this module.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Writer backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterKind {
    /// Durable key-value store, one item per record.
    #[default]
    KeyValue,
    /// Relational store, one row per record.
    Relational,
    /// Async queue, one message per record.
    Queue,
    /// Accepts and discards.
    Noop,
    /// Fans a single write out to several backends.
    Composite,
}

impl fmt::Display for WriterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyValue => write!(f, "key_value"),
            Self::Relational => write!(f, "relational"),
            Self::Queue => write!(f, "queue"),
            Self::Noop => write!(f, "noop"),
            Self::Composite => write!(f, "composite"),
        }
    }
}

/// Per-entity-type override. Unset fields fall back to the global defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityAuditConfig {
    /// Whether auditing is enabled for this entity type.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Writer backend for this entity type.
    #[serde(default)]
    pub writer: Option<WriterKind>,

    /// Destination name override, used verbatim when set.
    #[serde(default)]
    pub table_name: Option<String>,

    /// Additional leaf field names to exclude, on top of the global defaults.
    #[serde(default)]
    pub exclude_fields: Vec<String>,

    /// Whether to attach full before/after snapshots to audit records.
    #[serde(default)]
    pub include_snapshots: Option<bool>,
}

/// Key-value backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyValueWriterConfig {
    /// Table name prefix: `"myapp"` yields `myapp-invoice-audit-logs`.
    #[serde(default)]
    pub table_prefix: Option<String>,

    /// Retention in days; when set, items carry an `expiresAt` epoch-seconds
    /// attribute for the store's auto-purge mechanism.
    #[serde(default)]
    pub ttl_days: Option<u32>,
}

/// Relational backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalWriterConfig {
    /// Schema qualifying every audit table.
    #[serde(default = "default_schema")]
    pub schema: String,
}

impl Default for RelationalWriterConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
        }
    }
}

/// Queue backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueWriterConfig {
    /// Queue endpoint identifier. Without one the queue writer logs an error
    /// and skips instead of failing.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// FIFO semantics: group id per destination, dedup id per record.
    #[serde(default)]
    pub fifo: bool,
}

/// Composite backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeWriterConfig {
    /// Child writers, dispatched concurrently in this order.
    #[serde(default = "default_composite_targets")]
    pub targets: Vec<WriterKind>,
}

impl Default for CompositeWriterConfig {
    fn default() -> Self {
        Self {
            targets: default_composite_targets(),
        }
    }
}

/// Backend-specific settings for every writer kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WritersConfig {
    #[serde(default)]
    pub key_value: KeyValueWriterConfig,

    #[serde(default)]
    pub relational: RelationalWriterConfig,

    #[serde(default)]
    pub queue: QueueWriterConfig,

    #[serde(default)]
    pub composite: CompositeWriterConfig,
}

/// Global audit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Kill switch for the whole engine.
    #[serde(default = "default_enabled")]
    pub global_enabled: bool,

    /// Writer used when an entity type has no explicit override.
    #[serde(default)]
    pub default_writer: WriterKind,

    /// Bookkeeping fields stripped from every diff, at any nesting depth.
    #[serde(default = "default_exclude_fields")]
    pub default_exclude_fields: Vec<String>,

    /// Per-entity-type overrides, keyed by type name.
    #[serde(default)]
    pub entities: HashMap<String, EntityAuditConfig>,

    /// Backend-specific settings.
    #[serde(default)]
    pub writers: WritersConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            global_enabled: default_enabled(),
            default_writer: WriterKind::default(),
            default_exclude_fields: default_exclude_fields(),
            entities: HashMap::new(),
            writers: WritersConfig::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_composite_targets() -> Vec<WriterKind> {
    vec![WriterKind::KeyValue, WriterKind::Relational]
}

/// Bookkeeping fields every diff strips regardless of configuration.
pub const SYSTEM_EXCLUDE_FIELDS: [&str; 4] = ["version", "createdAt", "updatedAt", "isActive"];

fn default_exclude_fields() -> Vec<String> {
    SYSTEM_EXCLUDE_FIELDS.map(String::from).to_vec()
}

impl AuditConfig {
    /// The explicit override for an entity type, if one is configured.
    pub fn entity(&self, entity_type: &str) -> Option<&EntityAuditConfig> {
        self.entities.get(entity_type)
    }

    /// Whether auditing is enabled for an entity type.
    ///
    /// The global kill switch wins, then the entity's explicit flag, then
    /// default-enabled.
    pub fn is_enabled(&self, entity_type: &str) -> bool {
        if !self.global_enabled {
            return false;
        }
        self.entity(entity_type)
            .and_then(|e| e.enabled)
            .unwrap_or(true)
    }

    /// The writer backend for an entity type.
    pub fn writer_for(&self, entity_type: &str) -> WriterKind {
        self.entity(entity_type)
            .and_then(|e| e.writer)
            .unwrap_or(self.default_writer)
    }

    /// The destination name for an entity type under a given writer kind.
    ///
    /// An explicit `table_name` override is used verbatim. Otherwise the
    /// relational backend gets `{snake_case}_audit_logs`; every other kind
    /// follows the key-value convention `{prefix}-{lowercase}-audit-logs`
    /// (prefix and its dash omitted when unset).
    pub fn table_name_for(&self, entity_type: &str, kind: WriterKind) -> String {
        if let Some(name) = self.entity(entity_type).and_then(|e| e.table_name.as_deref()) {
            return name.to_string();
        }
        match kind {
            WriterKind::Relational => format!("{}_audit_logs", to_snake_case(entity_type)),
            _ => self.key_value_table_name(entity_type),
        }
    }

    fn key_value_table_name(&self, entity_type: &str) -> String {
        let base = format!("{}-audit-logs", entity_type.to_lowercase());
        match self.writers.key_value.table_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}-{base}"),
            _ => base,
        }
    }

    /// Deduplicated union of the global default exclusions and the entity's
    /// additions, in order of first appearance.
    pub fn excluded_fields_for(&self, entity_type: &str) -> Vec<String> {
        let mut merged: Vec<String> = Vec::with_capacity(self.default_exclude_fields.len());
        let extra = self
            .entity(entity_type)
            .map(|e| e.exclude_fields.as_slice())
            .unwrap_or_default();
        for field in self.default_exclude_fields.iter().chain(extra) {
            if !merged.iter().any(|f| f == field) {
                merged.push(field.clone());
            }
        }
        merged
    }

    /// Whether audit records for an entity type carry full snapshots.
    pub fn include_snapshots_for(&self, entity_type: &str) -> bool {
        self.entity(entity_type)
            .and_then(|e| e.include_snapshots)
            .unwrap_or(true)
    }

    /// A new configuration with a patch applied.
    ///
    /// Top-level scalars are replaced when set; `entities` merges per key
    /// (each present entry replaces that type's override wholesale);
    /// `writers` merges per backend section.
    pub fn merged(&self, patch: AuditConfigPatch) -> AuditConfig {
        let mut next = self.clone();
        if let Some(enabled) = patch.global_enabled {
            next.global_enabled = enabled;
        }
        if let Some(writer) = patch.default_writer {
            next.default_writer = writer;
        }
        if let Some(fields) = patch.default_exclude_fields {
            next.default_exclude_fields = fields;
        }
        for (entity_type, entity) in patch.entities {
            next.entities.insert(entity_type, entity);
        }
        if let Some(writers) = patch.writers {
            if let Some(key_value) = writers.key_value {
                next.writers.key_value = key_value;
            }
            if let Some(relational) = writers.relational {
                next.writers.relational = relational;
            }
            if let Some(queue) = writers.queue {
                next.writers.queue = queue;
            }
            if let Some(composite) = writers.composite {
                next.writers.composite = composite;
            }
        }
        next
    }
}

/// Partial configuration update. Unset fields leave the current value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfigPatch {
    #[serde(default)]
    pub global_enabled: Option<bool>,

    #[serde(default)]
    pub default_writer: Option<WriterKind>,

    #[serde(default)]
    pub default_exclude_fields: Option<Vec<String>>,

    /// Entity overrides to insert or replace.
    #[serde(default)]
    pub entities: HashMap<String, EntityAuditConfig>,

    #[serde(default)]
    pub writers: Option<WritersPatch>,
}

/// Partial writer settings; each present section replaces that backend's
/// settings wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WritersPatch {
    #[serde(default)]
    pub key_value: Option<KeyValueWriterConfig>,

    #[serde(default)]
    pub relational: Option<RelationalWriterConfig>,

    #[serde(default)]
    pub queue: Option<QueueWriterConfig>,

    #[serde(default)]
    pub composite: Option<CompositeWriterConfig>,
}

/// CamelCase type name to snake_case table fragment.
fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
