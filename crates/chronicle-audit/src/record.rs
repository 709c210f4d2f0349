//! Audit record types.
//!
//! A [`ChangeRecord`] is one field-level difference between two entity
//! states; an [`AuditLog`] is the persisted unit describing a single
//! CREATE/UPDATE/DELETE operation, carrying its changes, optional snapshots,
//! and correlation metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Actor recorded when the caller supplies no identity.
pub const SYSTEM_USER: &str = "system";

/// Runtime type tag of a changed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueType {
    /// The tag for a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool => write!(f, "bool"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// Operation kind an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditOperation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// One detected field-level difference between two entity states.
///
/// `None` is the absent sentinel (the side did not exist at all; the field
/// is omitted when serialized), while `Some(Value::Null)` is an explicit
/// null. CREATE/DELETE records synthesize explicit nulls for the missing
/// side; array growth and shrink inside an UPDATE diff uses the absent
/// sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Dot/bracket path locating the field, e.g. `address.city`, `items[2]`.
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,

    /// Type tag of whichever side still carries a value, preferring the new
    /// side.
    pub value_type: ValueType,
}

impl ChangeRecord {
    /// Build a change record, deriving the type tag from the values.
    pub fn new(
        path: impl Into<String>,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        let value_type = match (&new_value, &old_value) {
            (Some(v), _) if !v.is_null() => ValueType::of(v),
            (_, Some(v)) if !v.is_null() => ValueType::of(v),
            _ => ValueType::Null,
        };
        Self {
            path: path.into(),
            old_value,
            new_value,
            value_type,
        }
    }
}

/// Free-form correlation context attached to an audit record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetadata {
    /// Request-correlation identifier propagated from the triggering call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Originating subsystem or channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Arbitrary extra keys, flattened into the metadata object.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The persisted audit unit for one CREATE/UPDATE/DELETE operation.
///
/// The entity type is deliberately not stored in the record; it is implied
/// by the destination the record is written to, which keeps per-entity audit
/// data physically partitioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    /// Unique record id, generated per call.
    pub id: Uuid,

    /// The business entity's identifier, not its type.
    pub entity_id: String,

    pub operation: AuditOperation,

    /// Actor identity, [`SYSTEM_USER`] when none was supplied.
    pub user_id: String,

    /// When the audit was recorded.
    pub timestamp: DateTime<Utc>,

    /// Ordered field-level changes; never re-sorted after construction.
    pub changes: Vec<ChangeRecord>,

    /// Entity state before the operation. Absent for CREATE, or omitted
    /// entirely when the snapshot policy disables snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_before: Option<Value>,

    /// Entity state after the operation. Absent for DELETE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_after: Option<Value>,

    #[serde(default)]
    pub metadata: AuditMetadata,
}

impl AuditLog {
    /// Create a record with a fresh id and the current time.
    pub fn new(operation: AuditOperation, entity_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id: entity_id.into(),
            operation,
            user_id: SYSTEM_USER.to_string(),
            timestamp: Utc::now(),
            changes: Vec::new(),
            snapshot_before: None,
            snapshot_after: None,
            metadata: AuditMetadata::default(),
        }
    }

    /// Create a builder for an audit record.
    pub fn builder(operation: AuditOperation, entity_id: impl Into<String>) -> AuditLogBuilder {
        AuditLogBuilder {
            record: Self::new(operation, entity_id),
        }
    }

    /// Format the record as a compact human-readable log line.
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} entity={} user={} changes={}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.operation,
            self.entity_id,
            self.user_id,
            self.changes.len(),
        );
        if let Some(ref request_id) = self.metadata.request_id {
            line.push_str(&format!(" request_id={request_id}"));
        }
        line
    }
}

/// Builder for audit records.
#[derive(Debug)]
pub struct AuditLogBuilder {
    record: AuditLog,
}

impl AuditLogBuilder {
    /// Set the actor identity.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.record.user_id = user_id.into();
        self
    }

    /// Set the ordered change list.
    pub fn changes(mut self, changes: Vec<ChangeRecord>) -> Self {
        self.record.changes = changes;
        self
    }

    /// Attach the pre-operation snapshot.
    pub fn snapshot_before(mut self, snapshot: Value) -> Self {
        self.record.snapshot_before = Some(snapshot);
        self
    }

    /// Attach the post-operation snapshot.
    pub fn snapshot_after(mut self, snapshot: Value) -> Self {
        self.record.snapshot_after = Some(snapshot);
        self
    }

    /// Attach correlation metadata.
    pub fn metadata(mut self, metadata: AuditMetadata) -> Self {
        self.record.metadata = metadata;
        self
    }

    /// Build the record.
    pub fn build(self) -> AuditLog {
        self.record
    }
}
