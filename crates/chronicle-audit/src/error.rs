//! Error types for the audit crate.

use thiserror::Error;

/// Errors that can occur while persisting audit records.
///
/// Nothing in this enum ever reaches a business caller: concrete writers
/// surface failures through `Result`, the composite writer aggregates them,
/// and the orchestrator logs and swallows at its boundary.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A writer backend rejected or failed a write.
    #[error("write to '{destination}' failed: {reason}")]
    WriteFailed { destination: String, reason: String },

    /// A writer was selected whose backend handle is not configured.
    #[error("writer backend '{0}' is not configured")]
    BackendUnavailable(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Relational store error.
    #[error("relational store error: {0}")]
    Relational(#[from] sqlx::Error),

    /// Invalid destination identifier for the relational backend.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
