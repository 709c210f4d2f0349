//! # chronicle-core
//!
//! Shared configuration types for the Chronicle audit engine.
//!
//! This crate holds the global [`AuditConfig`], the per-entity-type
//! [`EntityAuditConfig`] overrides, and the pure resolution rules that turn
//! an entity type name into effective audit behavior: enablement, writer
//! selection, destination naming, field exclusion, and snapshot policy.
//!
//! Resolution is side-effect free; the mutable configuration handle lives in
//! `chronicle-audit` next to the service that consumes it.

pub mod config;

pub use config::{
    AuditConfig, AuditConfigPatch, CompositeWriterConfig, EntityAuditConfig, KeyValueWriterConfig,
    QueueWriterConfig, RelationalWriterConfig, SYSTEM_EXCLUDE_FIELDS, WriterKind, WritersConfig,
    WritersPatch,
};
