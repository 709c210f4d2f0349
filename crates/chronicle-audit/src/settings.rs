//! Shared audit configuration handle.
//!
//! Replaces ambient global state with an explicitly injected provider: the
//! service holds one [`AuditConfigHandle`], readers take cheap `Arc`
//! snapshots, and every update installs a fresh copy (copy-on-write), so a
//! config already handed to a caller is never mutated underneath it.

use std::sync::{Arc, RwLock};

use chronicle_core::{AuditConfig, AuditConfigPatch, EntityAuditConfig};

/// Copy-on-write provider for the audit configuration.
#[derive(Debug)]
pub struct AuditConfigHandle {
    inner: RwLock<Arc<AuditConfig>>,
}

impl Default for AuditConfigHandle {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}

impl AuditConfigHandle {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(config)),
        }
    }

    /// A consistent snapshot of the current configuration.
    pub fn current(&self) -> Arc<AuditConfig> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Apply a partial update: top-level scalars replace, the `entities` and
    /// `writers` maps deep-merge.
    pub fn update(&self, patch: AuditConfigPatch) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(guard.merged(patch));
    }

    /// Replace an entity type's override wholesale (not field-by-field).
    pub fn configure_entity(&self, entity_type: impl Into<String>, config: EntityAuditConfig) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = (**guard).clone();
        next.entities.insert(entity_type.into(), config);
        *guard = Arc::new(next);
    }

    /// Drop everything back to defaults. Test isolation hook.
    pub fn reset(&self) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(AuditConfig::default());
    }
}
