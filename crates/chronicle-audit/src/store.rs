//! Generic backend handles the writers push into.
//!
//! The engine never reads audit data back; these traits are deliberately
//! write-only. Production deployments implement them over their real
//! key-value store and queue clients; the in-memory implementations here
//! back tests and local development.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Write-only handle to a durable key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Persist one item into a table.
    async fn put_item(&self, table: &str, item: Value) -> anyhow::Result<()>;

    /// Persist a batch of items into a table. Callers chunk to the
    /// backend's per-request limit before calling.
    async fn put_items(&self, table: &str, items: Vec<Value>) -> anyhow::Result<()>;
}

/// One message handed to a queue backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Serialized payload.
    pub body: String,

    /// FIFO message group, unset for standard queues.
    pub group_id: Option<String>,

    /// FIFO per-message deduplication id.
    pub dedup_id: Option<String>,
}

/// Write-only handle to an async queue.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Publish one message to an endpoint.
    async fn send(&self, endpoint: &str, message: QueueMessage) -> anyhow::Result<()>;

    /// Publish a batch of messages. Callers chunk to the backend's
    /// per-request limit before calling.
    async fn send_batch(&self, endpoint: &str, messages: Vec<QueueMessage>) -> anyhow::Result<()>;
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items written to a table so far, in write order.
    pub fn items(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn put_item(&self, table: &str, item: Value) -> anyhow::Result<()> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(table.to_string())
            .or_default()
            .push(item);
        Ok(())
    }

    async fn put_items(&self, table: &str, items: Vec<Value>) -> anyhow::Result<()> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(table.to_string())
            .or_default()
            .extend(items);
        Ok(())
    }
}

/// In-memory queue.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, Vec<QueueMessage>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages published to an endpoint so far, in publish order.
    pub fn messages(&self, endpoint: &str) -> Vec<QueueMessage> {
        self.queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueuePublisher for MemoryQueue {
    async fn send(&self, endpoint: &str, message: QueueMessage) -> anyhow::Result<()> {
        self.queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(endpoint.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn send_batch(&self, endpoint: &str, messages: Vec<QueueMessage>) -> anyhow::Result<()> {
        self.queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(endpoint.to_string())
            .or_default()
            .extend(messages);
        Ok(())
    }
}
