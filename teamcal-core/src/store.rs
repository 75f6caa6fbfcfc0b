//! The event store contract and an in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TeamcalResult;
use crate::event::{CalendarSource, EventRecord};

/// One write against the store, applied in order within a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create or fully overwrite a record.
    Upsert { id: String, record: EventRecord },
    /// Touch only the last-seen timestamp of an existing record.
    Refresh {
        id: String,
        last_seen_at: DateTime<Utc>,
    },
}

/// Storage contract the ingestion core reads and writes through.
///
/// `commit` must apply the whole batch atomically; callers keep batches
/// within the store's size limit and commit them sequentially. Stale
/// records are never deleted here; `last_seen_at` falling behind is the
/// signal for whatever expiry policy the store owner applies.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn load_source(&self, owner: &str) -> TeamcalResult<Option<CalendarSource>>;

    async fn list_sources(&self) -> TeamcalResult<Vec<CalendarSource>>;

    async fn get_record(&self, owner: &str, id: &str) -> TeamcalResult<Option<EventRecord>>;

    async fn commit(&self, owner: &str, batch: Vec<WriteOp>) -> TeamcalResult<()>;

    async fn set_last_synced(&self, owner: &str, at: DateTime<Utc>) -> TeamcalResult<()>;
}

/// In-memory store for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    sources: HashMap<String, CalendarSource>,
    events: HashMap<String, HashMap<String, EventRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_source(&self, source: CalendarSource) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.sources.insert(source.owner.clone(), source);
    }

    pub fn record(&self, owner: &str, id: &str) -> Option<EventRecord> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.events.get(owner).and_then(|m| m.get(id)).cloned()
    }

    pub fn records(&self, owner: &str) -> Vec<EventRecord> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .events
            .get(owner)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn load_source(&self, owner: &str) -> TeamcalResult<Option<CalendarSource>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.sources.get(owner).cloned())
    }

    async fn list_sources(&self) -> TeamcalResult<Vec<CalendarSource>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut sources: Vec<_> = inner.sources.values().cloned().collect();
        sources.sort_by(|a, b| a.owner.cmp(&b.owner));
        Ok(sources)
    }

    async fn get_record(&self, owner: &str, id: &str) -> TeamcalResult<Option<EventRecord>> {
        Ok(self.record(owner, id))
    }

    async fn commit(&self, owner: &str, batch: Vec<WriteOp>) -> TeamcalResult<()> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let events = inner.events.entry(owner.to_string()).or_default();
        for op in batch {
            match op {
                WriteOp::Upsert { id, record } => {
                    events.insert(id, record);
                }
                WriteOp::Refresh { id, last_seen_at } => {
                    if let Some(record) = events.get_mut(&id) {
                        record.last_seen_at = last_seen_at;
                    }
                }
            }
        }
        Ok(())
    }

    async fn set_last_synced(&self, owner: &str, at: DateTime<Utc>) -> TeamcalResult<()> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(source) = inner.sources.get_mut(owner) {
            source.last_synced_at = Some(at);
        }
        Ok(())
    }
}
