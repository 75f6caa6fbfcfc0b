//! JSON-file-backed event store.
//!
//! Layout under the data directory:
//! - `sources.json` — map of owner key to calendar source
//! - `events/{owner}.json` — map of record id to event record
//!
//! Each commit rewrites the owner's event file through a temp-file rename,
//! so a batch lands atomically or not at all.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teamcal_core::{
    CalendarSource, EventRecord, EventStore, TeamcalError, TeamcalResult, WriteOp,
};

pub struct JsonStore {
    data_dir: PathBuf,
    // Serializes read-modify-write cycles on the JSON files.
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(data_dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir.join("events"))?;
        Ok(JsonStore {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn sources_path(&self) -> PathBuf {
        self.data_dir.join("sources.json")
    }

    fn events_path(&self, owner: &str) -> TeamcalResult<PathBuf> {
        if owner.is_empty()
            || !owner
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TeamcalError::Persistence(format!(
                "invalid owner key '{owner}'"
            )));
        }
        Ok(self.data_dir.join("events").join(format!("{owner}.json")))
    }

    fn read_sources(&self) -> TeamcalResult<HashMap<String, CalendarSource>> {
        read_json_map(&self.sources_path())
    }

    fn read_events(&self, owner: &str) -> TeamcalResult<HashMap<String, EventRecord>> {
        read_json_map(&self.events_path(owner)?)
    }

    fn write_events(
        &self,
        owner: &str,
        events: &HashMap<String, EventRecord>,
    ) -> TeamcalResult<()> {
        write_json_atomic(&self.events_path(owner)?, events)
    }
}

fn read_json_map<T: serde::de::DeserializeOwned>(path: &Path) -> TeamcalResult<HashMap<String, T>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| TeamcalError::Persistence(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| TeamcalError::Persistence(format!("decode {}: {e}", path.display())))
}

fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> TeamcalResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| TeamcalError::Persistence(format!("encode {}: {e}", path.display())))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .map_err(|e| TeamcalError::Persistence(format!("write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| TeamcalError::Persistence(format!("rename {}: {e}", path.display())))
}

#[async_trait]
impl EventStore for JsonStore {
    async fn load_source(&self, owner: &str) -> TeamcalResult<Option<CalendarSource>> {
        Ok(self.read_sources()?.remove(owner))
    }

    async fn list_sources(&self) -> TeamcalResult<Vec<CalendarSource>> {
        let mut sources: Vec<_> = self.read_sources()?.into_values().collect();
        sources.sort_by(|a, b| a.owner.cmp(&b.owner));
        Ok(sources)
    }

    async fn get_record(&self, owner: &str, id: &str) -> TeamcalResult<Option<EventRecord>> {
        Ok(self.read_events(owner)?.remove(id))
    }

    async fn commit(&self, owner: &str, batch: Vec<WriteOp>) -> TeamcalResult<()> {
        let _guard = self.write_lock.lock().expect("store mutex poisoned");

        let mut events = self.read_events(owner)?;
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
        self.write_events(owner, &events)
    }

    async fn set_last_synced(&self, owner: &str, at: DateTime<Utc>) -> TeamcalResult<()> {
        let _guard = self.write_lock.lock().expect("store mutex poisoned");

        let mut sources = self.read_sources()?;
        if let Some(source) = sources.get_mut(owner) {
            source.last_synced_at = Some(at);
        }
        write_json_atomic(&self.sources_path(), &sources)
    }
}

impl JsonStore {
    /// Seed or replace a calendar source in the sources file. Used by
    /// operators and tests to configure feeds; the sync core never calls it.
    pub fn upsert_source(&self, source: CalendarSource) -> TeamcalResult<()> {
        let _guard = self.write_lock.lock().expect("store mutex poisoned");

        let mut sources = self.read_sources()?;
        sources.insert(source.owner.clone(), source);
        write_json_atomic(&self.sources_path(), &sources)
    }
}
