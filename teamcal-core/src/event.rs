//! Data types flowing through the ingestion pipeline.
//!
//! `RawComponent` is what the parser hands to the expander; `Occurrence`
//! is one concrete dated instance; `EventRecord` is the durable shape
//! written to the store. Dates are UTC instants everywhere; no raw ICS
//! date form survives past the parser.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TIME_ZONE;

/// Event status as carried by an ICS STATUS line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    pub fn from_ics(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "TENTATIVE" => EventStatus::Tentative,
            "CANCELLED" => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        }
    }

    pub fn as_ics(&self) -> &'static str {
        match self {
            EventStatus::Confirmed => "CONFIRMED",
            EventStatus::Tentative => "TENTATIVE",
            EventStatus::Cancelled => "CANCELLED",
        }
    }
}

/// One instance exception of a recurring series (a VEVENT carrying
/// RECURRENCE-ID), already concrete.
#[derive(Debug, Clone)]
pub struct RecurrenceOverride {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    /// The override's own STATUS; falls back to the base series' status
    /// when absent.
    pub status: Option<EventStatus>,
    /// Set when the override itself is marked excluded (carries an EXDATE).
    pub excluded: bool,
}

/// One VEVENT after parsing and date normalization, before expansion.
#[derive(Debug, Clone, Default)]
pub struct RawComponent {
    /// UID of the event; shared across all instances of a recurring series.
    pub uid: Option<String>,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub status: EventStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Explicit DURATION, used instead of `end - start` when present.
    pub duration: Option<Duration>,
    /// Whether the underlying DTSTART was a date-only value.
    pub all_day: bool,
    /// Raw RRULE value, evaluated by the expander's rule engine.
    pub rrule: Option<String>,
    /// EXDATE instants, matched by exact equality against generated starts.
    pub exdates: BTreeSet<DateTime<Utc>>,
    /// Instance overrides keyed by the original instance start (epoch millis).
    pub overrides: BTreeMap<i64, RecurrenceOverride>,
}

/// One concrete, dated instance produced by expansion. Never persisted
/// directly; only its derived [`EventRecord`] is.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub uid: Option<String>,
    pub title: String,
    pub description: String,
    pub location: String,
    pub status: EventStatus,
    pub cancelled: bool,
    pub all_day: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The durable per-occurrence record written through the store contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub uid: Option<String>,
    pub status: EventStatus,
    /// Provenance marker; always `"ics"` for records written by this crate.
    pub source: String,
    pub cancelled: bool,
    /// Content fingerprint used for change detection.
    pub hash: String,
    /// Updated on every sync run in which the occurrence is still present.
    pub last_seen_at: DateTime<Utc>,
    /// Updated only when content changes.
    pub updated_at: DateTime<Utc>,
}

/// One externally configured calendar feed, keyed by owner (team).
/// Configured outside the core; the core only reads it and merges back
/// `last_synced_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSource {
    pub owner: String,
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_string()
}

impl CalendarSource {
    pub fn new(owner: impl Into<String>, feed_url: Option<String>) -> Self {
        CalendarSource {
            owner: owner.into(),
            feed_url,
            time_zone: default_time_zone(),
            last_synced_at: None,
        }
    }
}

/// Summary of one sync run, or an aggregate across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub seen: u64,
    pub created: u64,
    pub updated: u64,
    pub cancelled: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SyncResult {
    /// Fold another run's counts into this aggregate. Notes are per-run
    /// and do not aggregate.
    pub fn merge(&mut self, other: &SyncResult) {
        self.seen += other.seen;
        self.created += other.created;
        self.updated += other.updated;
        self.cancelled += other.cancelled;
    }
}
