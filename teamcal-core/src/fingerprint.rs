//! Content fingerprints and deterministic record identifiers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::event::Occurrence;

/// Sentinel substituted for a missing UID so identifier derivation stays
/// deterministic. Two uid-less occurrences at the same instant share an
/// identifier; the feed gives us nothing better to key on.
const NO_UID: &str = "NOUID";

fn canonical_instant(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Stable content hash over the semantically meaningful occurrence fields.
///
/// The digest is computed over a canonical JSON rendering (sorted keys,
/// instants as ISO-8601 UTC), so two occurrences with identical content
/// always hash identically and any single field change alters the digest.
pub fn fingerprint(occurrence: &Occurrence) -> String {
    let canonical = json!({
        "title": occurrence.title,
        "description": occurrence.description,
        "location": occurrence.location,
        "start": canonical_instant(&occurrence.start),
        "end": canonical_instant(&occurrence.end),
        "status": occurrence.status.as_ics(),
        "allDay": occurrence.all_day,
        "cancelled": occurrence.cancelled,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministic record identifier for `(owner, uid, start)`.
///
/// Stable across runs and independent of processing order: the same
/// occurrence always maps to the same stored record.
pub fn record_id(owner: &str, uid: Option<&str>, start: &DateTime<Utc>) -> String {
    let key = format!(
        "{}/{}/{}",
        owner,
        uid.unwrap_or(NO_UID),
        start.timestamp_millis()
    );
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
