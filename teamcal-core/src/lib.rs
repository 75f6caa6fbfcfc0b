//! Calendar ingestion core for teamcal.
//!
//! This crate turns an external iCalendar (ICS) feed into a set of durable
//! event records for one team:
//! - `fetch` retrieves the raw feed text
//! - `ics` parses it into normalized components (all dates become UTC instants)
//! - `expand` produces concrete occurrences within a bounded window,
//!   honoring recurrence rules, exclusion dates and instance overrides
//! - `fingerprint` derives content hashes and deterministic record ids
//! - `reconcile` upserts occurrences against an [`store::EventStore`]
//! - `sync` drives one full run per calendar and across all calendars

pub mod constants;
pub mod error;
pub mod event;
pub mod expand;
pub mod fetch;
pub mod fingerprint;
pub mod ics;
pub mod reconcile;
pub mod store;
pub mod sync;

pub use error::{TeamcalError, TeamcalResult};
pub use event::*;
pub use fetch::{FetchIcs, HttpFetcher};
pub use store::{EventStore, MemoryStore, WriteOp};
pub use sync::Syncer;
