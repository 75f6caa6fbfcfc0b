//! Shared constants for the ingestion pipeline.

use chrono_tz::Tz;

/// How far ahead of "now" the expansion window extends.
pub const EXPANSION_DAYS: i64 = 180;

/// Timezone used for floating and unresolvable zoned ICS times when the
/// calendar source does not configure one.
pub const DEFAULT_TIME_ZONE: &str = "Europe/Paris";

/// Parsed form of [`DEFAULT_TIME_ZONE`].
pub const DEFAULT_TZ: Tz = chrono_tz::Europe::Paris;

/// Maximum number of write operations per committed batch.
pub const MAX_BATCH_OPS: usize = 500;

/// Upper bound on instants generated from a single recurrence rule.
/// A 180-day window with a daily rule stays well under this.
pub const RRULE_EXPANSION_LIMIT: u16 = 1000;
