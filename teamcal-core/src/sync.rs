//! Sync orchestration: one full run per calendar, and the all-calendars pass.

use chrono::{Duration, Utc};
use chrono_tz::Tz;
use tracing::{error, info, warn};

use crate::constants::{DEFAULT_TZ, EXPANSION_DAYS};
use crate::error::{TeamcalError, TeamcalResult};
use crate::event::SyncResult;
use crate::expand::expand;
use crate::fetch::FetchIcs;
use crate::ics::parse_components;
use crate::reconcile::reconcile;
use crate::store::EventStore;

/// Drives sync runs over an injected store and fetcher.
pub struct Syncer<S, F> {
    store: S,
    fetcher: F,
    window_days: i64,
}

impl<S: EventStore, F: FetchIcs> Syncer<S, F> {
    pub fn new(store: S, fetcher: F) -> Self {
        Syncer {
            store,
            fetcher,
            window_days: EXPANSION_DAYS,
        }
    }

    /// Override how far ahead of "now" the expansion window extends.
    pub fn with_window_days(mut self, days: i64) -> Self {
        self.window_days = days;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one full sync for a single calendar.
    ///
    /// A missing source is an error; a source with no feed URL yields a
    /// zero result with a note (a calendar may legitimately have no feed).
    /// Nothing is written unless fetch, parse and expand all succeed.
    pub async fn sync_one(&self, owner: &str) -> TeamcalResult<SyncResult> {
        let source = self
            .store
            .load_source(owner)
            .await?
            .ok_or_else(|| TeamcalError::NotFound(owner.to_string()))?;

        let Some(feed_url) = source.feed_url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(SyncResult {
                note: Some("no feed url configured".into()),
                ..SyncResult::default()
            });
        };

        let tz = match source.time_zone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(owner, time_zone = %source.time_zone, "unknown timezone, using default");
                DEFAULT_TZ
            }
        };

        let now = Utc::now();
        let window_start = now;
        let window_end = now + Duration::days(self.window_days);

        let text = self.fetcher.fetch(feed_url).await?;
        let components = parse_components(&text, tz)?;
        let occurrences = expand(&components, window_start, window_end);

        let result = reconcile(&self.store, owner, &occurrences, now).await?;
        self.store.set_last_synced(owner, now).await?;

        info!(
            owner,
            seen = result.seen,
            created = result.created,
            updated = result.updated,
            cancelled = result.cancelled,
            "calendar sync complete"
        );
        Ok(result)
    }

    /// Sync every calendar that has a configured feed URL.
    ///
    /// A single calendar's failure is logged and excluded from the
    /// aggregate; it never aborts the sibling calendars.
    pub async fn sync_all(&self) -> TeamcalResult<SyncResult> {
        let sources = self.store.list_sources().await?;

        let mut totals = SyncResult::default();
        for source in sources {
            if source.feed_url.as_deref().is_none_or(|u| u.is_empty()) {
                continue;
            }
            match self.sync_one(&source.owner).await {
                Ok(result) => totals.merge(&result),
                Err(e) => error!(owner = %source.owner, error = %e, "calendar sync failed"),
            }
        }

        info!(
            seen = totals.seen,
            created = totals.created,
            updated = totals.updated,
            cancelled = totals.cancelled,
            "ics sync pass done"
        );
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CalendarSource;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Fetcher serving canned feed bodies; unknown URLs fail with a
    /// transport error.
    #[derive(Default)]
    struct StubFetcher {
        feeds: HashMap<String, String>,
    }

    impl StubFetcher {
        fn with_feed(url: &str, body: &str) -> Self {
            let mut feeds = HashMap::new();
            feeds.insert(url.to_string(), body.to_string());
            StubFetcher { feeds }
        }
    }

    #[async_trait]
    impl FetchIcs for StubFetcher {
        async fn fetch(&self, url: &str) -> TeamcalResult<String> {
            self.feeds
                .get(url)
                .cloned()
                .ok_or_else(|| TeamcalError::Transport {
                    status: Some(404),
                    message: format!("no feed at {url}"),
                })
        }
    }

    const PRACTICE_FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:practice-1\r\n\
SUMMARY:Practice\r\n\
DTSTART:20991110T090000Z\r\n\
DTEND:20991110T100000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    fn store_with_source(owner: &str, url: Option<&str>) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_source(CalendarSource::new(owner, url.map(String::from)));
        store
    }

    #[tokio::test]
    async fn test_sync_one_unknown_owner_is_not_found() {
        let syncer = Syncer::new(MemoryStore::new(), StubFetcher::default());
        let result = syncer.sync_one("ghost").await;
        assert!(matches!(result, Err(TeamcalError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sync_one_without_feed_url_is_zero_result_with_note() {
        let store = store_with_source("team-a", None);
        let syncer = Syncer::new(store, StubFetcher::default());

        let result = syncer.sync_one("team-a").await.unwrap();
        assert_eq!(result.seen, 0);
        assert!(result.note.is_some());
    }

    #[tokio::test]
    async fn test_sync_one_creates_then_is_idempotent() {
        // Window widened so the fixed 2099 feed date stays inside it
        // regardless of when the test runs.
        let store = store_with_source("team-a", Some("https://feeds.test/a.ics"));
        let fetcher = StubFetcher::with_feed("https://feeds.test/a.ics", PRACTICE_FEED);
        let syncer = Syncer::new(store, fetcher).with_window_days(365 * 100);

        let first = syncer.sync_one("team-a").await.unwrap();
        assert_eq!(first.seen, 1);
        assert_eq!(first.created, 1);

        let second = syncer.sync_one("team-a").await.unwrap();
        assert_eq!(second.seen, first.seen);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.cancelled, 0);

        let records = syncer.store().records("team-a");
        assert_eq!(records.len(), 1, "no duplicate record on re-sync");
        assert_eq!(records[0].title, "Practice");
        assert!(!records[0].all_day);
        assert!(!records[0].cancelled);
    }

    #[tokio::test]
    async fn test_sync_one_records_last_synced_at() {
        let store = store_with_source("team-a", Some("https://feeds.test/a.ics"));
        let fetcher = StubFetcher::with_feed("https://feeds.test/a.ics", PRACTICE_FEED);
        let syncer = Syncer::new(store, fetcher).with_window_days(365 * 100);

        syncer.sync_one("team-a").await.unwrap();

        let source = syncer.store().load_source("team-a").await.unwrap().unwrap();
        assert!(source.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn test_sync_one_transport_failure_leaves_no_writes() {
        let store = store_with_source("team-a", Some("https://feeds.test/missing.ics"));
        let syncer = Syncer::new(store, StubFetcher::default());

        let result = syncer.sync_one("team-a").await;
        assert!(matches!(result, Err(TeamcalError::Transport { status: Some(404), .. })));
        assert!(syncer.store().records("team-a").is_empty());

        let source = syncer.store().load_source("team-a").await.unwrap().unwrap();
        assert!(source.last_synced_at.is_none());
    }

    #[tokio::test]
    async fn test_sync_one_unparseable_feed_is_parse_error() {
        let store = store_with_source("team-a", Some("https://feeds.test/bad.ics"));
        let fetcher = StubFetcher::with_feed("https://feeds.test/bad.ics", "<html>not a feed</html>");
        let syncer = Syncer::new(store, fetcher);

        let result = syncer.sync_one("team-a").await;
        assert!(matches!(result, Err(TeamcalError::Parse(_))));
    }

    #[tokio::test]
    async fn test_sync_all_isolates_failing_calendar() {
        let store = MemoryStore::new();
        store.insert_source(CalendarSource::new(
            "team-bad",
            Some("https://feeds.test/broken.ics".into()),
        ));
        store.insert_source(CalendarSource::new(
            "team-good",
            Some("https://feeds.test/a.ics".into()),
        ));
        store.insert_source(CalendarSource::new("team-nofeed", None));

        let fetcher = StubFetcher::with_feed("https://feeds.test/a.ics", PRACTICE_FEED);
        let syncer = Syncer::new(store, fetcher).with_window_days(365 * 100);

        let totals = syncer.sync_all().await.unwrap();

        // team-bad fails on fetch, team-nofeed is skipped; only team-good counts.
        assert_eq!(totals.seen, 1);
        assert_eq!(totals.created, 1);
        assert_eq!(syncer.store().records("team-good").len(), 1);
        assert!(syncer.store().records("team-bad").is_empty());
    }
}
