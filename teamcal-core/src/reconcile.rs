//! Idempotent reconciliation of occurrences against the event store.

use chrono::{DateTime, Utc};

use crate::constants::MAX_BATCH_OPS;
use crate::error::TeamcalResult;
use crate::event::{EventRecord, Occurrence, SyncResult};
use crate::fingerprint::{fingerprint, record_id};
use crate::store::{EventStore, WriteOp};

/// Reconcile expanded occurrences against existing records for one owner.
///
/// Every occurrence maps to a deterministic record id; the decision per
/// occurrence is:
/// - no existing record: write full record (counted as `created`, or
///   `cancelled` when the occurrence arrives already cancelled)
/// - fingerprint or cancelled flag differs: overwrite (a false→true
///   cancellation transition counts as `cancelled`, anything else as
///   `updated`)
/// - otherwise: refresh `last_seen_at` only
///
/// Writes accumulate into batches of at most `MAX_BATCH_OPS` committed
/// sequentially at the end; a failed commit aborts the rest of the run.
pub async fn reconcile<S: EventStore>(
    store: &S,
    owner: &str,
    occurrences: &[Occurrence],
    now: DateTime<Utc>,
) -> TeamcalResult<SyncResult> {
    let mut result = SyncResult::default();
    let mut batch: Vec<WriteOp> = Vec::new();

    for occurrence in occurrences {
        result.seen += 1;

        let id = record_id(owner, occurrence.uid.as_deref(), &occurrence.start);
        let hash = fingerprint(occurrence);

        match store.get_record(owner, &id).await? {
            None => {
                if occurrence.cancelled {
                    result.cancelled += 1;
                } else {
                    result.created += 1;
                }
                batch.push(WriteOp::Upsert {
                    id,
                    record: make_record(occurrence, hash, now),
                });
            }
            Some(prev) if prev.hash != hash || prev.cancelled != occurrence.cancelled => {
                if occurrence.cancelled && !prev.cancelled {
                    result.cancelled += 1;
                } else {
                    result.updated += 1;
                }
                batch.push(WriteOp::Upsert {
                    id,
                    record: make_record(occurrence, hash, now),
                });
            }
            Some(_) => {
                batch.push(WriteOp::Refresh {
                    id,
                    last_seen_at: now,
                });
            }
        }
    }

    for chunk in batch.chunks(MAX_BATCH_OPS) {
        store.commit(owner, chunk.to_vec()).await?;
    }

    Ok(result)
}

fn make_record(occurrence: &Occurrence, hash: String, now: DateTime<Utc>) -> EventRecord {
    EventRecord {
        title: occurrence.title.clone(),
        description: occurrence.description.clone(),
        location: occurrence.location.clone(),
        start: occurrence.start,
        end: occurrence.end,
        all_day: occurrence.all_day,
        uid: occurrence.uid.clone(),
        status: occurrence.status,
        source: "ics".to_string(),
        cancelled: occurrence.cancelled,
        hash,
        last_seen_at: now,
        updated_at: now,
    }
}
