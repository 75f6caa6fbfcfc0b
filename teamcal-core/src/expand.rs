//! Occurrence expansion over a bounded time window.
//!
//! Each component is expanded by exactly one strategy, in priority order:
//! a recurrence rule, an instance-override map, or a plain single event.

use chrono::{DateTime, Duration, Utc};
use rrule::RRuleSet;
use tracing::warn;

use crate::constants::RRULE_EXPANSION_LIMIT;
use crate::event::{EventStatus, Occurrence, RawComponent};

/// Expand parsed components into concrete occurrences whose starts fall
/// inside the inclusive window `[window_start, window_end]`.
pub fn expand(
    components: &[RawComponent],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<Occurrence> {
    let mut out = Vec::new();
    for component in components {
        if component.rrule.is_some() {
            expand_recurring(component, window_start, window_end, &mut out);
        } else if !component.overrides.is_empty() {
            expand_overrides(component, window_start, window_end, &mut out);
        } else {
            expand_single(component, window_start, window_end, &mut out);
        }
    }
    out
}

fn expand_recurring(
    component: &RawComponent,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    out: &mut Vec<Occurrence>,
) {
    let Some(rrule) = component.rrule.as_deref() else {
        return;
    };
    let Some(start) = component.start else {
        warn!(uid = ?component.uid, "recurring component without DTSTART, skipping");
        return;
    };

    // Instance length carried onto every generated start. A rule with
    // neither DURATION nor DTEND yields zero-length occurrences.
    let duration = component
        .duration
        .or_else(|| component.end.map(|end| end - start))
        .unwrap_or_else(Duration::zero);

    let input = format!("DTSTART:{}\nRRULE:{}", start.format("%Y%m%dT%H%M%SZ"), rrule);
    let rrule_set: RRuleSet = match input.parse() {
        Ok(set) => set,
        Err(e) => {
            warn!(uid = ?component.uid, error = %e, "unparseable RRULE, skipping component");
            return;
        }
    };

    // after/before are exclusive; widen by a second so the window bounds
    // themselves are included.
    let tz: rrule::Tz = Utc.into();
    let after = (window_start - Duration::seconds(1)).with_timezone(&tz);
    let before = (window_end + Duration::seconds(1)).with_timezone(&tz);
    let result = rrule_set
        .after(after)
        .before(before)
        .all(RRULE_EXPANSION_LIMIT);

    for dt in &result.dates {
        let occ_start = dt.with_timezone(&Utc);
        if component.exdates.contains(&occ_start) {
            continue;
        }
        out.push(occurrence_from(component, occ_start, occ_start + duration));
    }
}

fn expand_overrides(
    component: &RawComponent,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    out: &mut Vec<Occurrence>,
) {
    for entry in component.overrides.values() {
        if entry.excluded {
            continue;
        }
        if entry.start < window_start || entry.start > window_end {
            continue;
        }
        let status = entry.status.unwrap_or(component.status);
        out.push(Occurrence {
            uid: component.uid.clone(),
            title: entry.summary.clone().unwrap_or_else(|| component.summary.clone()),
            description: entry
                .description
                .clone()
                .unwrap_or_else(|| component.description.clone()),
            location: entry.location.clone().unwrap_or_else(|| component.location.clone()),
            status,
            cancelled: status == EventStatus::Cancelled,
            all_day: component.all_day,
            start: entry.start,
            end: entry.end.max(entry.start),
        });
    }
}

fn expand_single(
    component: &RawComponent,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    out: &mut Vec<Occurrence>,
) {
    let (Some(start), Some(end)) = (component.start, component.end) else {
        return;
    };
    if start < window_start || start > window_end {
        return;
    }
    out.push(occurrence_from(component, start, end.max(start)));
}

fn occurrence_from(
    component: &RawComponent,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Occurrence {
    Occurrence {
        uid: component.uid.clone(),
        title: component.summary.clone(),
        description: component.description.clone(),
        location: component.location.clone(),
        status: component.status,
        cancelled: component.status == EventStatus::Cancelled,
        all_day: component.all_day,
        start,
        end,
    }
}
