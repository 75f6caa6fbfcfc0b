//! ICS feed parsing using the icalendar crate's parser.
//!
//! Every date value is normalized here to a UTC instant; nothing
//! downstream ever inspects a raw ICS date form. VEVENTs sharing a UID
//! are grouped so that instance overrides (RECURRENCE-ID) end up in
//! their master component's override map.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};
use tracing::warn;

use crate::error::{TeamcalError, TeamcalResult};
use crate::event::{EventStatus, RawComponent, RecurrenceOverride};

/// Parse ICS text into normalized components.
///
/// Non-VEVENT components are dropped. A component with an unparseable
/// date is skipped with a warning rather than failing the whole parse;
/// `TeamcalError::Parse` is returned only when the text itself cannot be
/// tokenized as a calendar.
pub fn parse_components(content: &str, default_tz: Tz) -> TeamcalResult<Vec<RawComponent>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| TeamcalError::Parse(e.to_string()))?;

    let mut components: Vec<RawComponent> = Vec::new();
    let mut master_index: HashMap<String, usize> = HashMap::new();
    let mut pending_overrides: Vec<(String, i64, bool, RecurrenceOverride)> = Vec::new();

    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        match parse_vevent(vevent, default_tz) {
            Some(ParsedVevent::Master(component)) => {
                if let Some(uid) = component.uid.clone() {
                    master_index.entry(uid).or_insert(components.len());
                }
                components.push(component);
            }
            Some(ParsedVevent::Override {
                uid,
                original_start,
                all_day,
                entry,
            }) => {
                pending_overrides.push((uid, original_start, all_day, entry));
            }
            None => {}
        }
    }

    // Attach overrides to their masters; overrides whose master is not in
    // the feed become a detached component carrying only the override map.
    let mut detached_index: HashMap<String, usize> = HashMap::new();
    for (uid, original_start, all_day, entry) in pending_overrides {
        if let Some(&idx) = master_index.get(&uid) {
            components[idx].overrides.insert(original_start, entry);
            continue;
        }
        let idx = *detached_index.entry(uid.clone()).or_insert_with(|| {
            components.push(RawComponent {
                uid: Some(uid),
                all_day,
                ..RawComponent::default()
            });
            components.len() - 1
        });
        components[idx].overrides.insert(original_start, entry);
    }

    Ok(components)
}

enum ParsedVevent {
    Master(RawComponent),
    Override {
        uid: String,
        /// Original instance start as epoch millis (the RECURRENCE-ID value).
        original_start: i64,
        all_day: bool,
        entry: RecurrenceOverride,
    },
}

fn parse_vevent(vevent: &Component<'_>, default_tz: Tz) -> Option<ParsedVevent> {
    let uid = vevent.find_prop("UID").map(|p| p.val.to_string());
    let summary = prop_string(vevent, "SUMMARY");
    let description = prop_string(vevent, "DESCRIPTION");
    let location = prop_string(vevent, "LOCATION");

    let status = vevent
        .find_prop("STATUS")
        .map(|p| EventStatus::from_ics(p.val.as_ref()))
        .unwrap_or_default();

    let (start, all_day) = match parse_date_prop(vevent, "DTSTART", default_tz) {
        Ok(value) => value.map(|(dt, all_day)| (Some(dt), all_day)).unwrap_or((None, false)),
        Err(()) => {
            warn!(uid = ?uid, "skipping VEVENT with unparseable DTSTART");
            return None;
        }
    };

    let end = match parse_date_prop(vevent, "DTEND", default_tz) {
        Ok(value) => value.map(|(dt, _)| dt),
        Err(()) => {
            warn!(uid = ?uid, "skipping VEVENT with unparseable DTEND");
            return None;
        }
    };

    let duration = vevent
        .find_prop("DURATION")
        .and_then(|p| parse_ics_duration(p.val.as_ref()));

    // A VEVENT with RECURRENCE-ID is an instance override, not a master.
    if let Some(prop) = vevent.find_prop("RECURRENCE-ID") {
        let Some(uid) = uid else {
            warn!("skipping RECURRENCE-ID VEVENT without UID");
            return None;
        };
        let Some((original_start, _)) = date_perhaps_time(prop, default_tz) else {
            warn!(%uid, "skipping override with unparseable RECURRENCE-ID");
            return None;
        };
        let end = end.or_else(|| match (start, duration) {
            (Some(s), Some(d)) => Some(s + d),
            _ => None,
        });
        let (Some(start), Some(end)) = (start, end) else {
            warn!(%uid, "skipping override without concrete start/end");
            return None;
        };
        let excluded = vevent.find_prop("EXDATE").is_some();
        return Some(ParsedVevent::Override {
            uid,
            original_start: original_start.timestamp_millis(),
            all_day,
            entry: RecurrenceOverride {
                start,
                end,
                summary: non_empty(summary),
                description: non_empty(description),
                location: non_empty(location),
                status: vevent.find_prop("STATUS").map(|p| EventStatus::from_ics(p.val.as_ref())),
                excluded,
            },
        });
    }

    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());

    let exdates = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(|p| parse_exdate_property(p, default_tz))
        .collect();

    Some(ParsedVevent::Master(RawComponent {
        uid,
        summary,
        description,
        location,
        status,
        start,
        end,
        duration,
        all_day,
        rrule,
        exdates,
        overrides: Default::default(),
    }))
}

fn prop_string(vevent: &Component<'_>, name: &str) -> String {
    vevent
        .find_prop(name)
        .map(|p| p.val.to_string())
        .unwrap_or_default()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Read a date property. `Ok(None)` when absent, `Err(())` when present
/// but unparseable (the caller skips the component).
fn parse_date_prop(
    vevent: &Component<'_>,
    name: &str,
    default_tz: Tz,
) -> Result<Option<(DateTime<Utc>, bool)>, ()> {
    match vevent.find_prop(name) {
        None => Ok(None),
        Some(prop) => date_perhaps_time(prop, default_tz).map(Some).ok_or(()),
    }
}

/// Resolve a date/date-time property to a UTC instant plus an all-day flag.
fn date_perhaps_time(prop: &Property<'_>, default_tz: Tz) -> Option<(DateTime<Utc>, bool)> {
    let dpt = DatePerhapsTime::try_from(prop).ok()?;
    match dpt {
        DatePerhapsTime::Date(d) => Some((start_of_day_utc(d)?, true)),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Some((dt, false)),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            Some((localize(naive, default_tz), false))
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            let tz = tzid.parse::<Tz>().unwrap_or(default_tz);
            Some((localize(date_time, tz), false))
        }
    }
}

fn start_of_day_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Interpret a wall-clock time in `tz`. A time falling into a DST gap is
/// treated as UTC rather than dropped.
fn localize(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    naive
        .and_local_timezone(tz)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

/// Parse an EXDATE property into UTC instants.
///
/// Handles:
/// - TZID parameter: `EXDATE;TZID=America/New_York:20240108T100000`
/// - VALUE=DATE: `EXDATE;VALUE=DATE:20240108`
/// - UTC: `EXDATE:20240108T100000Z`
/// - Floating: `EXDATE:20240108T100000`
/// - Comma-separated values
fn parse_exdate_property(prop: &Property<'_>, default_tz: Tz) -> Vec<DateTime<Utc>> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if is_date {
                let date = NaiveDate::parse_from_str(s, "%Y%m%d").ok()?;
                start_of_day_utc(date)
            } else if let Some(ref tzid) = tzid {
                let naive = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()?;
                let tz = tzid.parse::<Tz>().unwrap_or(default_tz);
                Some(localize(naive, tz))
            } else if let Some(stripped) = s.strip_suffix('Z') {
                let naive = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").ok()?;
                Some(naive.and_utc())
            } else {
                let naive = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()?;
                Some(localize(naive, default_tz))
            }
        })
        .collect()
}

/// Parse an ISO-8601 duration value (PT1H30M, P1D, ...).
fn parse_ics_duration(value: &str) -> Option<Duration> {
    let parsed = iso8601::duration(value).ok()?;
    let std_duration: std::time::Duration = parsed.into();
    Duration::from_std(std_duration).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_TZ;
    use chrono::TimeZone;

    fn parse(content: &str) -> Vec<RawComponent> {
        parse_components(content, DEFAULT_TZ).expect("should parse")
    }

    #[test]
    fn test_parse_single_vevent() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:practice-1\r\n\
SUMMARY:Practice\r\n\
DTSTART:20250110T090000Z\r\n\
DTEND:20250110T100000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        assert_eq!(components.len(), 1);
        let c = &components[0];
        assert_eq!(c.uid.as_deref(), Some("practice-1"));
        assert_eq!(c.summary, "Practice");
        assert_eq!(c.status, EventStatus::Confirmed);
        assert!(!c.all_day);
        assert_eq!(c.start, Some(Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap()));
        assert_eq!(c.end, Some(Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap()));
        assert!(c.rrule.is_none());
        assert!(c.exdates.is_empty());
    }

    #[test]
    fn test_missing_optional_fields_degrade_to_empty() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
DTSTART:20250110T090000Z\r\n\
DTEND:20250110T100000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        assert_eq!(components.len(), 1);
        let c = &components[0];
        assert_eq!(c.uid, None);
        assert_eq!(c.summary, "");
        assert_eq!(c.description, "");
        assert_eq!(c.location, "");
    }

    #[test]
    fn test_date_only_start_is_all_day_midnight_utc() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:holiday\r\n\
SUMMARY:Club holiday\r\n\
DTSTART;VALUE=DATE:20250301\r\n\
DTEND;VALUE=DATE:20250302\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        let c = &components[0];
        assert!(c.all_day);
        assert_eq!(c.start, Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_rrule_and_exdates_collected() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:weekly-1\r\n\
SUMMARY:Training\r\n\
DTSTART:20250107T180000Z\r\n\
DTEND:20250107T200000Z\r\n\
RRULE:FREQ=WEEKLY\r\n\
EXDATE:20250114T180000Z,20250121T180000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        let c = &components[0];
        assert_eq!(c.rrule.as_deref(), Some("FREQ=WEEKLY"));
        assert_eq!(c.exdates.len(), 2);
        assert!(c.exdates.contains(&Utc.with_ymd_and_hms(2025, 1, 14, 18, 0, 0).unwrap()));
        assert!(c.exdates.contains(&Utc.with_ymd_and_hms(2025, 1, 21, 18, 0, 0).unwrap()));
    }

    #[test]
    fn test_floating_time_interpreted_in_default_tz() {
        // 09:00 floating in Europe/Paris winter time is 08:00 UTC
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:floating\r\n\
DTSTART:20250110T090000\r\n\
DTEND:20250110T100000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        let c = &components[0];
        assert_eq!(c.start, Some(Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap()));
    }

    #[test]
    fn test_override_attached_to_master() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:series-1\r\n\
SUMMARY:Weekly match\r\n\
DTSTART:20250107T180000Z\r\n\
DTEND:20250107T190000Z\r\n\
RRULE:FREQ=WEEKLY\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:series-1\r\n\
SUMMARY:Moved match\r\n\
RECURRENCE-ID:20250114T180000Z\r\n\
DTSTART:20250115T180000Z\r\n\
DTEND:20250115T190000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        assert_eq!(components.len(), 1);
        let c = &components[0];
        assert_eq!(c.overrides.len(), 1);
        let original = Utc.with_ymd_and_hms(2025, 1, 14, 18, 0, 0).unwrap();
        let entry = &c.overrides[&original.timestamp_millis()];
        assert_eq!(entry.summary.as_deref(), Some("Moved match"));
        assert_eq!(entry.start, Utc.with_ymd_and_hms(2025, 1, 15, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_detached_override_without_master() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:detached-1\r\n\
SUMMARY:Rescheduled session\r\n\
RECURRENCE-ID:20250203T100000Z\r\n\
DTSTART:20250204T100000Z\r\n\
DTEND:20250204T110000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        assert_eq!(components.len(), 1);
        let c = &components[0];
        assert!(c.rrule.is_none());
        assert!(c.start.is_none());
        assert_eq!(c.overrides.len(), 1);
    }

    #[test]
    fn test_cancelled_status_parsed() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:gone\r\n\
STATUS:CANCELLED\r\n\
DTSTART:20250110T090000Z\r\n\
DTEND:20250110T100000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        assert_eq!(components[0].status, EventStatus::Cancelled);
    }

    #[test]
    fn test_non_vevent_components_dropped() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Europe/Paris\r\n\
END:VTIMEZONE\r\n\
BEGIN:VTODO\r\n\
UID:todo-1\r\n\
END:VTODO\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        assert!(components.is_empty());
    }

    #[test]
    fn test_garbage_dtstart_skips_only_that_vevent() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:broken\r\n\
SUMMARY:Broken\r\n\
DTSTART:not-a-date\r\n\
DTEND:20250110T100000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:good\r\n\
SUMMARY:Practice\r\n\
DTSTART:20250110T090000Z\r\n\
DTEND:20250110T100000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].uid.as_deref(), Some("good"));
    }

    #[test]
    fn test_untokenizable_input_is_parse_error() {
        let result = parse_components("this is not a calendar at all", DEFAULT_TZ);
        assert!(matches!(result, Err(TeamcalError::Parse(_))));
    }

    #[test]
    fn test_duration_property_parsed() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:timed\r\n\
DTSTART:20250110T090000Z\r\n\
DURATION:PT1H30M\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let components = parse(ics);
        assert_eq!(components[0].duration, Some(Duration::minutes(90)));
        assert_eq!(components[0].end, None);
    }
}
