//! Occurrence calculation for recurring alarms.
//!
//! Everything here is a pure function of the alarm's rule, its time of day
//! and the instant asked about. Times are host-local naive timestamps.

use crate::alarm::{Alarm, RepeatRule, TimeOfDay};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

/// Any non-empty weekday set matches within this many days of a given date.
const SEARCH_DAYS: i64 = 7;

/// First occurrence strictly after `after`, or `None` for a spent `once`
/// alarm or an empty weekday set.
pub fn next_occurrence(alarm: &Alarm, after: NaiveDateTime) -> Option<NaiveDateTime> {
    if alarm.is_spent() {
        return None;
    }
    next_matching(&alarm.repeat_rule, alarm.time_of_day, after)
}

/// Most recent occurrence at or before `at` that the alarm was armed for.
///
/// Only the single latest instant is returned, however many were missed.
pub fn latest_occurrence(alarm: &Alarm, at: NaiveDateTime) -> Option<NaiveDateTime> {
    let found = latest_matching(&alarm.repeat_rule, alarm.time_of_day, at)?;
    match alarm.armed_at {
        Some(armed) if found < armed => None,
        _ => Some(found),
    }
}

pub fn next_matching(
    rule: &RepeatRule,
    time: TimeOfDay,
    after: NaiveDateTime,
) -> Option<NaiveDateTime> {
    if rule.is_empty() {
        return None;
    }
    let start = after.date();
    (0..=SEARCH_DAYS)
        .map(|offset| start + Duration::days(offset))
        .filter_map(|date| candidate(rule, time, date))
        .find(|instant| *instant > after)
}

pub fn latest_matching(
    rule: &RepeatRule,
    time: TimeOfDay,
    at: NaiveDateTime,
) -> Option<NaiveDateTime> {
    if rule.is_empty() {
        return None;
    }
    let start = at.date();
    (0..=SEARCH_DAYS)
        .map(|offset| start - Duration::days(offset))
        .filter_map(|date| candidate(rule, time, date))
        .find(|instant| *instant <= at)
}

fn candidate(rule: &RepeatRule, time: TimeOfDay, date: NaiveDate) -> Option<NaiveDateTime> {
    rule.allows(date.weekday())
        .then(|| date.and_time(time.as_naive_time()))
}
