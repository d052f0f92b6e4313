//! Calendar-month buckets.
//!
//! A month bucket is represented by the first day of the month. Event
//! timestamps are truncated, never interpolated.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

/// Truncate a date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the following month, `None` past the calendar range.
pub fn next_month(month: NaiveDate) -> Option<NaiveDate> {
    month_start(month).checked_add_months(Months::new(1))
}

/// Month buckets covering `[start, end)`.
///
/// The start is truncated to its month. A month is included when its first
/// day is strictly before `end`.
pub fn month_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = Some(month_start(start));
    while let Some(month) = current {
        if month >= end {
            break;
        }
        months.push(month);
        current = next_month(month);
    }
    months
}

/// Month buckets from `first` to `last`, both included.
pub fn month_range_inclusive(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    match next_month(last) {
        Some(end) => month_range(first, end),
        None => month_range(first, last),
    }
}

/// Signed number of months from `from` to `to`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

/// Parse `YYYY-MM-DD` or an ISO datetime (`YYYY-MM-DDTHH:MM:SS[.f]`, space
/// separator allowed) into its calendar date.
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts.date());
        }
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.date_naive())
}

/// Serde helper for event timestamps that may be dates or datetimes.
pub fn deserialize_event_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_event_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid event timestamp: {raw:?}")))
}

/// Serde helper for optional event timestamps; `null` and absent map to `None`.
pub fn deserialize_optional_event_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_event_date(&raw).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid event timestamp: {raw:?}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_month_start_truncates() {
        assert_eq!(month_start(d(2021, 3, 17)), d(2021, 3, 1));
        assert_eq!(month_start(d(2021, 3, 1)), d(2021, 3, 1));
    }

    #[test]
    fn test_month_range_is_half_open() {
        let months = month_range(d(2020, 11, 15), d(2021, 2, 1));
        assert_eq!(months, vec![d(2020, 11, 1), d(2020, 12, 1), d(2021, 1, 1)]);
        let months = month_range(d(2020, 11, 1), d(2021, 2, 2));
        assert_eq!(months.len(), 4);
        assert!(month_range(d(2021, 1, 1), d(2021, 1, 1)).is_empty());
    }

    #[test]
    fn test_month_range_inclusive() {
        let months = month_range_inclusive(d(2020, 12, 1), d(2021, 2, 1));
        assert_eq!(months, vec![d(2020, 12, 1), d(2021, 1, 1), d(2021, 2, 1)]);
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(d(2020, 11, 1), d(2021, 2, 1)), 3);
        assert_eq!(months_between(d(2021, 2, 1), d(2020, 11, 1)), -3);
    }

    #[test]
    fn test_parse_event_date_forms() {
        assert_eq!(parse_event_date("2021-04-09"), Some(d(2021, 4, 9)));
        assert_eq!(parse_event_date("2021-04-09T13:45:00"), Some(d(2021, 4, 9)));
        assert_eq!(parse_event_date("2021-04-09 13:45:00.250"), Some(d(2021, 4, 9)));
        assert_eq!(parse_event_date("2021-04-09T13:45:00+02:00"), Some(d(2021, 4, 9)));
        assert_eq!(parse_event_date("April 9th"), None);
    }
}
