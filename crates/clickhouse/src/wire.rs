//! Wire conversions between chrono types and ClickHouse column encodings.
//!
//! DateTime64(3) travels as Int64 milliseconds and Date as UInt16 days
//! since the Unix epoch, so row structs carry raw integers and convert
//! at the edges.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

/// DateTime64(3) wire value for a timestamp.
pub fn datetime_to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Timestamp from a DateTime64(3) wire value.
///
/// Out-of-range values clamp to the epoch sentinel rather than panic.
pub fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
}

/// Date wire value (days since epoch) for a calendar date.
///
/// Dates before 1970 clamp to day zero; ClickHouse Date cannot
/// represent them anyway.
pub fn date_to_days(date: NaiveDate) -> u16 {
    let days = date.signed_duration_since(epoch_date()).num_days();
    days.clamp(0, u16::MAX as i64) as u16
}

/// Calendar date from a Date wire value.
pub fn days_to_date(days: u16) -> NaiveDate {
    epoch_date()
        .checked_add_days(Days::new(days as u64))
        .unwrap_or_else(epoch_date)
}
