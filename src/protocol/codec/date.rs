//! SQream DATE and DATETIME codecs.
//!
//! DATE is a 4-byte day number counted from a March-based civil calendar:
//! ```text
//! m' = (month + 9) % 12
//! y' = year - m' / 10
//! days = 365*y' + y'/4 - y'/100 + y'/400 + (m'*306 + 5)/10 + (day - 1)
//! ```
//! DATETIME is 8 bytes: the DATE day number in the high 32 bits and
//! milliseconds since midnight in the low 32 bits. Sub-millisecond precision
//! is truncated on encode.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::protocol::constants::MILLIS_PER_DAY;

/// Encode a calendar date as a SQream day number.
///
/// The caller supplies a valid date; validation lives in `chrono`.
pub fn date_to_int(year: i32, month: u32, day: u32) -> i32 {
    let year = year as i64;
    let month = month as i64;
    let day = day as i64;

    let m = (month + 9) % 12;
    let y = year - m / 10;
    let days = 365 * y + y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400)
        + (m * 306 + 5) / 10
        + (day - 1);
    days as i32
}

/// Days from the SQream epoch to 1 March of `year`.
fn days_before_year(year: i64) -> i64 {
    365 * year + year.div_euclid(4) - year.div_euclid(100) + year.div_euclid(400)
}

/// Decode a SQream day number into `(year, month, day)`.
///
/// Fails for day numbers that land on year 0 or earlier.
pub fn int_to_date(value: i32) -> Result<(i32, u32, u32), String> {
    let value = value as i64;
    let mut year = (10_000 * value + 14_780).div_euclid(3_652_425);
    let mut ddd = value - days_before_year(year);
    if ddd < 0 {
        year -= 1;
        ddd = value - days_before_year(year);
    }
    let mi = (100 * ddd + 52).div_euclid(3_060);
    let year = year + (mi + 2).div_euclid(12);
    let month = (mi + 2).rem_euclid(12) + 1;
    let day = ddd - (mi * 306 + 5).div_euclid(10) + 1;

    if year < 1 || year > i32::MAX as i64 {
        return Err(format!("day number {} decodes to invalid year {}", value, year));
    }
    Ok((year as i32, month as u32, day as u32))
}

/// Encode a `NaiveDate`.
pub fn encode_date(date: NaiveDate) -> i32 {
    date_to_int(date.year(), date.month(), date.day())
}

/// Decode a SQream day number into a `NaiveDate`.
pub fn decode_date(value: i32) -> Result<NaiveDate, String> {
    let (year, month, day) = int_to_date(value)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        format!(
            "day number {} decodes to invalid date {}-{}-{}",
            value, year, month, day
        )
    })
}

/// Encode date and time components into a SQream DATETIME.
///
/// `micros` below one millisecond are truncated.
pub fn datetime_to_long(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    micros: u32,
) -> i64 {
    let date_part = date_to_int(year, month, day) as i64;
    let time_part = hour as i64 * 3_600_000
        + minute as i64 * 60_000
        + second as i64 * 1_000
        + micros as i64 / 1_000;
    (date_part << 32) | time_part
}

/// Encode a `NaiveDateTime`.
pub fn encode_datetime(dt: NaiveDateTime) -> i64 {
    // Leap seconds carry nanoseconds >= 1e9; keep the slot under a full second.
    let micros = (dt.nanosecond() / 1_000).min(999_999);
    datetime_to_long(
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        micros,
    )
}

/// Decode a SQream DATETIME into a `NaiveDateTime` with millisecond precision.
pub fn long_to_datetime(value: i64) -> Result<NaiveDateTime, String> {
    let date_part = (value >> 32) as i32;
    let time_part = value & 0xFFFF_FFFF;
    if time_part >= MILLIS_PER_DAY {
        return Err(format!(
            "datetime {} has time part {} ms beyond one day",
            value, time_part
        ));
    }

    let date = decode_date(date_part)?;
    let millis = (time_part % 1_000) as u32;
    let seconds = (time_part / 1_000) as u32;
    let time = NaiveTime::from_hms_milli_opt(
        seconds / 3_600,
        (seconds / 60) % 60,
        seconds % 60,
        millis,
    )
    .ok_or_else(|| format!("datetime {} has invalid time part {}", value, time_part))?;
    Ok(NaiveDateTime::new(date, time))
}
