//! Julian-day timestamp codec.
//!
//! CD 1.1 carries time as a 20-byte text field of the form
//! `YYYYDDD HH:MM:SS.mmm` (day-of-year, UTC). Internally the crate works
//! in milliseconds since the Unix epoch.

use crate::error::{Cd11Error, Result};

/// Wire width of a timestamp field.
pub const TIMESTAMP_LEN: usize = 20;

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_year(year: i64) -> i64 {
    if is_leap(year) { 366 } else { 365 }
}

/// Format epoch milliseconds as a `YYYYDDD HH:MM:SS.mmm` string.
///
/// Times before the epoch are clamped to it; the protocol never carries
/// pre-1970 timestamps.
pub fn format_julian(epoch_ms: i64) -> String {
    let epoch_ms = epoch_ms.max(0);
    let millis = epoch_ms % 1000;
    let secs = epoch_ms / 1000;

    let days = secs / 86_400;
    let time_of_day = secs % 86_400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let mut year = 1970i64;
    let mut remaining = days;
    while remaining >= days_in_year(year) {
        remaining -= days_in_year(year);
        year += 1;
    }
    let doy = remaining + 1;

    format!("{year:04}{doy:03} {hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Parse a `YYYYDDD HH:MM:SS.mmm` string into epoch milliseconds.
pub fn parse_julian(text: &str) -> Result<i64> {
    let bad = || Cd11Error::InvalidTimestamp(text.to_owned());

    if text.len() != TIMESTAMP_LEN
        || !text.is_ascii()
        || text.as_bytes()[7] != b' '
        || text.as_bytes()[10] != b':'
        || text.as_bytes()[13] != b':'
        || text.as_bytes()[16] != b'.'
    {
        return Err(bad());
    }

    let year: i64 = text[0..4].parse().map_err(|_| bad())?;
    let doy: i64 = text[4..7].parse().map_err(|_| bad())?;
    let hours: i64 = text[8..10].parse().map_err(|_| bad())?;
    let minutes: i64 = text[11..13].parse().map_err(|_| bad())?;
    let seconds: i64 = text[14..16].parse().map_err(|_| bad())?;
    let millis: i64 = text[17..20].parse().map_err(|_| bad())?;

    if year < 1970
        || doy < 1
        || doy > days_in_year(year)
        || hours > 23
        || minutes > 59
        || seconds > 60
        || millis > 999
    {
        return Err(bad());
    }

    let mut days = doy - 1;
    for y in 1970..year {
        days += days_in_year(y);
    }

    Ok((((days * 24 + hours) * 60 + minutes) * 60 + seconds) * 1000 + millis)
}
