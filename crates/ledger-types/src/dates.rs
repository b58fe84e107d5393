//! Day-granularity dates.
//!
//! Ledger dates are stored as the number of days since 1970-01-01 (UTC).

use chrono::{NaiveDate, Utc};

use crate::error::{LedgerError, LedgerResult};

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Days since the Unix epoch for a calendar date.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

/// Calendar date for a day count, if it is representable.
pub fn date_from_days(days: i32) -> Option<NaiveDate> {
    epoch().checked_add_signed(chrono::Duration::days(days as i64))
}

/// Today's day count in UTC.
pub fn today() -> i32 {
    days_since_epoch(Utc::now().date_naive())
}

/// Parse either a `YYYY-MM-DD` date or a raw day count.
pub fn parse_day(input: &str) -> LedgerResult<i32> {
    let input = input.trim();
    if let Ok(days) = input.parse::<i32>() {
        return Ok(days);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(days_since_epoch)
        .map_err(|e| LedgerError::invalid_field("date", format!("{:?}: {}", input, e)))
}
