// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.
//!
//! Ledger entries carry a `YYYY-MM-DD` day string alongside their timestamp.
//! Both are derived here so the two can never disagree.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Format a UTC timestamp as RFC3339 with millisecond precision and a `Z` suffix.
///
/// The fixed width keeps lexicographic order equal to chronological order.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Calendar date of `instant` under the configured local offset.
pub fn local_day(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Format a date as a `YYYY-MM-DD` day string.
pub fn day_string(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Parse a strict `YYYY-MM-DD` day string.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, DAY_FORMAT).ok()
}
