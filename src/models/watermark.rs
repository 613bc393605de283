//! Sync watermark
//!
//! The watermark is the `updatedAt` of the newest record already delivered
//! to the destination. It only ever moves forward.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::SourceRecord;

/// Last successful sync timestamp, stored verbatim as received from the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(String);

impl Watermark {
    /// Wrap a raw timestamp string
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw timestamp as stored
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parsed instant, if the raw value is a recognizable timestamp
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.0)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse an ISO-8601 timestamp
///
/// Accepts RFC 3339, naive date-times (taken as UTC) and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Compute the watermark to persist after a run
///
/// Returns the newest `updatedAt` among `records` that is strictly after
/// `previous`, or `previous` unchanged when no record qualifies. Records
/// without a parseable `updatedAt` never move the watermark. A previous
/// watermark that cannot be parsed does not bound the result.
pub fn advance(previous: Option<&Watermark>, records: &[SourceRecord]) -> Option<Watermark> {
    let floor = previous.and_then(Watermark::instant);
    let mut newest: Option<(DateTime<Utc>, &str)> = None;

    for record in records {
        let Some(raw) = record.updated_at.as_deref() else {
            continue;
        };
        let Some(at) = parse_timestamp(raw) else {
            continue;
        };
        if floor.is_some_and(|floor| at <= floor) {
            continue;
        }
        if newest.map_or(true, |(best, _)| at > best) {
            newest = Some((at, raw));
        }
    }

    match newest {
        Some((_, raw)) => Some(Watermark::new(raw)),
        None => previous.cloned(),
    }
}
