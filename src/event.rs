use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single logged event, keyed by the identifier assigned by the exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub datetime: NaiveDateTime,
    pub title: String,
    pub uri: String,
    pub organizer: Option<String>,
    pub group: Option<String>,
    pub venue: String,
    pub summary: String,
    pub note: String,
    #[serde(default)]
    pub score: i64,
}

impl Event {
    /// Serialize for storage in the events table.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Seconds since the Unix epoch, treating the naive time as UTC.
    pub fn timestamp(&self) -> i64 {
        self.datetime.and_utc().timestamp()
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d", "%Y%m%d"];

/// Parse the timestamp formats produced by the exporter and typed by users.
///
/// Date-only input resolves to midnight.
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
