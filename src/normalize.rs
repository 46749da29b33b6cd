use std::collections::HashMap;

use crate::event::{Event, parse_timestamp};

/// The literal the exporter writes when no group was entered.
const NULL_SENTINEL: &str = "Null";

/// Header names for each event attribute.
///
/// Every name listed here must appear in the CSV header; columns the map does
/// not mention are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub id: String,
    pub datetime: String,
    pub title: String,
    pub uri: String,
    pub organizer: String,
    pub group: String,
    pub venue: String,
    pub summary: String,
    pub note: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            id: "イベントID".to_string(),
            datetime: "開催日時".to_string(),
            title: "イベント名".to_string(),
            uri: "告知サイトURL".to_string(),
            organizer: "開催者".to_string(),
            group: "開催グループ".to_string(),
            venue: "開催地区".to_string(),
            summary: "概要".to_string(),
            note: "備考".to_string(),
        }
    }
}

impl ColumnMap {
    /// `(setting suffix, header name)` pairs, in attribute order.
    pub fn entries(&self) -> [(&'static str, &str); 9] {
        [
            ("id", &self.id),
            ("datetime", &self.datetime),
            ("title", &self.title),
            ("uri", &self.uri),
            ("organizer", &self.organizer),
            ("group", &self.group),
            ("venue", &self.venue),
            ("summary", &self.summary),
            ("note", &self.note),
        ]
    }

    /// Mutable access to a column by its setting suffix.
    pub fn slot_mut(&mut self, field: &str) -> Option<&mut String> {
        match field {
            "id" => Some(&mut self.id),
            "datetime" => Some(&mut self.datetime),
            "title" => Some(&mut self.title),
            "uri" => Some(&mut self.uri),
            "organizer" => Some(&mut self.organizer),
            "group" => Some(&mut self.group),
            "venue" => Some(&mut self.venue),
            "summary" => Some(&mut self.summary),
            "note" => Some(&mut self.note),
            _ => None,
        }
    }
}

/// Why a single CSV row could not become an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("empty event id")]
    MissingId,

    #[error("unparseable timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Column positions resolved from a header row.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    /// Build the lookup from header cells. The first occurrence of a
    /// repeated name wins.
    pub fn new<'a>(header: impl IntoIterator<Item = &'a str>) -> Self {
        let mut positions = HashMap::new();
        for (i, name) in header.into_iter().enumerate() {
            positions.entry(name.trim().to_string()).or_insert(i);
        }
        Self { positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Configured columns absent from the header.
    pub fn missing<'a>(&self, columns: &'a ColumnMap) -> Vec<&'a str> {
        columns
            .entries()
            .into_iter()
            .map(|(_, name)| name)
            .filter(|name| self.position(name).is_none())
            .collect()
    }
}

/// Turns raw rows into events for one header layout.
#[derive(Debug, Clone)]
pub struct Normalizer<'a> {
    header: HeaderIndex,
    columns: &'a ColumnMap,
    group_marker: &'a str,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        header: HeaderIndex,
        columns: &'a ColumnMap,
        group_marker: &'a str,
    ) -> Self {
        Self {
            header,
            columns,
            group_marker,
        }
    }

    /// Normalize one data row given as its cells in file order.
    pub fn normalize(&self, row: &[&str]) -> Result<Event, RowError> {
        let cell = |name: &str| self.cell(row, name);

        let c = self.columns;
        let id = cell(&c.id)?.trim();
        if id.is_empty() {
            return Err(RowError::MissingId);
        }

        let raw_datetime = cell(&c.datetime)?;
        let datetime = parse_timestamp(raw_datetime)
            .ok_or_else(|| RowError::InvalidTimestamp(raw_datetime.to_string()))?;

        let title = cell(&c.title)?.to_string();
        let uri = cell(&c.uri)?.to_string();
        let organizer = non_empty(cell(&c.organizer)?);
        let group = resolve_group(cell(&c.group)?, &title, self.group_marker);

        Ok(Event {
            id: id.to_string(),
            datetime,
            title,
            uri,
            organizer,
            group,
            venue: cell(&c.venue)?.to_string(),
            summary: cell(&c.summary)?.to_string(),
            note: cell(&c.note)?.to_string(),
            score: 0,
        })
    }
}

impl Normalizer<'_> {
    fn cell<'r>(&self, row: &[&'r str], name: &str) -> Result<&'r str, RowError> {
        self.header
            .position(name)
            .and_then(|i| row.get(i).copied())
            .ok_or_else(|| RowError::MissingColumn(name.to_string()))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A group value is usable unless it is missing or the exporter's `Null`.
pub fn is_valid_group(group: Option<&str>) -> bool {
    match group {
        None => false,
        Some(g) => !g.is_empty() && g != NULL_SENTINEL,
    }
}

/// The shortest start of a line in `title` that ends with `marker`, taken
/// from the first line containing it.
///
/// `"Aグループ 定例会 Bグループ"` with marker `グループ` yields `"Aグループ"`.
pub fn infer_group(title: &str, marker: &str) -> Option<String> {
    if marker.is_empty() {
        return None;
    }
    title.split('\n').find_map(|line| {
        line.find(marker)
            .map(|start| line[..start + marker.len()].to_string())
    })
}

/// A valid group cell is kept verbatim, including surrounding whitespace.
fn resolve_group(cell: &str, title: &str, marker: &str) -> Option<String> {
    if is_valid_group(Some(cell)) {
        Some(cell.to_string())
    } else {
        infer_group(title, marker)
    }
}
