use std::path::PathBuf;

use encoding_rs::Encoding;
use tracing::warn;

use crate::{
    config_db::ConfigDb,
    error::{Error, Result},
    normalize::ColumnMap,
};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_TOP_LIMIT: usize = 5;
pub const DEFAULT_GROUP_MARKER: &str = "グループ";
pub const DEFAULT_CSV_ENCODING: &str = "windows-31j";

const COLUMN_PREFIX: &str = "column.";

/// Typed view of the `settings` table with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub page_size: usize,
    /// How many entries the group and organizer rankings keep.
    pub top_limit: usize,
    /// Token that ends a group name inside an event title.
    pub group_marker: String,
    pub csv_encoding: &'static Encoding,
    pub inbox_dir: Option<PathBuf>,
    pub columns: ColumnMap,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            top_limit: DEFAULT_TOP_LIMIT,
            group_marker: DEFAULT_GROUP_MARKER.to_string(),
            csv_encoding: encoding_rs::SHIFT_JIS,
            inbox_dir: None,
            columns: ColumnMap::default(),
        }
    }
}

impl Settings {
    pub fn load(config: &ConfigDb) -> Result<Self> {
        Self::from_entries(config.list_settings()?)
    }

    /// Build settings from `(key, value)` pairs. Unknown keys are ignored
    /// with a warning.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let mut settings = Self::default();
        for (key, value) in entries {
            if !settings.apply(&key, &value)? {
                warn!(key = %key, "ignoring unknown setting");
            }
        }
        Ok(settings)
    }

    /// Check that `key` is known and `value` parses for it.
    pub fn validate(key: &str, value: &str) -> Result<()> {
        if Self::default().apply(key, value)? {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "unknown setting '{key}' (known: {})",
                Self::known_keys().join(", ")
            )))
        }
    }

    /// Every key `config set` accepts.
    pub fn known_keys() -> Vec<String> {
        let mut keys: Vec<String> =
            ["page_size", "top_limit", "group_marker", "csv_encoding", "inbox_dir"]
                .iter()
                .map(|k| k.to_string())
                .collect();
        keys.extend(
            ColumnMap::default()
                .entries()
                .iter()
                .map(|(field, _)| format!("{COLUMN_PREFIX}{field}")),
        );
        keys
    }

    /// Effective `(key, value)` pairs for every known key.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            ("page_size".to_string(), self.page_size.to_string()),
            ("top_limit".to_string(), self.top_limit.to_string()),
            ("group_marker".to_string(), self.group_marker.clone()),
            ("csv_encoding".to_string(), self.csv_encoding.name().to_string()),
            (
                "inbox_dir".to_string(),
                self.inbox_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
        ];
        entries.extend(
            self.columns
                .entries()
                .iter()
                .map(|(field, name)| (format!("{COLUMN_PREFIX}{field}"), name.to_string())),
        );
        entries
    }

    /// Returns `false` when the key is not a setting.
    fn apply(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "page_size" => self.page_size = parse_positive(key, value)?,
            "top_limit" => self.top_limit = parse_positive(key, value)?,
            "group_marker" => self.group_marker = value.to_string(),
            "csv_encoding" => {
                self.csv_encoding = Encoding::for_label(value.trim().as_bytes())
                    .ok_or_else(|| {
                        Error::Config(format!("unknown encoding label '{value}'"))
                    })?;
            }
            "inbox_dir" => {
                let trimmed = value.trim();
                self.inbox_dir =
                    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed));
            }
            _ => {
                let Some(slot) = key
                    .strip_prefix(COLUMN_PREFIX)
                    .and_then(|field| self.columns.slot_mut(field))
                else {
                    return Ok(false);
                };
                let name = value.trim();
                if name.is_empty() {
                    return Err(Error::Config(format!("{key} must not be empty")));
                }
                *slot = name.to_string();
            }
        }
        Ok(true)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(Error::Config(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}
