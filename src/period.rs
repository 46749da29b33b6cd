//! Monthly statistics over named topics.
//!
//! A topic is a small synonym list (`メール`, `Outlook`, `mail`) identified by
//! its first word. For a calendar month, each topic counts the events that
//! match any of its words.

use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::error;

use crate::{
    config_db::ConfigDb,
    error::{Error, Result},
    query::Predicate,
    search::{SearchOutcome, execute_predicate},
    settings::Settings,
    store::IndexStore,
};

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 3000;

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::InvalidQuery(format!(
                "year {year} is outside {MIN_YEAR}..={MAX_YEAR}"
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidQuery(format!(
                "month {month} is outside 1..=12"
            )));
        }
        Ok(Self { year, month })
    }

    /// Parse `YYYY-MM` (or `YYYY/MM`).
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || {
            Error::InvalidQuery(format!("'{input}' is not a YYYY-MM month"))
        };
        let (year, month) = input
            .trim()
            .split_once(['-', '/'])
            .ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }

    /// The month containing today's local date.
    pub fn current() -> Self {
        let today = chrono::Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// `[first day 00:00, first day of next month 00:00)`.
    pub fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        (
            first_of(self.year, self.month),
            first_of(next_year, next_month),
        )
    }

    pub fn range(&self) -> Predicate {
        let (start, end) = self.bounds();
        Predicate::Range {
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Years and months are range-checked by the constructors, so the date
/// always exists.
fn first_of(year: i32, month: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(chrono::NaiveTime::MIN)
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub name: String,
    pub words: Vec<String>,
}

impl Topic {
    /// A topic named after its first word. `None` when `words` is empty.
    pub fn from_words(words: Vec<String>) -> Option<Self> {
        let name = words.first()?.clone();
        Some(Self { name, words })
    }

    /// Events matching any word of the topic.
    pub fn predicate(&self) -> Predicate {
        Predicate::Or(self.words.iter().map(|w| Predicate::keyword(w)).collect())
    }
}

pub fn load_topics(config: &ConfigDb) -> Result<Vec<Topic>> {
    Ok(config
        .list_topics()?
        .into_iter()
        .map(|(name, words)| Topic { name, words })
        .collect())
}

pub fn find_topic(config: &ConfigDb, name: &str) -> Result<Topic> {
    config
        .get_topic(name)?
        .map(|words| Topic {
            name: name.to_string(),
            words,
        })
        .ok_or_else(|| Error::NotFound {
            kind: "topic",
            name: name.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub name: String,
    pub count: usize,
}

/// Per-topic event counts for one month, in topic order.
pub fn count_topics(
    store: &impl IndexStore,
    month: YearMonth,
    topics: &[Topic],
) -> Vec<TopicCount> {
    topics
        .iter()
        .map(|topic| {
            let predicate = Predicate::And(vec![topic.predicate(), month.range()]);
            let count = match store.select(&predicate) {
                Ok(records) => records.len(),
                Err(e) => {
                    error!(topic = %topic.name, %month, error = %e, "topic count failed");
                    0
                }
            };
            TopicCount {
                name: topic.name.clone(),
                count,
            }
        })
        .collect()
}

/// The search view for one topic within one month.
pub fn execute_topic_stats(
    store: &impl IndexStore,
    settings: &Settings,
    month: YearMonth,
    topic: &Topic,
    page: i64,
) -> SearchOutcome {
    let predicate = Predicate::And(vec![topic.predicate(), month.range()]);
    execute_predicate(store, settings, &predicate, page)
}
