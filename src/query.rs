//! Keyword and date-range predicates.
//!
//! A [`Predicate`] is a plain expression tree. [`Predicate::matches`]
//! evaluates it against a single event; the search index translates the same
//! tree into its own query types, and both agree on what a match is.

use chrono::{Duration, NaiveDateTime};

use crate::{
    error::{Error, Result},
    event::{Event, parse_timestamp},
};

/// Free-text fields a keyword is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Title,
    Venue,
    Summary,
    Note,
}

impl TextField {
    pub const ALL: [TextField; 4] = [
        TextField::Title,
        TextField::Venue,
        TextField::Summary,
        TextField::Note,
    ];

    pub fn value<'e>(&self, event: &'e Event) -> &'e str {
        match self {
            TextField::Title => &event.title,
            TextField::Venue => &event.venue,
            TextField::Summary => &event.summary,
            TextField::Note => &event.note,
        }
    }
}

/// How keyword matches combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Operator {
    And,
    #[default]
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every event.
    All,
    /// Case-insensitive substring match on one field.
    Contains { field: TextField, word: String },
    /// `start <= datetime < end`, either side optional.
    Range {
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    },
    /// Every child matches. Empty is the same as [`Predicate::All`].
    And(Vec<Predicate>),
    /// At least one child matches. Empty matches nothing.
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Contains { field, word } => {
                fold_for_match(field.value(event)).contains(&fold_for_match(word))
            }
            Predicate::Range { start, end } => {
                start.is_none_or(|s| event.datetime >= s)
                    && end.is_none_or(|e| event.datetime < e)
            }
            Predicate::And(children) => children.iter().all(|p| p.matches(event)),
            Predicate::Or(children) => children.iter().any(|p| p.matches(event)),
        }
    }

    /// Events matching `word` in any searchable field.
    pub fn keyword(word: &str) -> Self {
        Predicate::Or(
            TextField::ALL
                .iter()
                .map(|&field| Predicate::Contains {
                    field,
                    word: word.to_string(),
                })
                .collect(),
        )
    }
}

/// Normalization shared by every evaluator: lowercase, with line breaks folded
/// into spaces so a match never depends on where a field wraps.
pub fn fold_for_match(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// A search request as received from the caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub keywords: Vec<String>,
    pub operator: Operator,
    /// Inclusive lower bound.
    pub start: Option<String>,
    /// Inclusive through the whole of the given day.
    pub end: Option<String>,
}

impl SearchQuery {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords,
            ..Self::default()
        }
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_range(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.start = start.map(str::to_string);
        self.end = end.map(str::to_string);
        self
    }

    /// Validate the bounds and build the predicate.
    pub fn build(&self) -> Result<Predicate> {
        let start = parse_bound("start", self.start.as_deref())?;
        let end = parse_bound("end", self.end.as_deref())?
            .map(|end| end + Duration::days(1));

        let words: Vec<&str> = self
            .keywords
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .collect();

        let text = if words.is_empty() {
            Predicate::All
        } else {
            let per_word = words.into_iter().map(Predicate::keyword).collect();
            match self.operator {
                Operator::Or => Predicate::Or(per_word),
                Operator::And => Predicate::And(per_word),
            }
        };

        if start.is_none() && end.is_none() {
            return Ok(text);
        }

        let range = Predicate::Range { start, end };
        Ok(match text {
            Predicate::All => range,
            text => Predicate::And(vec![text, range]),
        })
    }
}

/// Blank input means "no bound"; anything else must parse.
fn parse_bound(name: &str, raw: Option<&str>) -> Result<Option<NaiveDateTime>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(input) => parse_timestamp(input).map(Some).ok_or_else(|| {
            Error::InvalidQuery(format!("{name} date '{input}' is not a valid date"))
        }),
    }
}
