use clap::ValueEnum;
use tracing::debug;

use crate::{
    error::{Error, Result},
    store::IndexStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn delta(self) -> i64 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

/// Apply one vote and return the event's new score.
pub fn vote(
    store: &impl IndexStore,
    id: &str,
    direction: Direction,
) -> Result<i64> {
    let score = store
        .increment(id, direction.delta())?
        .ok_or_else(|| Error::NotFound {
            kind: "event",
            name: id.to_string(),
        })?;
    debug!(id, ?direction, score, "recorded vote");
    Ok(score)
}
