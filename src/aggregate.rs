use std::collections::HashMap;

use serde::Serialize;

use crate::event::Event;

/// Attribute a result set can be bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Group,
    Organizer,
}

impl GroupKey {
    fn value<'e>(&self, event: &'e Event) -> Option<&'e str> {
        match self {
            GroupKey::Group => event.group.as_deref(),
            GroupKey::Organizer => event.organizer.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub key: String,
    pub count: usize,
}

/// Count events per attribute value, largest bucket first.
///
/// Events without a value are not counted. Equal counts are ordered by key
/// so the output is reproducible. `limit` keeps only the first entries.
pub fn aggregate(
    records: &[Event],
    key: GroupKey,
    limit: Option<usize>,
) -> Vec<Bucket> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in records.iter().filter_map(|e| key.value(e)) {
        if !value.is_empty() {
            *counts.entry(value).or_default() += 1;
        }
    }

    let mut buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(key, count)| Bucket {
            key: key.to_string(),
            count,
        })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));

    if let Some(limit) = limit {
        buckets.truncate(limit);
    }
    buckets
}
