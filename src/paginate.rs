use std::cmp::Ordering;

use serde::Serialize;

use crate::event::Event;

/// One page of ranked results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub records: Vec<Event>,
    /// The page actually returned, after clamping (1-based).
    pub page: usize,
    /// Always at least 1, even when there are no records.
    pub last_page: usize,
    pub total: usize,
    pub page_size: usize,
}

/// Ranking order: higher score first, then newer, then id for a total order.
pub fn rank_order(a: &Event, b: &Event) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.datetime.cmp(&a.datetime))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn last_page(total: usize, page_size: usize) -> usize {
    if total == 0 {
        1
    } else {
        (total - 1) / page_size.max(1) + 1
    }
}

/// Sort `records` by rank and slice out the requested page.
///
/// Pages below 1 clamp to 1 and pages past the end clamp to the last page.
pub fn paginate(mut records: Vec<Event>, page_size: usize, requested: i64) -> Page {
    let page_size = page_size.max(1);
    let total = records.len();
    let last_page = last_page(total, page_size);
    let page = usize::try_from(requested).unwrap_or(0).clamp(1, last_page);

    records.sort_by(rank_order);
    let start = (page - 1) * page_size;
    let records = records.into_iter().skip(start).take(page_size).collect();

    Page {
        records,
        page,
        last_page,
        total,
        page_size,
    }
}
