use std::fmt::Write as _;

use serde::Serialize;
use tracing::{debug, error};

use crate::{
    aggregate::{Bucket, GroupKey},
    error::Result,
    event::Event,
    paginate::Page,
    query::{Predicate, SearchQuery},
    settings::Settings,
    store::IndexStore,
    text_util,
};

/// Longest summary shown in the human-readable listing.
const SUMMARY_PREVIEW_CHARS: usize = 100;

/// Everything a results view shows for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    /// Number of matching events across all pages.
    pub total: usize,
    pub top_groups: Vec<Bucket>,
    pub top_organizers: Vec<Bucket>,
    pub page: Page,
}

/// Validate and run a search, returning one page plus the rankings.
///
/// 1. Build the predicate (invalid dates fail here)
/// 2. Select matching events; a store failure is logged and treated as no
///    matches
/// 3. Rank organizing groups and organizers
/// 4. Sort and slice the requested page
pub fn execute_search(
    store: &impl IndexStore,
    settings: &Settings,
    query: &SearchQuery,
    page: i64,
) -> Result<SearchOutcome> {
    let predicate = query.build()?;
    debug!(?predicate, "built search predicate");
    Ok(execute_predicate(store, settings, &predicate, page))
}

/// Stages 2-4 of [`execute_search`] for an already-built predicate.
pub fn execute_predicate(
    store: &impl IndexStore,
    settings: &Settings,
    predicate: &Predicate,
    page: i64,
) -> SearchOutcome {
    let records = match store.select(predicate) {
        Ok(records) => records,
        Err(e) => {
            error!(error = %e, "search failed, showing no results");
            Vec::new()
        }
    };

    let limit = Some(settings.top_limit);
    let top_groups = store.group_by(&records, GroupKey::Group, limit);
    let top_organizers = store.group_by(&records, GroupKey::Organizer, limit);
    let total = records.len();
    let page = store.sort_and_slice(records, settings.page_size, page);

    SearchOutcome {
        total,
        top_groups,
        top_organizers,
        page,
    }
}

/// Render an outcome for terminal output.
pub fn render_human(outcome: &SearchOutcome) -> String {
    let mut out = String::new();
    if outcome.total == 0 {
        out.push_str("No results found.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{} result(s), page {}/{}",
        outcome.total, outcome.page.page, outcome.page.last_page
    );
    let _ = writeln!(out, "Top groups: {}", render_buckets(&outcome.top_groups));
    let _ = writeln!(
        out,
        "Top organizers: {}",
        render_buckets(&outcome.top_organizers)
    );

    let offset = (outcome.page.page - 1) * outcome.page.page_size;
    for (i, event) in outcome.page.records.iter().enumerate() {
        out.push('\n');
        render_event(&mut out, offset + i + 1, event);
    }
    out
}

fn render_buckets(buckets: &[Bucket]) -> String {
    if buckets.is_empty() {
        return "-".to_string();
    }
    buckets
        .iter()
        .map(|b| format!("{} ({})", b.key, b.count))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_event(out: &mut String, rank: usize, event: &Event) {
    let _ = writeln!(
        out,
        "{:>3}. [{:+}] {} {} #{}",
        rank,
        event.score,
        event.datetime.format("%Y/%m/%d %H:%M"),
        event.title,
        event.id
    );

    let who: Vec<&str> = [
        event.group.as_deref(),
        event.organizer.as_deref(),
        Some(event.venue.as_str()),
    ]
    .into_iter()
    .flatten()
    .filter(|s| !s.is_empty())
    .collect();
    if !who.is_empty() {
        let _ = writeln!(out, "     {}", who.join(" / "));
    }

    let summary = text_util::single_line(&event.summary);
    if !summary.is_empty() {
        let _ = writeln!(
            out,
            "     {}",
            text_util::truncate_chars(&summary, SUMMARY_PREVIEW_CHARS)
        );
    }
    if !event.uri.is_empty() {
        let _ = writeln!(out, "     {}", event.uri);
    }
}

/// Format results for human-readable terminal output.
pub fn format_human(outcome: &SearchOutcome) {
    print!("{}", render_human(outcome));
}

/// Format results as JSON output.
pub fn format_json(outcome: &SearchOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::{
        error::Error,
        query::Operator,
        store::EventStore,
    };

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2012, 1, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn event(id: &str, d: u32, title: &str, group: Option<&str>, organizer: &str) -> Event {
        Event {
            id: id.to_string(),
            datetime: day(d),
            title: title.to_string(),
            uri: format!("http://example.com/{id}"),
            organizer: Some(organizer.to_string()),
            group: group.map(str::to_string),
            venue: "東京".to_string(),
            summary: "概要".to_string(),
            note: String::new(),
            score: 0,
        }
    }

    fn populated() -> (tempfile::TempDir, EventStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = EventStore::open_temporary(tmp.path()).unwrap();
        store
            .insert_batch(&[
                event("1", 1, "Aグループ 会議", Some("Aグループ"), "Pat"),
                event("2", 2, "Aグループ 会議", Some("Aグループ"), "Pat"),
                event("3", 3, "Aグループ 会議", Some("Aグループ"), "Pat"),
                event("4", 4, "Bグループ 会議", Some("Bグループ"), "Emi"),
                event("5", 5, "Bグループ 会議", Some("Bグループ"), "Emi"),
                event("6", 6, "Cグループ 会議", Some("Cグループ"), "Andy"),
                event("7", 7, "雑談", None, "Andy"),
            ])
            .unwrap();
        (tmp, store)
    }

    struct BrokenStore;

    impl IndexStore for BrokenStore {
        fn insert_if_absent(&self, _: &Event) -> Result<bool> {
            Ok(false)
        }

        fn select(&self, _: &Predicate) -> Result<Vec<Event>> {
            Err(Error::Config("index offline".to_string()))
        }

        fn get(&self, _: &str) -> Result<Option<Event>> {
            Ok(None)
        }

        fn increment(&self, _: &str, _: i64) -> Result<Option<i64>> {
            Ok(None)
        }

        fn len(&self) -> Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn outcome_carries_rankings_and_page() {
        let (_tmp, store) = populated();
        let settings = Settings {
            top_limit: 2,
            page_size: 3,
            ..Settings::default()
        };
        let query = SearchQuery::new(vec!["会議".into()]);

        let outcome = execute_search(&store, &settings, &query, 1).unwrap();
        assert_eq!(outcome.total, 6);
        assert_eq!(outcome.page.last_page, 2);
        assert_eq!(outcome.page.records.len(), 3);
        assert_eq!(outcome.page.records[0].id, "6");

        let groups: Vec<_> = outcome
            .top_groups
            .iter()
            .map(|b| (b.key.as_str(), b.count))
            .collect();
        assert_eq!(groups, vec![("Aグループ", 3), ("Bグループ", 2)]);
        assert_eq!(outcome.top_organizers[0].key, "Pat");
    }

    #[test]
    fn rankings_cover_all_pages() {
        let (_tmp, store) = populated();
        let settings = Settings {
            page_size: 1,
            ..Settings::default()
        };
        let outcome =
            execute_search(&store, &settings, &SearchQuery::default(), 7).unwrap();
        assert_eq!(outcome.page.records[0].id, "1");
        assert_eq!(outcome.top_groups.len(), 3);
        assert_eq!(outcome.top_organizers.len(), 3);
    }

    #[test]
    fn and_operator_narrows() {
        let (_tmp, store) = populated();
        let query = SearchQuery::new(vec!["会議".into(), "Bグループ".into()])
            .with_operator(Operator::And);
        let outcome =
            execute_search(&store, &Settings::default(), &query, 1).unwrap();
        assert_eq!(outcome.total, 2);
    }

    #[test]
    fn invalid_date_is_rejected_before_searching() {
        let query = SearchQuery::new(vec![]).with_range(Some("yesterday"), None);
        let err = execute_search(&BrokenStore, &Settings::default(), &query, 1)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[test]
    fn store_failure_yields_empty_outcome() {
        let outcome = execute_search(
            &BrokenStore,
            &Settings::default(),
            &SearchQuery::new(vec!["会議".into()]),
            3,
        )
        .unwrap();
        assert_eq!(outcome.total, 0);
        assert_eq!(outcome.page.page, 1);
        assert_eq!(outcome.page.last_page, 1);
        assert!(outcome.top_groups.is_empty());
        assert!(outcome.page.records.is_empty());
    }

    #[test]
    fn human_output_lists_page() {
        let (_tmp, store) = populated();
        let settings = Settings {
            page_size: 2,
            ..Settings::default()
        };
        let outcome =
            execute_search(&store, &settings, &SearchQuery::default(), 2).unwrap();
        let text = render_human(&outcome);

        assert!(text.starts_with("7 result(s), page 2/4\n"));
        assert!(text.contains("Top groups: Aグループ (3), Bグループ (2), Cグループ (1)"));
        assert!(text.contains("  3. [+0] 2012/01/05 10:00 Bグループ 会議 #5"));
        assert!(text.contains("     Bグループ / Emi / 東京"));
    }

    #[test]
    fn human_output_truncates_long_summaries() {
        let mut long = event("1", 1, "長文", None, "Pat");
        long.summary = "あ".repeat(150);
        let outcome = SearchOutcome {
            total: 1,
            top_groups: vec![],
            top_organizers: vec![],
            page: crate::paginate::paginate(vec![long], 20, 1),
        };

        let text = render_human(&outcome);
        let expected = format!("     {}...\n", "あ".repeat(100));
        assert!(text.contains(&expected));
        assert!(text.contains("Top groups: -"));
    }

    #[test]
    fn human_output_for_no_results() {
        let outcome = execute_predicate(
            &BrokenStore,
            &Settings::default(),
            &Predicate::All,
            1,
        );
        assert_eq!(render_human(&outcome), "No results found.\n");
    }

    #[test]
    fn outcome_serializes_to_json() {
        let (_tmp, store) = populated();
        let outcome = execute_search(
            &store,
            &Settings::default(),
            &SearchQuery::new(vec!["雑談".into()]),
            1,
        )
        .unwrap();

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["page"]["records"][0]["id"], "7");
        assert_eq!(value["top_organizers"][0]["key"], "Andy");
    }
}
