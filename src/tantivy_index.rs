use std::{ops::Bound, path::Path};

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    Term,
    collector::DocSetCollector,
    doc,
    query::{
        AllQuery,
        BooleanQuery,
        EmptyQuery,
        Occur,
        Query,
        RangeQuery,
        RegexQuery,
    },
    schema::*,
};

use crate::{
    error::Result,
    event::Event,
    query::{Predicate, TextField, fold_for_match},
};

/// Field names used in the schema.
pub mod fields {
    pub const ID: &str = "id";
    pub const DATETIME: &str = "datetime";
    pub const TITLE: &str = "title";
    pub const VENUE: &str = "venue";
    pub const SUMMARY: &str = "summary";
    pub const NOTE: &str = "note";
}

/// Longest folded text kept per match field, below Tantivy's term length
/// limit.
const MAX_MATCH_BYTES: usize = 32 * 1024;

/// Tantivy index answering keyword and date-range predicates over events.
///
/// Each searchable field is indexed as a single lowercase term holding the
/// whole value, so a keyword matches by substring through a regex over the
/// term dictionary rather than by token.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
struct SchemaFields {
    id: Field,
    datetime: Field,
    title: Field,
    venue: Field,
    summary: Field,
    note: Field,
}

impl SchemaFields {
    fn resolve(schema: &Schema) -> Result<Self> {
        Ok(Self {
            id: schema.get_field(fields::ID)?,
            datetime: schema.get_field(fields::DATETIME)?,
            title: schema.get_field(fields::TITLE)?,
            venue: schema.get_field(fields::VENUE)?,
            summary: schema.get_field(fields::SUMMARY)?,
            note: schema.get_field(fields::NOTE)?,
        })
    }

    fn text(&self, field: TextField) -> Field {
        match field {
            TextField::Title => self.title,
            TextField::Venue => self.venue,
            TextField::Summary => self.summary,
            TextField::Note => self.note,
        }
    }
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(fields::ID, STRING | STORED);
    builder.add_i64_field(fields::DATETIME, INDEXED | STORED | FAST);

    let match_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer("raw")
            .set_index_option(IndexRecordOption::Basic),
    );
    for name in [fields::TITLE, fields::VENUE, fields::SUMMARY, fields::NOTE] {
        builder.add_text_field(name, match_opts.clone());
    }

    builder.build()
}

impl SearchIndex {
    /// Open or create a search index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(
                mmap_dir,
                build_schema(),
                tantivy::IndexSettings::default(),
            )?
        };

        Self::from_index(index)
    }

    /// Create an in-memory search index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        let fields = SchemaFields::resolve(&index.schema())?;
        let reader = index.reader()?;
        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Create a writer with the given memory budget (in bytes).
    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        Ok(self.index.writer(memory_budget)?)
    }

    /// Index an event via the given writer, replacing any document with the
    /// same id.
    pub fn add_event(&self, writer: &IndexWriter, event: &Event) -> Result<()> {
        let f = self.fields;

        writer.delete_term(Term::from_field_text(f.id, &event.id));
        writer.add_document(doc!(
            f.id => event.id.as_str(),
            f.datetime => event.timestamp(),
            f.title => match_text(&event.title),
            f.venue => match_text(&event.venue),
            f.summary => match_text(&event.summary),
            f.note => match_text(&event.note),
        ))?;

        Ok(())
    }

    /// Ids of every event matching the predicate, in no particular order.
    pub fn select_ids(&self, predicate: &Predicate) -> Result<Vec<String>> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let query = self.to_query(predicate)?;

        let addresses = searcher.search(&*query, &DocSetCollector)?;
        let mut ids = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(id) = doc.get_first(self.fields.id).and_then(|v| v.as_str())
            {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    /// Number of live documents as of the last commit.
    pub fn num_docs(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }

    /// Translate a predicate tree into a Tantivy query.
    pub fn to_query(&self, predicate: &Predicate) -> Result<Box<dyn Query>> {
        let f = self.fields;
        Ok(match predicate {
            Predicate::All => Box::new(AllQuery),
            Predicate::Contains { field, word } => {
                let pattern = format!(".*{}.*", regex::escape(&fold_for_match(word)));
                Box::new(RegexQuery::from_pattern(&pattern, f.text(*field))?)
            }
            Predicate::Range { start, end } => {
                let bound = |value: Option<i64>, inclusive: bool| match value {
                    None => Bound::Unbounded,
                    Some(v) if inclusive => {
                        Bound::Included(Term::from_field_i64(f.datetime, v))
                    }
                    Some(v) => Bound::Excluded(Term::from_field_i64(f.datetime, v)),
                };
                let lower = bound(start.map(|s| s.and_utc().timestamp()), true);
                let upper = bound(end.map(|e| e.and_utc().timestamp()), false);
                Box::new(RangeQuery::new(lower, upper))
            }
            Predicate::And(children) if children.is_empty() => Box::new(AllQuery),
            Predicate::Or(children) if children.is_empty() => Box::new(EmptyQuery),
            Predicate::And(children) => self.combine(Occur::Must, children)?,
            Predicate::Or(children) => self.combine(Occur::Should, children)?,
        })
    }

    fn combine(
        &self,
        occur: Occur,
        children: &[Predicate],
    ) -> Result<Box<dyn Query>> {
        let clauses = children
            .iter()
            .map(|child| Ok((occur, self.to_query(child)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(BooleanQuery::new(clauses)))
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").finish_non_exhaustive()
    }
}

fn match_text(text: &str) -> String {
    let mut folded = fold_for_match(text);
    if folded.len() > MAX_MATCH_BYTES {
        let mut cut = MAX_MATCH_BYTES;
        while !folded.is_char_boundary(cut) {
            cut -= 1;
        }
        folded.truncate(cut);
    }
    folded
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::query::{Operator, SearchQuery};

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn event(id: &str, when: NaiveDateTime, title: &str, venue: &str, note: &str) -> Event {
        Event {
            id: id.to_string(),
            datetime: when,
            title: title.to_string(),
            uri: String::new(),
            organizer: None,
            group: None,
            venue: venue.to_string(),
            summary: format!("summary of {id}"),
            note: note.to_string(),
            score: 0,
        }
    }

    fn corpus() -> Vec<Event> {
        vec![
            event("a", day(2011, 12, 31), "ゲートボール大会", "東京", ""),
            event("b", day(2012, 1, 1), "Outlook 設定", "大阪", "メール不通"),
            event("c", day(2012, 1, 15), "定例会", "東京", "ゲートボールの話"),
            event("d", day(2012, 1, 31), "投げる練習", "名古屋", "line\nbreak"),
            event("e", day(2012, 2, 1), "ゲートボール練習", "(仮) 会場", "*注意*"),
        ]
    }

    fn indexed() -> SearchIndex {
        let idx = SearchIndex::open_in_ram().unwrap();
        let mut writer = idx.writer(15_000_000).unwrap();
        for e in corpus() {
            idx.add_event(&writer, &e).unwrap();
        }
        writer.commit().unwrap();
        idx
    }

    fn sorted(mut ids: Vec<String>) -> Vec<String> {
        ids.sort();
        ids
    }

    fn expected(predicate: &Predicate) -> Vec<String> {
        sorted(
            corpus()
                .into_iter()
                .filter(|e| predicate.matches(e))
                .map(|e| e.id)
                .collect(),
        )
    }

    #[test]
    fn substring_match_in_any_field() {
        let idx = indexed();
        let p = Predicate::keyword("ゲートボール");
        assert_eq!(sorted(idx.select_ids(&p).unwrap()), vec!["a", "c", "e"]);
    }

    #[test]
    fn case_insensitive_match() {
        let idx = indexed();
        let p = Predicate::keyword("outLOOK");
        assert_eq!(idx.select_ids(&p).unwrap(), vec!["b"]);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let idx = indexed();
        assert_eq!(idx.select_ids(&Predicate::keyword("(仮)")).unwrap(), vec!["e"]);
        assert_eq!(idx.select_ids(&Predicate::keyword("*注意*")).unwrap(), vec!["e"]);
        assert!(idx.select_ids(&Predicate::keyword(".*")).unwrap().is_empty());
    }

    #[test]
    fn absent_keyword_returns_nothing() {
        let idx = indexed();
        assert!(idx.select_ids(&Predicate::keyword("Nothing")).unwrap().is_empty());
    }

    #[test]
    fn agrees_with_pure_evaluation() {
        let idx = indexed();
        let queries = vec![
            SearchQuery::new(vec![]),
            SearchQuery::new(vec!["ゲートボール".into(), "東京".into()])
                .with_operator(Operator::And),
            SearchQuery::new(vec!["ゲートボール".into(), "メール".into()]),
            SearchQuery::new(vec!["ゲートボール".into()])
                .with_range(Some("2012/01/01"), None),
            SearchQuery::new(vec![]).with_range(Some("2012/01/01"), Some("2012/01/31")),
            SearchQuery::new(vec!["line break".into()]),
        ];
        for q in queries {
            let p = q.build().unwrap();
            assert_eq!(sorted(idx.select_ids(&p).unwrap()), expected(&p), "{q:?}");
        }
    }

    #[test]
    fn empty_or_matches_nothing() {
        let idx = indexed();
        assert!(idx.select_ids(&Predicate::Or(vec![])).unwrap().is_empty());
        assert_eq!(idx.select_ids(&Predicate::And(vec![])).unwrap().len(), 5);
    }

    #[test]
    fn re_adding_replaces() {
        let idx = SearchIndex::open_in_ram().unwrap();
        let mut writer = idx.writer(15_000_000).unwrap();
        let e = event("a", day(2012, 1, 1), "old", "", "");
        idx.add_event(&writer, &e).unwrap();
        writer.commit().unwrap();

        let updated = event("a", day(2012, 1, 1), "new", "", "");
        idx.add_event(&writer, &updated).unwrap();
        writer.commit().unwrap();

        assert_eq!(idx.num_docs().unwrap(), 1);
        assert!(idx.select_ids(&Predicate::keyword("old")).unwrap().is_empty());
        assert_eq!(idx.select_ids(&Predicate::keyword("new")).unwrap(), vec!["a"]);
    }

    #[test]
    fn long_text_is_truncated_on_a_char_boundary() {
        let long = "あ".repeat(MAX_MATCH_BYTES);
        let folded = match_text(&long);
        assert!(folded.len() <= MAX_MATCH_BYTES);
        assert!(folded.chars().all(|c| c == 'あ'));
    }

    #[test]
    fn disk_persistence() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tantivy");

        {
            let idx = SearchIndex::open(&dir).unwrap();
            let mut writer = idx.writer(15_000_000).unwrap();
            idx.add_event(&writer, &event("a", day(2012, 1, 1), "persistent", "", ""))
                .unwrap();
            writer.commit().unwrap();
        }

        {
            let idx = SearchIndex::open(&dir).unwrap();
            let ids = idx.select_ids(&Predicate::keyword("persist")).unwrap();
            assert_eq!(ids, vec!["a"]);
        }
    }
}
