use std::{
    path::Path,
    sync::{Mutex, PoisonError},
};

use tracing::debug;

use crate::{
    aggregate::{Bucket, GroupKey, aggregate},
    data_dir::DataDir,
    error::Result,
    event::Event,
    event_db::EventDb,
    paginate::{Page, paginate},
    query::Predicate,
    tantivy_index::SearchIndex,
};

/// Memory budget handed to each Tantivy writer.
const WRITER_BUDGET: usize = 15_000_000;

/// Intent-level operations the ingestion, search and vote paths need from
/// storage.
pub trait IndexStore {
    /// Store `event` unless its id already exists. Returns whether it was
    /// stored.
    fn insert_if_absent(&self, event: &Event) -> Result<bool>;

    /// Insert-if-absent for many events, one flag per input.
    fn insert_batch(&self, events: &[Event]) -> Result<Vec<bool>> {
        events.iter().map(|e| self.insert_if_absent(e)).collect()
    }

    /// Every event matching `predicate`, in no particular order.
    fn select(&self, predicate: &Predicate) -> Result<Vec<Event>>;

    fn get(&self, id: &str) -> Result<Option<Event>>;

    /// Add `delta` to the score of `id`. `None` if the id is unknown.
    fn increment(&self, id: &str, delta: i64) -> Result<Option<i64>>;

    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn group_by(
        &self,
        records: &[Event],
        key: GroupKey,
        limit: Option<usize>,
    ) -> Vec<Bucket> {
        aggregate(records, key, limit)
    }

    fn sort_and_slice(
        &self,
        records: Vec<Event>,
        page_size: usize,
        page: i64,
    ) -> Page {
        paginate(records, page_size, page)
    }
}

/// Index Store backed by a redb record table and a Tantivy index.
pub struct EventStore {
    events: EventDb,
    index: SearchIndex,
    write_lock: Mutex<()>,
}

impl EventStore {
    /// Open the store under the data directory.
    pub fn open(data_dir: &DataDir) -> Result<Self> {
        Self::open_at(&data_dir.events_db(), &data_dir.tantivy_dir()?)
    }

    pub fn open_at(db_path: &Path, index_dir: &Path) -> Result<Self> {
        Ok(Self::from_parts(
            EventDb::open(db_path)?,
            SearchIndex::open(index_dir)?,
        ))
    }

    /// A store whose records live in `dir` and whose index lives in memory
    /// (for testing).
    pub fn open_temporary(dir: &Path) -> Result<Self> {
        Ok(Self::from_parts(
            EventDb::open(&dir.join("events.redb"))?,
            SearchIndex::open_in_ram()?,
        ))
    }

    pub fn from_parts(events: EventDb, index: SearchIndex) -> Self {
        Self {
            events,
            index,
            write_lock: Mutex::new(()),
        }
    }

    /// Number of documents in the search index.
    pub fn indexed_len(&self) -> Result<u64> {
        self.index.num_docs()
    }

    /// Index every stored event again, e.g. after the index directory was
    /// removed.
    pub fn reindex(&self) -> Result<u64> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let all = self.events.list_all()?;

        let mut writer = self.index.writer(WRITER_BUDGET)?;
        writer.delete_all_documents()?;
        for event in &all {
            self.index.add_event(&writer, event)?;
        }
        writer.commit()?;

        debug!(count = all.len(), "reindexed events");
        Ok(all.len() as u64)
    }
}

impl IndexStore for EventStore {
    fn insert_if_absent(&self, event: &Event) -> Result<bool> {
        let flags = self.insert_batch(std::slice::from_ref(event))?;
        Ok(flags.first().copied().unwrap_or(false))
    }

    fn insert_batch(&self, events: &[Event]) -> Result<Vec<bool>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // The index commits before the records do, so a record is never
        // stored without being searchable.
        self.events.insert_new(events, |inserted| {
            let mut writer = self.index.writer(WRITER_BUDGET)?;
            for event in inserted {
                self.index.add_event(&writer, event)?;
            }
            writer.commit()?;
            debug!(count = inserted.len(), "indexed new events");
            Ok(())
        })
    }

    fn select(&self, predicate: &Predicate) -> Result<Vec<Event>> {
        let ids = self.index.select_ids(predicate)?;
        self.events.get_many(&ids)
    }

    fn get(&self, id: &str) -> Result<Option<Event>> {
        self.events.get(id)
    }

    fn increment(&self, id: &str, delta: i64) -> Result<Option<i64>> {
        self.events.increment(id, delta)
    }

    fn len(&self) -> Result<u64> {
        self.events.len()
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore").finish_non_exhaustive()
    }
}
