use std::path::Path;

use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
};

use crate::{error::Result, event::Event};

const EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("events");

/// Durable record table: event id to JSON-encoded [`Event`].
///
/// This is the source of truth. The search index only answers which ids
/// match, and every result is read back from here.
pub struct EventDb {
    db: Database,
}

impl EventDb {
    /// Open or create an events database at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use rireki::EventDb;
    ///
    /// let db = EventDb::open(&tmp.path().join("events.db")).unwrap();
    /// assert_eq!(db.len().unwrap(), 0);
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(EVENTS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Insert every event whose id is not stored yet, in one transaction.
    ///
    /// Returns one flag per input telling whether it was inserted. Repeats
    /// within `events` count as duplicates after the first. `before_commit`
    /// sees the inserted events and runs before the transaction commits; if
    /// it fails nothing is written.
    pub fn insert_new<F>(
        &self,
        events: &[Event],
        before_commit: F,
    ) -> Result<Vec<bool>>
    where
        F: FnOnce(&[&Event]) -> Result<()>,
    {
        let txn = self.db.begin_write()?;
        let mut flags = Vec::with_capacity(events.len());
        let mut inserted = Vec::new();
        {
            let mut table = txn.open_table(EVENTS)?;
            for event in events {
                if table.get(event.id.as_str())?.is_some() {
                    flags.push(false);
                    continue;
                }
                let data = event.to_bytes()?;
                table.insert(event.id.as_str(), data.as_slice())?;
                flags.push(true);
                inserted.push(event);
            }
        }

        if inserted.is_empty() {
            return Ok(flags);
        }

        before_commit(&inserted)?;
        txn.commit()?;
        Ok(flags)
    }

    pub fn get(&self, id: &str) -> Result<Option<Event>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EVENTS)?;
        match table.get(id)? {
            Some(v) => Ok(Some(Event::from_bytes(v.value())?)),
            None => Ok(None),
        }
    }

    /// Load events for the given ids from a single snapshot. Unknown ids are
    /// skipped.
    pub fn get_many(&self, ids: &[String]) -> Result<Vec<Event>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EVENTS)?;
        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(v) = table.get(id.as_str())? {
                result.push(Event::from_bytes(v.value())?);
            }
        }
        Ok(result)
    }

    /// Add `delta` to an event's score and return the new score.
    pub fn increment(&self, id: &str, delta: i64) -> Result<Option<i64>> {
        let txn = self.db.begin_write()?;
        let score = {
            let mut table = txn.open_table(EVENTS)?;
            let current = table.get(id)?.map(|v| v.value().to_vec());
            match current {
                None => None,
                Some(bytes) => {
                    let mut event = Event::from_bytes(&bytes)?;
                    event.score = event.score.saturating_add(delta);
                    let data = event.to_bytes()?;
                    table.insert(id, data.as_slice())?;
                    Some(event.score)
                }
            }
        };

        if score.is_some() {
            txn.commit()?;
        }
        Ok(score)
    }

    pub fn len(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EVENTS)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Every stored event, in id order.
    pub fn list_all(&self) -> Result<Vec<Event>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EVENTS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            result.push(Event::from_bytes(v.value())?);
        }
        Ok(result)
    }
}

impl std::fmt::Debug for EventDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::Error;

    fn test_db() -> (tempfile::TempDir, EventDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = EventDb::open(&tmp.path().join("events.db")).unwrap();
        (tmp, db)
    }

    fn event(id: &str, title: &str) -> Event {
        Event {
            id: id.to_string(),
            datetime: NaiveDate::from_ymd_opt(2012, 1, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            title: title.to_string(),
            uri: String::new(),
            organizer: Some("Pat".to_string()),
            group: None,
            venue: String::new(),
            summary: String::new(),
            note: String::new(),
            score: 0,
        }
    }

    fn no_hook(_: &[&Event]) -> Result<()> {
        Ok(())
    }

    #[test]
    fn insert_and_get() {
        let (_tmp, db) = test_db();
        let flags = db.insert_new(&[event("a", "first")], no_hook).unwrap();
        assert_eq!(flags, vec![true]);
        assert_eq!(db.get("a").unwrap(), Some(event("a", "first")));
        assert_eq!(db.get("missing").unwrap(), None);
    }

    #[test]
    fn existing_ids_are_kept() {
        let (_tmp, db) = test_db();
        db.insert_new(&[event("a", "first")], no_hook).unwrap();

        let flags = db
            .insert_new(&[event("a", "second"), event("b", "other")], no_hook)
            .unwrap();
        assert_eq!(flags, vec![false, true]);
        assert_eq!(db.get("a").unwrap().unwrap().title, "first");
        assert_eq!(db.len().unwrap(), 2);
    }

    #[test]
    fn repeats_within_a_batch_keep_the_first() {
        let (_tmp, db) = test_db();
        let flags = db
            .insert_new(&[event("a", "first"), event("a", "second")], no_hook)
            .unwrap();
        assert_eq!(flags, vec![true, false]);
        assert_eq!(db.get("a").unwrap().unwrap().title, "first");
    }

    #[test]
    fn hook_sees_only_inserted_events() {
        let (_tmp, db) = test_db();
        db.insert_new(&[event("a", "first")], no_hook).unwrap();

        let mut seen = Vec::new();
        db.insert_new(&[event("a", "again"), event("b", "new")], |inserted| {
            seen = inserted.iter().map(|e| e.id.clone()).collect();
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["b"]);
    }

    #[test]
    fn failing_hook_writes_nothing() {
        let (_tmp, db) = test_db();
        let err = db
            .insert_new(&[event("a", "first")], |_| {
                Err(Error::Config("index unavailable".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(db.is_empty().unwrap());
    }

    #[test]
    fn increment_updates_score() {
        let (_tmp, db) = test_db();
        db.insert_new(&[event("a", "first")], no_hook).unwrap();

        assert_eq!(db.increment("a", 1).unwrap(), Some(1));
        assert_eq!(db.increment("a", 1).unwrap(), Some(2));
        assert_eq!(db.increment("a", -3).unwrap(), Some(-1));
        assert_eq!(db.get("a").unwrap().unwrap().score, -1);
    }

    #[test]
    fn increment_unknown_id() {
        let (_tmp, db) = test_db();
        assert_eq!(db.increment("ghost", 1).unwrap(), None);
        assert!(db.is_empty().unwrap());
    }

    #[test]
    fn get_many_skips_unknown_ids() {
        let (_tmp, db) = test_db();
        db.insert_new(&[event("a", "x"), event("b", "y")], no_hook)
            .unwrap();

        let ids = vec!["b".to_string(), "ghost".to_string(), "a".to_string()];
        let found: Vec<String> =
            db.get_many(&ids).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(found, vec!["b", "a"]);
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.db");

        {
            let db = EventDb::open(&path).unwrap();
            db.insert_new(&[event("a", "kept")], no_hook).unwrap();
            db.increment("a", 1).unwrap();
        }

        {
            let db = EventDb::open(&path).unwrap();
            let all = db.list_all().unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].title, "kept");
            assert_eq!(all[0].score, 1);
        }
    }
}
