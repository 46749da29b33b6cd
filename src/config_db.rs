use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::error::Result;

const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");
/// Topic name to a JSON array of its words.
const TOPICS: TableDefinition<&str, &str> = TableDefinition::new("topics");

pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(SETTINGS)?;
        txn.open_table(TOPICS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// Get a setting, returning the default if not set.
    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), v.value().to_string()));
        }
        Ok(result)
    }

    // -- Topics --

    pub fn set_topic(&self, name: &str, words: &[String]) -> Result<()> {
        let encoded = serde_json::to_string(words)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TOPICS)?;
            table.insert(name, encoded.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_topic(&self, name: &str) -> Result<Option<Vec<String>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TOPICS)?;
        match table.get(name)? {
            Some(v) => Ok(Some(serde_json::from_str(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn remove_topic(&self, name: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(TOPICS)?;
            table.remove(name)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    /// All topics in name order.
    pub fn list_topics(&self) -> Result<Vec<(String, Vec<String>)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TOPICS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), serde_json::from_str(v.value())?));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}
