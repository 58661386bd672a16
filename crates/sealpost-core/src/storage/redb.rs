//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. One
//! database file plays the role of a local profile: everything written
//! survives process restarts and logout/login cycles.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};

use super::{LocalStore, StorageError};

/// Table: local_storage
/// Key: record key (e.g. `private_key_<userId>`)
/// Value: UTF-8 bytes of the record
const LOCAL_STORAGE: TableDefinition<&str, &[u8]> = TableDefinition::new("local_storage");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates the `local_storage` table if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(LOCAL_STORAGE).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl LocalStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(LOCAL_STORAGE).map_err(|e| StorageError::Io(e.to_string()))?;

        let Some(value) = table.get(key).map_err(|e| StorageError::Io(e.to_string()))? else {
            return Ok(None);
        };

        String::from_utf8(value.value().to_vec())
            .map(Some)
            .map_err(|e| StorageError::Corrupt { key: key.to_string(), reason: e.to_string() })
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        {
            let mut table =
                txn.open_table(LOCAL_STORAGE).map_err(|e| StorageError::Io(e.to_string()))?;
            table.insert(key, value.as_bytes()).map_err(|e| StorageError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        {
            let mut table =
                txn.open_table(LOCAL_STORAGE).map_err(|e| StorageError::Io(e.to_string()))?;
            table.remove(key).map_err(|e| StorageError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }
}

impl RedbStore {
    /// Write raw bytes under `key`, bypassing UTF-8 encoding.
    ///
    /// Only used to plant damaged records in tests.
    #[cfg(test)]
    fn put_raw(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(LOCAL_STORAGE).map_err(|e| StorageError::Io(e.to_string()))?;
            table.insert(key, value).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))
    }
}
