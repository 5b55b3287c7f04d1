//! Redb-based persistent key-value store implementation.

use std::path::Path;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use redb::{Database, ReadableTable, TableDefinition};

use crate::{DEFAULT_WRITE_TIMEOUT, KVError, KVResult, KVStore, KVTxn};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// A persistent key-value store backed by redb.
///
/// redb write transactions are single-writer: the store admits writers
/// through its own slot so that waiting is bounded by `write_timeout`
/// instead of blocking inside `begin_write` indefinitely.
pub struct RedbStore {
    db: Database,
    write_slot: Mutex<()>,
    write_timeout: Duration,
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> KVResult<Self> {
        let db = Database::create(path).map_err(|e| KVError::Storage(e.to_string()))?;

        // Create the table if it doesn't exist
        let tx = db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let _ = tx
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        tx.commit().map_err(|e| KVError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            write_slot: Mutex::new(()),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    /// Override the bound on waiting for the write slot.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    fn acquire_write_slot(&self) -> KVResult<MutexGuard<'_, ()>> {
        self.write_slot
            .try_lock_for(self.write_timeout)
            .ok_or(KVError::Timeout)
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = tx
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;

        match table
            .get(key)
            .map_err(|e| KVError::Storage(e.to_string()))?
        {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> KVResult<()> {
        let _slot = self.acquire_write_slot()?;
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = tx
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        tx.commit().map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> KVResult<()> {
        let _slot = self.acquire_write_slot()?;
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = tx
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        tx.commit().map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = tx
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        for item in table.iter().map_err(|e| KVError::Storage(e.to_string()))? {
            let (key, value) = item.map_err(|e| KVError::Storage(e.to_string()))?;
            let key_str = key.value();
            if key_str.starts_with(prefix) {
                results.push((key_str.to_string(), value.value().to_vec()));
            }
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> KVResult<()> {
        let _slot = self.acquire_write_slot()?;
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = tx
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            for (key, value) in entries {
                table
                    .insert(*key, *value)
                    .map_err(|e| KVError::Storage(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn batch_delete(&self, keys: &[&str]) -> KVResult<()> {
        let _slot = self.acquire_write_slot()?;
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = tx
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            for key in keys {
                table
                    .remove(*key)
                    .map_err(|e| KVError::Storage(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn begin(&self) -> KVResult<Box<dyn KVTxn + '_>> {
        let slot = self.acquire_write_slot()?;
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(Box::new(RedbTxn { tx, _slot: slot }))
    }
}

/// An open redb write transaction holding the store's write slot.
/// Dropping it without commit aborts the underlying transaction.
struct RedbTxn<'a> {
    tx: redb::WriteTransaction,
    _slot: MutexGuard<'a, ()>,
}

impl KVTxn for RedbTxn<'_> {
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        let table = self
            .tx
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        match table
            .get(key)
            .map_err(|e| KVError::Storage(e.to_string()))?
        {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> KVResult<()> {
        let mut table = self
            .tx
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        table
            .insert(key, value)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> KVResult<()> {
        let mut table = self
            .tx
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        table
            .remove(key)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> KVResult<()> {
        // Commit while still holding the write slot.
        let RedbTxn { tx, _slot } = *self;
        tx.commit().map_err(|e| KVError::Storage(e.to_string()))
    }
}
