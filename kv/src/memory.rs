//! In-memory key-value store implementation for testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::{DEFAULT_WRITE_TIMEOUT, KVError, KVResult, KVStore, KVTxn};

/// An in-memory key-value store backed by a HashMap.
///
/// Write transactions stage their mutations in an overlay that is applied
/// to the map only on commit, mirroring the rollback semantics of the
/// persistent store.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    write_slot: Arc<Mutex<()>>,
    write_timeout: Duration,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            write_slot: Arc::new(Mutex::new(())),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
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

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KVStore for MemoryStore {
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> KVResult<()> {
        let _slot = self.acquire_write_slot()?;
        self.data.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> KVResult<()> {
        let _slot = self.acquire_write_slot()?;
        self.data.lock().remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>> {
        let data = self.data.lock();
        let mut results: Vec<(String, Vec<u8>)> = data
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> KVResult<()> {
        let _slot = self.acquire_write_slot()?;
        let mut data = self.data.lock();
        for (key, value) in entries {
            data.insert(key.to_string(), value.to_vec());
        }
        Ok(())
    }

    fn batch_delete(&self, keys: &[&str]) -> KVResult<()> {
        let _slot = self.acquire_write_slot()?;
        let mut data = self.data.lock();
        for key in keys {
            data.remove(*key);
        }
        Ok(())
    }

    fn begin(&self) -> KVResult<Box<dyn KVTxn + '_>> {
        let slot = self.acquire_write_slot()?;
        Ok(Box::new(MemoryTxn {
            data: Arc::clone(&self.data),
            staged: HashMap::new(),
            _slot: slot,
        }))
    }
}

/// An open transaction on a [`MemoryStore`].
///
/// `staged` maps keys to `Some(value)` for writes and `None` for deletes.
/// The write slot guard keeps every other writer out for the transaction's
/// lifetime, which is what makes read-then-write sequences serializable.
struct MemoryTxn<'a> {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    staged: HashMap<String, Option<Vec<u8>>>,
    _slot: MutexGuard<'a, ()>,
}

impl KVTxn for MemoryTxn<'_> {
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        if let Some(staged) = self.staged.get(key) {
            return Ok(staged.clone());
        }
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> KVResult<()> {
        self.staged.insert(key.to_string(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> KVResult<()> {
        self.staged.insert(key.to_string(), None);
        Ok(())
    }

    fn commit(self: Box<Self>) -> KVResult<()> {
        // Apply while still holding the write slot.
        let MemoryTxn { data, staged, _slot } = *self;
        let mut map = data.lock();
        for (key, staged) in staged {
            match staged {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}
