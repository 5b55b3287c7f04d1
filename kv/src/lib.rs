//! Key-value store interface and implementations.
//!
//! Provides a trait-based KV store interface with an in-memory implementation
//! for testing and a redb-based implementation for persistence.
//!
//! Beyond plain get/set, stores expose serializable write transactions via
//! [`KVStore::begin`]: a transaction reads its own staged writes, excludes
//! every other writer until it commits, and rolls back when dropped without
//! committing. This is the primitive the payment path builds its
//! all-or-nothing commits on.

pub mod memory;
pub mod redb;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in KV store operations.
#[derive(Error, Debug)]
pub enum KVError {
    #[error("kv: not found")]
    NotFound,

    #[error("kv: storage error: {0}")]
    Storage(String),

    #[error("kv: serialization error: {0}")]
    Serialization(String),

    #[error("kv: timed out waiting for the write slot")]
    Timeout,
}

/// Result type for KV operations.
pub type KVResult<T> = Result<T, KVError>;

/// Default bound on waiting for the exclusive write slot.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Key-value store trait.
///
/// This trait provides basic operations for storing and retrieving
/// key-value pairs with string keys and byte values, plus serializable
/// write transactions.
///
/// Writers are admitted one at a time. Acquiring the write slot waits at
/// most the store's configured timeout and then fails with
/// [`KVError::Timeout`], so no caller blocks indefinitely behind a stuck
/// writer.
pub trait KVStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>>;

    /// Set a key-value pair.
    fn set(&self, key: &str, value: &[u8]) -> KVResult<()>;

    /// Delete a key.
    fn delete(&self, key: &str) -> KVResult<()>;

    /// Scan for keys with a given prefix, ascending by key.
    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>>;

    /// Batch set multiple key-value pairs atomically.
    fn batch_set(&self, entries: &[(&str, &[u8])]) -> KVResult<()>;

    /// Batch delete multiple keys atomically.
    fn batch_delete(&self, keys: &[&str]) -> KVResult<()>;

    /// Begin a serializable read-write transaction.
    ///
    /// The returned transaction holds the store's single write slot: no
    /// other write (plain or transactional) proceeds until it commits or is
    /// dropped. Reads inside the transaction observe its own staged writes.
    fn begin(&self) -> KVResult<Box<dyn KVTxn + '_>>;
}

/// An open read-write transaction.
///
/// All writes are staged until [`KVTxn::commit`]; dropping the transaction
/// without committing discards every staged write.
pub trait KVTxn {
    /// Get a value by key, observing staged writes.
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>>;

    /// Stage a key-value pair.
    fn set(&mut self, key: &str, value: &[u8]) -> KVResult<()>;

    /// Stage a key deletion.
    fn delete(&mut self, key: &str) -> KVResult<()>;

    /// Atomically apply every staged write.
    fn commit(self: Box<Self>) -> KVResult<()>;
}

impl fmt::Debug for dyn KVStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KVStore {{ ... }}")
    }
}

impl fmt::Debug for dyn KVTxn + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KVTxn {{ ... }}")
    }
}

/// A boxed KV store for use in trait objects.
pub type BoxedKVStore = Box<dyn KVStore>;

// Re-export the implementations
pub use memory::MemoryStore;
pub use redb::RedbStore;
