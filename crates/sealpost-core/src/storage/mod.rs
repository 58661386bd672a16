//! Durable local storage abstraction.
//!
//! A string-keyed store scoped to one local profile (the analogue of a
//! browser profile). [`crate::KeyCustodian`] and [`crate::PlaintextCache`]
//! are the only writers. The trait is synchronous: every backend is local
//! and fast, and callers never hold locks across an await.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStore;
pub use error::StorageError;
pub use memory::MemoryStore;

pub use self::redb::RedbStore;

/// String-keyed durable storage.
///
/// Must be Clone (shared by the key custodian, the plaintext cache and the
/// session record), Send + Sync, and synchronous. Implementations share
/// internal state via Arc, so clones access the same underlying storage.
pub trait LocalStore: Clone + Send + Sync + 'static {
    /// Read the value stored under `key`.
    ///
    /// Returns `None` if nothing is stored. A value that exists but cannot be
    /// read back as text is reported as [`StorageError::Corrupt`].
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, overwriting any existing value.
    ///
    /// # Invariants
    ///
    /// - Post: a subsequent `get(key)` returns `value` until the next write
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value stored under `key`.
    ///
    /// Idempotent: removing an absent key is a no-op.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
