//! Private key custody.
//!
//! The client receives a raw private key exactly once, at registration (or
//! from a login that unwraps the server-held copy). The custodian keeps it in
//! the local profile until logout. It performs no cryptography.

use tracing::{debug, warn};

use crate::{
    storage::{LocalStore, StorageError},
    types::{PrivateKey, UserId},
};

/// Storage key prefix for private key records.
const KEY_PREFIX: &str = "private_key_";

/// Durable, per-user storage of one private key.
///
/// # Invariants
///
/// - At most one key per user; `save` overwrites
/// - A missing or corrupt record reads as `None`, never as an error
/// - Backend I/O failures are always returned to the caller
#[derive(Clone)]
pub struct KeyCustodian<S: LocalStore> {
    store: S,
}

impl<S: LocalStore> KeyCustodian<S> {
    /// Create a custodian over the given local store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn record_key(user_id: &UserId) -> String {
        format!("{KEY_PREFIX}{user_id}")
    }

    /// Store `key` for `user_id`, overwriting any existing record.
    pub fn save(&self, user_id: &UserId, key: &PrivateKey) -> Result<(), StorageError> {
        self.store.put(&Self::record_key(user_id), key.expose())?;
        debug!(user = %user_id, "private key stored");
        Ok(())
    }

    /// Private key for `user_id`. `None` if no usable key is on file.
    ///
    /// Absence means "cannot decrypt" and is not an error. A corrupt record
    /// is logged and reported as absent.
    pub fn get(&self, user_id: &UserId) -> Result<Option<PrivateKey>, StorageError> {
        match self.store.get(&Self::record_key(user_id)) {
            Ok(Some(pem)) if pem.trim().is_empty() => {
                warn!(user = %user_id, "private key record is empty, treating as absent");
                Ok(None)
            },
            Ok(Some(pem)) => Ok(Some(PrivateKey::new(pem))),
            Ok(None) => Ok(None),
            Err(e) if e.is_corruption() => {
                warn!(
                    user = %user_id,
                    error = %e,
                    "private key record is corrupt, treating as absent"
                );
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// Delete the key for `user_id`.
    ///
    /// Idempotent: removing an absent key is a no-op.
    pub fn remove(&self, user_id: &UserId) -> Result<(), StorageError> {
        self.store.remove(&Self::record_key(user_id))?;
        debug!(user = %user_id, "private key removed");
        Ok(())
    }
}
