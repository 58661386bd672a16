//! Signed-in session context.
//!
//! A `Session` is an explicit value: the local user, their key custodian and
//! their plaintext cache, all over one local profile. Nothing is global, so
//! two sessions (two parties) can run side by side in one process.

use std::sync::Arc;

use sealpost_core::{
    KeyCustodian, LocalStore, PlaintextCache, PrivateKey, StorageError, User, UserId,
};
use tracing::{debug, info, warn};

/// Storage key of the persisted signed-in user.
const SESSION_KEY: &str = "auth_session";

/// The local user's context over one local profile.
#[derive(Clone)]
pub struct Session<S: LocalStore> {
    user: User,
    store: S,
    custodian: KeyCustodian<S>,
    cache: Arc<PlaintextCache<S>>,
}

impl<S: LocalStore> Session<S> {
    /// Build a session for `user` without touching durable state.
    ///
    /// Loads the user's plaintext cache.
    pub fn new(store: S, user: User) -> Self {
        let cache = Arc::new(PlaintextCache::new(store.clone()));
        cache.load(&user.id);

        Self { custodian: KeyCustodian::new(store.clone()), user, store, cache }
    }

    /// Sign `user` in on this profile.
    ///
    /// Stores `private_key` when one was delivered (always at registration,
    /// at login only if the server returned it) and persists the user so
    /// [`Session::restore`] can pick it up later.
    pub fn sign_in(
        store: S,
        user: User,
        private_key: Option<PrivateKey>,
    ) -> Result<Self, StorageError> {
        let session = Self::new(store, user);

        if let Some(key) = private_key {
            session.custodian.save(&session.user.id, &key)?;
        } else {
            debug!(user = %session.user.id, "no private key delivered, keeping any key on file");
        }

        let record = serde_json::to_string(&session.user).map_err(|e| StorageError::Corrupt {
            key: SESSION_KEY.to_string(),
            reason: e.to_string(),
        })?;
        session.store.put(SESSION_KEY, &record)?;

        info!(user = %session.user.id, "signed in");
        Ok(session)
    }

    /// Session of the user persisted on this profile, if any.
    ///
    /// A corrupt session record is logged and reads as signed out.
    pub fn restore(store: S) -> Result<Option<Self>, StorageError> {
        let record = match store.get(SESSION_KEY) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(e) if e.is_corruption() => {
                warn!(error = %e, "session record is corrupt, treating as signed out");
                return Ok(None);
            },
            Err(e) => return Err(e),
        };

        match serde_json::from_str::<User>(&record) {
            Ok(user) => Ok(Some(Self::new(store, user))),
            Err(e) => {
                warn!(error = %e, "session record is corrupt, treating as signed out");
                Ok(None)
            },
        }
    }

    /// Sign out: remove the private key and the session record.
    ///
    /// The plaintext cache stays on the profile and is picked up again when
    /// the same user signs back in.
    pub fn sign_out(self) -> Result<(), StorageError> {
        self.custodian.remove(&self.user.id)?;
        self.store.remove(SESSION_KEY)?;
        info!(user = %self.user.id, "signed out");
        Ok(())
    }

    /// The local user.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The local user's id.
    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }

    /// Key custodian over this profile.
    pub fn custodian(&self) -> &KeyCustodian<S> {
        &self.custodian
    }

    /// The local user's plaintext cache.
    pub fn cache(&self) -> &Arc<PlaintextCache<S>> {
        &self.cache
    }

    /// The local user's private key, if one is on file.
    pub fn private_key(&self) -> Result<Option<PrivateKey>, StorageError> {
        self.custodian.get(&self.user.id)
    }
}
