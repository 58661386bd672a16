//! Test world: shared collaborators plus registered parties.

use sealpost_core::{AccountService, PrivateKey, User};

use crate::{SimCrypto, SimDirectory, SimMessageStore};

/// A registered party: directory entry plus the private key handed out at
/// registration.
#[derive(Debug, Clone)]
pub struct Party {
    /// Directory entry (with public key).
    pub user: User,
    /// Private key delivered at registration.
    pub private_key: PrivateKey,
}

/// Shared simulated collaborators.
///
/// Clones of the individual services share state, so a test can hand one
/// clone to each party's synchronizer and inspect the other.
#[derive(Clone)]
pub struct World {
    /// Encryption service.
    pub crypto: SimCrypto,
    /// Message store.
    pub store: SimMessageStore,
    /// User directory and account service.
    pub directory: SimDirectory,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Empty world.
    pub fn new() -> Self {
        let crypto = SimCrypto::new();
        let directory = SimDirectory::new(crypto.clone());
        Self { crypto, store: SimMessageStore::new(), directory }
    }

    /// Register `username` and return the resulting party.
    ///
    /// # Panics
    ///
    /// Panics if the username is already taken.
    #[allow(clippy::expect_used)]
    pub async fn register(&self, username: &str) -> Party {
        let registration = self
            .directory
            .register(username, &format!("{username}@example.test"), "password")
            .await
            .expect("registration succeeds for a fresh username");

        Party {
            user: registration.user,
            private_key: registration.private_key.expect("registration always delivers a key"),
        }
    }
}
