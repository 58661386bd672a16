//! In-memory user directory and account service.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use sealpost_core::{
    AccountService, PrivateKey, Registration, ServiceError, User, UserDirectory, UserId,
};

use crate::SimCrypto;

struct Account {
    user: User,
    password: String,
    private_key: PrivateKey,
}

#[derive(Default)]
struct DirectoryState {
    accounts: Vec<Account>,
    withhold_keys_on_login: bool,
}

/// In-memory [`UserDirectory`] and [`AccountService`].
///
/// Registration generates the key pair through the shared [`SimCrypto`], so
/// registered users can immediately exchange messages.
#[derive(Clone)]
pub struct SimDirectory {
    crypto: SimCrypto,
    state: Arc<Mutex<DirectoryState>>,
}

impl SimDirectory {
    /// Create an empty directory backed by `crypto` for key generation.
    pub fn new(crypto: SimCrypto) -> Self {
        Self { crypto, state: Arc::new(Mutex::new(DirectoryState::default())) }
    }

    #[allow(clippy::expect_used)]
    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().expect("Mutex poisoned")
    }

    /// Add a user with no public key (cannot be messaged).
    pub fn add_keyless(&self, username: &str) -> User {
        let user = User {
            id: UserId::new(format!("user-{username}")),
            username: username.to_string(),
            email: format!("{username}@example.test"),
            public_key: None,
            created_at: None,
        };
        self.state().accounts.push(Account {
            user: user.clone(),
            password: String::new(),
            private_key: PrivateKey::new(""),
        });
        user
    }

    /// Stop returning the private key from `login`.
    pub fn withhold_keys_on_login(&self, withhold: bool) {
        self.state().withhold_keys_on_login = withhold;
    }
}

fn not_found(what: &str) -> ServiceError {
    ServiceError::Rejected { status: 404, reason: format!("{what} not found") }
}

#[async_trait]
impl UserDirectory for SimDirectory {
    async fn list_users(&self, excluding: Option<&UserId>) -> Result<Vec<User>, ServiceError> {
        Ok(self
            .state()
            .accounts
            .iter()
            .map(|a| &a.user)
            .filter(|u| Some(&u.id) != excluding)
            .cloned()
            .collect())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, ServiceError> {
        self.state()
            .accounts
            .iter()
            .find(|a| &a.user.id == user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| not_found("user"))
    }

    async fn search_users(
        &self,
        query: &str,
        excluding: Option<&UserId>,
    ) -> Result<Vec<User>, ServiceError> {
        let query = query.to_lowercase();
        Ok(self
            .list_users(excluding)
            .await?
            .into_iter()
            .filter(|u| u.username.to_lowercase().contains(&query))
            .collect())
    }
}

#[async_trait]
impl AccountService for SimDirectory {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration, ServiceError> {
        let mut state = self.state();
        if state.accounts.iter().any(|a| a.user.email == email || a.user.username == username) {
            return Err(ServiceError::Rejected {
                status: 400,
                reason: "username or email already registered".into(),
            });
        }

        let (public_key, private_key) = self.crypto.generate_keypair(username);
        let user = User {
            id: UserId::new(format!("user-{username}")),
            username: username.to_string(),
            email: email.to_string(),
            public_key: Some(public_key),
            created_at: None,
        };
        state.accounts.push(Account {
            user: user.clone(),
            password: password.to_string(),
            private_key: private_key.clone(),
        });

        Ok(Registration { user, private_key: Some(private_key) })
    }

    async fn login(&self, email: &str, password: &str) -> Result<Registration, ServiceError> {
        let state = self.state();
        let account = state
            .accounts
            .iter()
            .find(|a| a.user.email == email && a.password == password)
            .ok_or(ServiceError::Rejected {
                status: 401,
                reason: "invalid credentials".into(),
            })?;

        let private_key =
            (!state.withhold_keys_on_login).then(|| account.private_key.clone());
        Ok(Registration { user: account.user.clone(), private_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_login() {
        let directory = SimDirectory::new(SimCrypto::new());

        let reg = directory.register("alice", "alice@example.test", "pw").await.unwrap();
        assert!(reg.user.is_reachable());
        assert!(reg.private_key.is_some());

        let login = directory.login("alice@example.test", "pw").await.unwrap();
        assert_eq!(login.user, reg.user);
        assert_eq!(login.private_key, reg.private_key);

        let err = directory.login("alice@example.test", "wrong").await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn list_excludes_caller_and_search_matches_username() {
        let directory = SimDirectory::new(SimCrypto::new());
        let alice = directory.register("alice", "a@x", "pw").await.unwrap().user;
        directory.register("bob", "b@x", "pw").await.unwrap();
        directory.register("bobby", "bb@x", "pw").await.unwrap();

        let others = directory.list_users(Some(&alice.id)).await.unwrap();
        assert_eq!(others.len(), 2);

        let found = directory.search_users("BOB", Some(&alice.id)).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(directory.search_users("ali", Some(&alice.id)).await.unwrap().is_empty());
    }
}
