//! Contracts for the external collaborators.
//!
//! The client never touches ciphertext internals or the network directly;
//! everything goes through these traits. `sealpost-client` ships HTTP
//! implementations behind its `transport` feature and `sealpost-harness`
//! ships deterministic in-process ones.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::ServiceError,
    types::{MessageId, OutgoingEnvelope, PrivateKey, PublicKey, StoredEnvelope, User, UserId},
};

/// Remote encryption service. Stateless; owns all cryptographic primitives.
#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// Encrypt `plaintext` to `public_key`.
    async fn encrypt(&self, plaintext: &str, public_key: &PublicKey)
    -> Result<String, ServiceError>;

    /// Decrypt `ciphertext` with `private_key`.
    async fn decrypt(
        &self,
        ciphertext: &str,
        private_key: &PrivateKey,
    ) -> Result<String, ServiceError>;
}

/// Server-side message store. Holds ciphertext only.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// All envelopes exchanged between `local` and `peer`, in server order.
    async fn fetch_conversation(
        &self,
        peer: &UserId,
        local: &UserId,
    ) -> Result<Vec<StoredEnvelope>, ServiceError>;

    /// Persist an outgoing envelope. Returns the stored record with its
    /// server-assigned id.
    async fn send(
        &self,
        sender: &UserId,
        envelope: OutgoingEnvelope,
    ) -> Result<StoredEnvelope, ServiceError>;

    /// Flag a message as read. Repeating the call is harmless.
    async fn mark_read(&self, message_id: &MessageId) -> Result<(), ServiceError>;
}

/// User directory: identities and public keys.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// All users, optionally excluding one (usually the caller).
    async fn list_users(&self, excluding: Option<&UserId>) -> Result<Vec<User>, ServiceError>;

    /// Single user by id.
    async fn get_user(&self, user_id: &UserId) -> Result<User, ServiceError>;

    /// Users whose username or email matches `query`.
    async fn search_users(
        &self,
        query: &str,
        excluding: Option<&UserId>,
    ) -> Result<Vec<User>, ServiceError>;
}

/// Outcome of registering or logging in.
#[derive(Debug, Clone)]
pub struct Registration {
    /// The authenticated user.
    pub user: User,
    /// Private key delivered by the server. Present at registration; present
    /// at login only if the server holds a recoverable copy.
    pub private_key: Option<PrivateKey>,
}

/// Account lifecycle against the identity service.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Create an account. The server generates the key pair and returns the
    /// private half exactly once.
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration, ServiceError>;

    /// Authenticate an existing account.
    async fn login(&self, email: &str, password: &str) -> Result<Registration, ServiceError>;
}

#[async_trait]
impl<T: EncryptionService + ?Sized> EncryptionService for Arc<T> {
    async fn encrypt(
        &self,
        plaintext: &str,
        public_key: &PublicKey,
    ) -> Result<String, ServiceError> {
        (**self).encrypt(plaintext, public_key).await
    }

    async fn decrypt(
        &self,
        ciphertext: &str,
        private_key: &PrivateKey,
    ) -> Result<String, ServiceError> {
        (**self).decrypt(ciphertext, private_key).await
    }
}

#[async_trait]
impl<T: MessageStore + ?Sized> MessageStore for Arc<T> {
    async fn fetch_conversation(
        &self,
        peer: &UserId,
        local: &UserId,
    ) -> Result<Vec<StoredEnvelope>, ServiceError> {
        (**self).fetch_conversation(peer, local).await
    }

    async fn send(
        &self,
        sender: &UserId,
        envelope: OutgoingEnvelope,
    ) -> Result<StoredEnvelope, ServiceError> {
        (**self).send(sender, envelope).await
    }

    async fn mark_read(&self, message_id: &MessageId) -> Result<(), ServiceError> {
        (**self).mark_read(message_id).await
    }
}

#[async_trait]
impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    async fn list_users(&self, excluding: Option<&UserId>) -> Result<Vec<User>, ServiceError> {
        (**self).list_users(excluding).await
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, ServiceError> {
        (**self).get_user(user_id).await
    }

    async fn search_users(
        &self,
        query: &str,
        excluding: Option<&UserId>,
    ) -> Result<Vec<User>, ServiceError> {
        (**self).search_users(query, excluding).await
    }
}
