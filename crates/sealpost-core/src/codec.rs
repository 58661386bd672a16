//! Envelope codec.
//!
//! Thin adapter over the remote [`EncryptionService`] that turns service
//! failures into the two codec outcomes callers branch on, and builds the
//! dual-recipient ciphertext pair for an outgoing message.

use futures::future::try_join;
use tracing::debug;

use crate::{
    error::CodecError,
    service::EncryptionService,
    types::{OutgoingEnvelope, PrivateKey, PublicKey, UserId},
};

/// Stateless codec over an encryption service.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec<C> {
    service: C,
}

/// The two ciphertexts of one outgoing message.
///
/// `encrypted_content` is readable by the receiver, `sender_encrypted_content`
/// by the sender. Both are produced or neither is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPair {
    /// Ciphertext under the receiver's public key
    pub encrypted_content: String,
    /// Ciphertext under the sender's own public key
    pub sender_encrypted_content: String,
}

impl SealedPair {
    /// Address the pair to `receiver_id`.
    pub fn into_outgoing(self, receiver_id: UserId) -> OutgoingEnvelope {
        OutgoingEnvelope {
            receiver_id,
            encrypted_content: self.encrypted_content,
            sender_encrypted_content: self.sender_encrypted_content,
        }
    }
}

impl<C: EncryptionService> EnvelopeCodec<C> {
    /// Wrap an encryption service.
    pub fn new(service: C) -> Self {
        Self { service }
    }

    /// Encrypt `plaintext` to `recipient`.
    ///
    /// # Errors
    ///
    /// `EncryptionUnavailable` if the service is unreachable or rejects the
    /// key.
    pub async fn encrypt_for(
        &self,
        plaintext: &str,
        recipient: &PublicKey,
    ) -> Result<String, CodecError> {
        self.service
            .encrypt(plaintext, recipient)
            .await
            .map_err(|e| CodecError::EncryptionUnavailable { reason: e.to_string() })
    }

    /// Decrypt `ciphertext` with `key`.
    ///
    /// # Errors
    ///
    /// `DecryptionFailed` if the service rejects the pair for any reason.
    /// The failure concerns this one ciphertext only.
    pub async fn decrypt_with(
        &self,
        ciphertext: &str,
        key: &PrivateKey,
    ) -> Result<String, CodecError> {
        self.service
            .decrypt(ciphertext, key)
            .await
            .map_err(|e| CodecError::DecryptionFailed { reason: e.to_string() })
    }

    /// Encrypt `plaintext` once for the receiver and once for the sender.
    ///
    /// Both calls run concurrently. If either fails the whole seal fails and
    /// no ciphertext is returned.
    pub async fn seal(
        &self,
        plaintext: &str,
        receiver: &PublicKey,
        sender: &PublicKey,
    ) -> Result<SealedPair, CodecError> {
        let (encrypted_content, sender_encrypted_content) =
            try_join(self.encrypt_for(plaintext, receiver), self.encrypt_for(plaintext, sender))
                .await?;

        debug!(len = plaintext.len(), "sealed message for both parties");

        Ok(SealedPair { encrypted_content, sender_encrypted_content })
    }
}
