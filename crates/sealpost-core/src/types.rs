//! Domain types shared by every Sealpost crate.
//!
//! Envelopes arrive from the message store in a single wire shape
//! ([`StoredEnvelope`]) whose sender-side ciphertext is optional. Before
//! resolution that shape is classified into an explicit [`Envelope`] variant
//! relative to the local user, so resolution never branches on optional
//! fields.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Stable user identifier assigned by the account service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Message identifier assigned by the message store on send.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Public key as published by the user directory (PEM text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(String);

impl PublicKey {
    /// Wrap an encoded public key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Encoded key material.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Private key of the local user.
///
/// Zeroized on drop. `Debug` never prints key material.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Zeroizing<String>);

impl PrivateKey {
    /// Wrap an encoded private key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(Zeroizing::new(key.into()))
    }

    /// Encoded key material.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A registered user as listed by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Public key. `None` means the user cannot currently be messaged.
    #[serde(default)]
    pub public_key: Option<PublicKey>,
    /// Registration timestamp as reported by the account service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl User {
    /// Whether a message can be encrypted for this user.
    pub fn is_reachable(&self) -> bool {
        self.public_key.is_some()
    }
}

/// Envelope as stored and exchanged by the message store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEnvelope {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Addressee of the message.
    pub receiver_id: UserId,
    /// Ciphertext under the receiver's public key.
    pub encrypted_content: String,
    /// Ciphertext under the sender's public key. Absent on envelopes created
    /// before dual envelopes existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_encrypted_content: Option<String>,
    /// Whether the receiver has acknowledged the message.
    #[serde(default)]
    pub is_read: bool,
    /// Creation timestamp assigned by the store.
    pub created_at: String,
}

impl StoredEnvelope {
    /// Metadata shared by every envelope variant.
    pub fn meta(&self) -> EnvelopeMeta {
        EnvelopeMeta {
            id: self.id.clone(),
            sender_id: self.sender_id.clone(),
            receiver_id: self.receiver_id.clone(),
            is_read: self.is_read,
            created_at: self.created_at.clone(),
        }
    }

    /// Whether `local` still owes a read receipt for this envelope.
    pub fn awaits_read_receipt(&self, local: &UserId) -> bool {
        &self.receiver_id == local && !self.is_read
    }

    /// Classify this envelope relative to the local user.
    ///
    /// Authorship takes precedence: a message the local user sent to
    /// themselves is treated as sent. Returns `None` when the local user is
    /// neither sender nor receiver. An empty sender ciphertext counts as
    /// absent.
    pub fn classify(self, local: &UserId) -> Option<Envelope> {
        let meta = self.meta();

        if &self.sender_id == local {
            return Some(match self.sender_encrypted_content.filter(|c| !c.is_empty()) {
                Some(mirror) => Envelope::SentWithMirror { meta, mirror },
                None => Envelope::SentLegacy { meta },
            });
        }

        if &self.receiver_id == local {
            return Some(Envelope::Received { meta, ciphertext: self.encrypted_content });
        }

        None
    }
}

/// Envelope metadata independent of ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeMeta {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Addressee of the message.
    pub receiver_id: UserId,
    /// Read flag as fetched.
    pub is_read: bool,
    /// Creation timestamp assigned by the store.
    pub created_at: String,
}

/// Envelope classified relative to the local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Addressed to the local user; decrypt with the local private key.
    Received {
        /// Envelope metadata.
        meta: EnvelopeMeta,
        /// Ciphertext under the local user's public key.
        ciphertext: String,
    },

    /// Sent by the local user with a sender-side mirror ciphertext.
    SentWithMirror {
        /// Envelope metadata.
        meta: EnvelopeMeta,
        /// Ciphertext under the local user's own public key.
        mirror: String,
    },

    /// Sent by the local user before mirrors existed. Unreadable unless the
    /// plaintext cache remembers it.
    SentLegacy {
        /// Envelope metadata.
        meta: EnvelopeMeta,
    },
}

/// Envelope submitted to the message store on send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEnvelope {
    /// Addressee.
    pub receiver_id: UserId,
    /// Ciphertext under the receiver's public key.
    pub encrypted_content: String,
    /// Ciphertext under the sender's own public key.
    pub sender_encrypted_content: String,
}

/// Resolved content of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Decrypted or remembered plaintext.
    Plaintext(String),
    /// Sent before mirrors existed and not in the plaintext cache.
    StillEncrypted,
    /// The encryption service rejected the ciphertext/key pair.
    FailedToDecrypt,
}

impl MessageContent {
    /// Placeholder shown for [`MessageContent::StillEncrypted`].
    pub const STILL_ENCRYPTED: &'static str = "[Encrypted]";

    /// Placeholder shown for [`MessageContent::FailedToDecrypt`].
    pub const FAILED_TO_DECRYPT: &'static str = "[Failed to decrypt]";

    /// Plaintext, if resolution succeeded.
    pub fn plaintext(&self) -> Option<&str> {
        match self {
            Self::Plaintext(text) => Some(text),
            Self::StillEncrypted | Self::FailedToDecrypt => None,
        }
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plaintext(text) => f.write_str(text),
            Self::StillEncrypted => f.write_str(Self::STILL_ENCRYPTED),
            Self::FailedToDecrypt => f.write_str(Self::FAILED_TO_DECRYPT),
        }
    }
}

/// A message as shown to the local user. Recomputed on every poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMessage {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Addressee of the message.
    pub receiver_id: UserId,
    /// Resolved content or placeholder.
    pub content: MessageContent,
    /// Creation timestamp assigned by the store.
    pub created_at: String,
    /// Read flag as fetched.
    pub is_read: bool,
}

impl ResolvedMessage {
    /// Attach resolved content to envelope metadata.
    pub fn new(meta: EnvelopeMeta, content: MessageContent) -> Self {
        Self {
            id: meta.id,
            sender_id: meta.sender_id,
            receiver_id: meta.receiver_id,
            content,
            created_at: meta.created_at,
            is_read: meta.is_read,
        }
    }
}
