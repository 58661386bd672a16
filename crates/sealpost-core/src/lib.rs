//! Sealpost core
//!
//! Client-resident building blocks for a two-party end-to-end encrypted
//! conversation. Cryptographic primitives live behind a remote encryption
//! service; this crate only custodies keys, shapes envelopes, and remembers
//! the plaintext of messages the local user composed.
//!
//! # Components
//!
//! - [`KeyCustodian`]: Durable per-user private key record
//! - [`EnvelopeCodec`]: Adapter over the [`EncryptionService`]
//! - [`PlaintextCache`]: Per-user map of sent message id to plaintext
//! - [`storage`]: [`LocalStore`] abstraction with memory, redb and chaotic
//!   backends
//! - [`service`]: Contracts for the external collaborators (encryption
//!   service, message store, user directory, account service)
//!
//! Orchestration (polling, read receipts, optimistic sends) lives in
//! `sealpost-client`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod custodian;
pub mod env;
pub mod error;
pub mod plaintext_cache;
pub mod service;
pub mod storage;
pub mod types;

pub use codec::{EnvelopeCodec, SealedPair};
pub use custodian::KeyCustodian;
pub use error::{CodecError, ServiceError};
pub use plaintext_cache::PlaintextCache;
pub use service::{AccountService, EncryptionService, MessageStore, Registration, UserDirectory};
pub use storage::{ChaoticStore, LocalStore, MemoryStore, RedbStore, StorageError};
pub use types::{
    Envelope, EnvelopeMeta, MessageContent, MessageId, OutgoingEnvelope, PrivateKey, PublicKey,
    ResolvedMessage, StoredEnvelope, User, UserId,
};
