//! Client
//!
//! Conversation synchronization for Sealpost: keeps the view of one
//! two-party end-to-end encrypted conversation in step with the message
//! store, using the building blocks in [`sealpost_core`].
//!
//! # Architecture
//!
//! The view itself ([`Conversation`]) is a pure state machine. The
//! [`ConversationSynchronizer`] performs the I/O around it (fetch, decrypt,
//! send, read receipts) through the collaborator traits and publishes every
//! transition on a `tokio::sync::watch` channel. Polling is an explicit
//! [`Subscription`] value bound to one peer selection.
//!
//! # Components
//!
//! - [`Session`]: Explicit signed-in context (user, key custodian, cache)
//! - [`ConversationSynchronizer`]: Tick resolution, sends, read receipts
//! - [`Conversation`]: Published view with selection generations
//! - [`Subscription`]: Cancellable poll loop
//! - [`SyncConfig`] / [`HttpConfig`]: Configuration
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides
//! [`transport::HttpApi`], an HTTP implementation of every collaborator.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conversation;
mod error;
mod session;
mod subscription;
mod synchronizer;
mod system_env;

#[cfg(feature = "transport")]
pub mod transport;

pub use config::{DEFAULT_POLL_INTERVAL, HttpConfig, SyncConfig};
pub use conversation::{Conversation, SyncPhase, TickTicket};
pub use error::{SendRejection, SyncError};
pub use sealpost_core::env::Environment;
pub use session::Session;
pub use subscription::Subscription;
pub use synchronizer::{ConversationSynchronizer, TickReport};
pub use system_env::SystemEnv;
