//! Deterministic simulation harness for Sealpost testing.
//!
//! In-process implementations of every collaborator trait, with fault and
//! latency injection, so synchronizer behavior can be tested without a
//! network.
//!
//! - [`SimCrypto`]: reversible toy encryption service
//! - [`SimMessageStore`]: in-memory message store with read-mark accounting
//!   and a fetch gate for race tests
//! - [`SimDirectory`]: user directory and account service
//! - [`SimEnv`]: tokio-timer environment that records requested sleeps
//! - [`World`]: wires the above together and registers parties

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_crypto;
pub mod sim_directory;
pub mod sim_env;
pub mod sim_store;
pub mod world;

pub use sim_crypto::SimCrypto;
pub use sim_directory::SimDirectory;
pub use sim_env::SimEnv;
pub use sim_store::SimMessageStore;
pub use world::{Party, World};
