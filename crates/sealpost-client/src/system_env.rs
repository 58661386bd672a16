//! Production Environment implementation using system time.
//!
//! `SystemEnv` drives the poll schedule with real time: `std::time::Instant`
//! for the clock and tokio's timer for sleeping. Tests use the harness
//! environment instead.

use std::time::Duration;

use sealpost_core::env::Environment;

/// Production environment using system time.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
