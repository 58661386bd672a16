//! Simulation environment.
//!
//! Uses tokio's clock so tests can run under `start_paused = true` and
//! advance time explicitly. Every requested sleep is recorded, which lets
//! tests assert the poll schedule without measuring wall-clock time.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use sealpost_core::env::Environment;

/// Tokio-clock environment that records sleeps.
#[derive(Clone, Default)]
pub struct SimEnv {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl SimEnv {
    /// Create an environment with an empty sleep log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations passed to `sleep`, in call order.
    #[allow(clippy::expect_used)]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("Mutex poisoned").clone()
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.sleeps.lock().expect("Mutex poisoned").push(duration);
        tokio::time::sleep(duration)
    }
}
