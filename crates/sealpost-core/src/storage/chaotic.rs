//! Chaotic storage wrapper for fault injection testing
//!
//! Storage wrapper that randomly fails operations to verify that storage
//! failures are reported (key custody) or absorbed (plaintext cache flush)
//! exactly where they should be.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex, PoisonError};

use super::{LocalStore, StorageError};

/// Chaotic storage wrapper that randomly injects failures
///
/// Delegates to an underlying store but fails operations based on a
/// configured failure rate. Failed writes never reach the inner store, so the
/// inner store always reflects exactly the writes that reported success.
#[derive(Clone)]
pub struct ChaoticStore<S: LocalStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Operation counter
    operation_count: Arc<Mutex<usize>>,
}

/// Simple deterministic RNG for chaos injection
///
/// Linear congruential generator, so chaos tests are reproducible with the
/// same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<S: LocalStore> ChaoticStore<S> {
    /// Create a new chaotic storage wrapper
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    #[allow(clippy::panic)]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        *self.operation_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn increment_operation_count(&self) {
        let mut count = self.operation_count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
    }

    fn should_fail(&self) -> bool {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).should_fail(self.failure_rate)
    }

    fn inject(&self) -> Result<(), StorageError> {
        self.increment_operation_count();
        if self.should_fail() {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: LocalStore> LocalStore for ChaoticStore<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inject()?;
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.remove(key)
    }
}
