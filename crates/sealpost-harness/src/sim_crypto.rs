//! Toy encryption service.
//!
//! Ciphertext format: `sim:<label>:<nonce>:<reversed plaintext>`. A key pair
//! for label `x` is `pk-x` / `sk-x`. Nothing here is secure; it only has to
//! be deterministic, keyed, and able to fail on demand.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use sealpost_core::{EncryptionService, PrivateKey, PublicKey, ServiceError};

#[derive(Default)]
struct CryptoState {
    /// Registered public keys by label.
    labels: HashSet<String>,
    nonce: u64,
    encrypt_calls: usize,
    decrypt_calls: usize,
    /// Every ciphertext submitted for decryption, in call order.
    decrypted: Vec<String>,
    rejected: HashSet<String>,
    latency: HashMap<String, Duration>,
    encryption_down: bool,
    /// Public keys whose encryption fails.
    refused_keys: HashSet<String>,
}

/// Deterministic encryption service with fault injection.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct SimCrypto {
    state: Arc<Mutex<CryptoState>>,
}

fn reverse(text: &str) -> String {
    text.chars().rev().collect()
}

fn rejected(reason: &str) -> ServiceError {
    ServiceError::Rejected { status: 400, reason: reason.to_string() }
}

impl SimCrypto {
    /// Create a service with no registered keys.
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::expect_used)]
    fn state(&self) -> std::sync::MutexGuard<'_, CryptoState> {
        self.state.lock().expect("Mutex poisoned")
    }

    /// Register and return the key pair for `label`.
    ///
    /// Calling twice with the same label returns the same pair.
    pub fn generate_keypair(&self, label: &str) -> (PublicKey, PrivateKey) {
        self.state().labels.insert(label.to_string());
        (PublicKey::new(format!("pk-{label}")), PrivateKey::new(format!("sk-{label}")))
    }

    /// Ciphertext of `plaintext` under `public_key`, without touching call
    /// counters or fault settings.
    ///
    /// Used to plant envelopes directly in a message store.
    pub fn ciphertext_for(&self, plaintext: &str, public_key: &PublicKey) -> String {
        let label = public_key.as_str().trim_start_matches("pk-");
        let mut state = self.state();
        state.nonce += 1;
        format!("sim:{label}:{}:{}", state.nonce, reverse(plaintext))
    }

    /// Make every future decryption of `ciphertext` fail.
    pub fn reject_ciphertext(&self, ciphertext: &str) {
        self.state().rejected.insert(ciphertext.to_string());
    }

    /// Delay decryption of `ciphertext` by `latency`.
    pub fn delay_decrypt(&self, ciphertext: &str, latency: Duration) {
        self.state().latency.insert(ciphertext.to_string(), latency);
    }

    /// Make every encryption fail as unreachable.
    pub fn set_encryption_down(&self, down: bool) {
        self.state().encryption_down = down;
    }

    /// Make encryption under `public_key` fail with a rejection.
    pub fn refuse_key(&self, public_key: &PublicKey) {
        self.state().refused_keys.insert(public_key.as_str().to_string());
    }

    /// Number of `encrypt` calls served.
    pub fn encrypt_calls(&self) -> usize {
        self.state().encrypt_calls
    }

    /// Number of `decrypt` calls served.
    pub fn decrypt_calls(&self) -> usize {
        self.state().decrypt_calls
    }

    /// Ciphertexts submitted for decryption, in call order.
    pub fn decrypted(&self) -> Vec<String> {
        self.state().decrypted.clone()
    }

    /// Reset call counters and the decryption log.
    pub fn reset_counters(&self) {
        let mut state = self.state();
        state.encrypt_calls = 0;
        state.decrypt_calls = 0;
        state.decrypted.clear();
    }
}

#[async_trait]
impl EncryptionService for SimCrypto {
    async fn encrypt(
        &self,
        plaintext: &str,
        public_key: &PublicKey,
    ) -> Result<String, ServiceError> {
        {
            let mut state = self.state();
            state.encrypt_calls += 1;

            if state.encryption_down {
                return Err(ServiceError::Unreachable("encryption service down".into()));
            }
            if state.refused_keys.contains(public_key.as_str()) {
                return Err(rejected("public key refused"));
            }

            let known = public_key
                .as_str()
                .strip_prefix("pk-")
                .is_some_and(|label| state.labels.contains(label));
            if !known {
                return Err(rejected("unknown public key"));
            }
        }

        Ok(self.ciphertext_for(plaintext, public_key))
    }

    async fn decrypt(
        &self,
        ciphertext: &str,
        private_key: &PrivateKey,
    ) -> Result<String, ServiceError> {
        let latency = {
            let mut state = self.state();
            state.decrypt_calls += 1;
            state.decrypted.push(ciphertext.to_string());
            state.latency.get(ciphertext).copied()
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.state().rejected.contains(ciphertext) {
            return Err(rejected("ciphertext rejected"));
        }

        let mut parts = ciphertext.splitn(4, ':');
        let (Some("sim"), Some(label), Some(_nonce), Some(body)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(rejected("malformed ciphertext"));
        };

        if private_key.expose() != format!("sk-{label}") {
            return Err(rejected("wrong private key"));
        }

        Ok(reverse(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decrypts_with_matching_key_only() {
        let crypto = SimCrypto::new();
        let (pk_bob, sk_bob) = crypto.generate_keypair("bob");
        let (_, sk_alice) = crypto.generate_keypair("alice");

        let ct = crypto.encrypt("hi: there", &pk_bob).await.unwrap();

        assert_eq!(crypto.decrypt(&ct, &sk_bob).await.unwrap(), "hi: there");
        assert!(crypto.decrypt(&ct, &sk_alice).await.is_err());
    }

    #[tokio::test]
    async fn unknown_public_key_is_rejected() {
        let crypto = SimCrypto::new();

        let err = crypto.encrypt("hi", &PublicKey::new("pk-nobody")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn repeated_encryption_differs() {
        let crypto = SimCrypto::new();
        let (pk, _) = crypto.generate_keypair("bob");

        let a = crypto.encrypt("same", &pk).await.unwrap();
        let b = crypto.encrypt("same", &pk).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn rejected_ciphertext_fails() {
        let crypto = SimCrypto::new();
        let (pk, sk) = crypto.generate_keypair("bob");
        let ct = crypto.ciphertext_for("x", &pk);
        crypto.reject_ciphertext(&ct);

        assert!(crypto.decrypt(&ct, &sk).await.is_err());
        assert_eq!(crypto.decrypt_calls(), 1);
        assert_eq!(crypto.encrypt_calls(), 0);
    }
}
