//! In-memory message store.
//!
//! Assigns sequential ids (`msg-1`, `msg-2`, ...) and monotonically
//! increasing timestamps, so insertion order is creation order.
//!
//! Fetches can be gated: after [`SimMessageStore::hold_fetches`], every
//! fetch parks until [`SimMessageStore::release_fetch`] lets it through.
//! The result is computed when the fetch starts, so anything stored while
//! it is parked is missing from its response, as with a response still on
//! the wire.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use sealpost_core::{
    MessageId, MessageStore, OutgoingEnvelope, ServiceError, StoredEnvelope, UserId,
};
use tokio::sync::{Notify, Semaphore};

#[derive(Default)]
struct StoreState {
    envelopes: Vec<StoredEnvelope>,
    next_id: u64,
    fetch_count: usize,
    read_marks: HashMap<MessageId, usize>,
    fetch_down: bool,
    send_down: bool,
    mark_read_down: HashSet<MessageId>,
}

/// In-memory [`MessageStore`] with fault injection.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct SimMessageStore {
    state: Arc<Mutex<StoreState>>,
    gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
    fetch_started: Arc<Notify>,
}

impl SimMessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::expect_used)]
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("Mutex poisoned")
    }

    fn next_record(state: &mut StoreState) -> (MessageId, String) {
        state.next_id += 1;
        let n = state.next_id;
        (MessageId::new(format!("msg-{n}")), format!("2024-01-01T00:00:00.{n:06}Z"))
    }

    /// Store an envelope directly, bypassing `send`.
    ///
    /// `sender_encrypted_content: None` plants a legacy envelope. Returns the
    /// assigned id.
    pub fn insert(
        &self,
        sender: &UserId,
        receiver: &UserId,
        encrypted_content: String,
        sender_encrypted_content: Option<String>,
    ) -> MessageId {
        let mut state = self.state();
        let (id, created_at) = Self::next_record(&mut state);
        state.envelopes.push(StoredEnvelope {
            id: id.clone(),
            sender_id: sender.clone(),
            receiver_id: receiver.clone(),
            encrypted_content,
            sender_encrypted_content,
            is_read: false,
            created_at,
        });
        id
    }

    /// Stored envelope by id.
    pub fn envelope(&self, id: &MessageId) -> Option<StoredEnvelope> {
        self.state().envelopes.iter().find(|e| &e.id == id).cloned()
    }

    /// All stored envelopes in creation order.
    pub fn envelopes(&self) -> Vec<StoredEnvelope> {
        self.state().envelopes.clone()
    }

    /// Number of successful `mark_read` calls for `id`.
    pub fn read_mark_count(&self, id: &MessageId) -> usize {
        self.state().read_marks.get(id).copied().unwrap_or(0)
    }

    /// Number of fetches served (including parked ones).
    pub fn fetch_count(&self) -> usize {
        self.state().fetch_count
    }

    /// Make fetches fail as unreachable.
    pub fn set_fetch_down(&self, down: bool) {
        self.state().fetch_down = down;
    }

    /// Make sends fail as unreachable.
    pub fn set_send_down(&self, down: bool) {
        self.state().send_down = down;
    }

    /// Make `mark_read` for `id` fail as unreachable.
    pub fn fail_mark_read(&self, id: &MessageId) {
        self.state().mark_read_down.insert(id.clone());
    }

    /// Let `mark_read` for `id` succeed again.
    pub fn heal_mark_read(&self, id: &MessageId) {
        self.state().mark_read_down.remove(id);
    }

    /// Park every subsequent fetch until released.
    #[allow(clippy::expect_used)]
    pub fn hold_fetches(&self) {
        *self.gate.lock().expect("Mutex poisoned") = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let one parked (or future) fetch through.
    #[allow(clippy::expect_used)]
    pub fn release_fetch(&self) {
        if let Some(gate) = self.gate.lock().expect("Mutex poisoned").as_ref() {
            gate.add_permits(1);
        }
    }

    /// Stop parking fetches. Fetches already parked stay parked until
    /// released.
    #[allow(clippy::expect_used)]
    pub fn open_fetches(&self) {
        *self.gate.lock().expect("Mutex poisoned") = None;
    }

    /// Wait until a fetch has started.
    pub async fn fetch_started(&self) {
        self.fetch_started.notified().await;
    }
}

#[async_trait]
impl MessageStore for SimMessageStore {
    async fn fetch_conversation(
        &self,
        peer: &UserId,
        local: &UserId,
    ) -> Result<Vec<StoredEnvelope>, ServiceError> {
        let fetched = {
            let mut state = self.state();
            if state.fetch_down {
                return Err(ServiceError::Unreachable("message store down".into()));
            }
            state.fetch_count += 1;

            let between = |e: &&StoredEnvelope| {
                (&e.sender_id == local && &e.receiver_id == peer)
                    || (&e.sender_id == peer && &e.receiver_id == local)
            };
            state.envelopes.iter().filter(between).cloned().collect()
        };

        self.fetch_started.notify_one();

        #[allow(clippy::expect_used)]
        let gate = self.gate.lock().expect("Mutex poisoned").clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| ServiceError::Unreachable("fetch gate closed".into()))?;
            permit.forget();
        }

        Ok(fetched)
    }

    async fn send(
        &self,
        sender: &UserId,
        envelope: OutgoingEnvelope,
    ) -> Result<StoredEnvelope, ServiceError> {
        let mut state = self.state();
        if state.send_down {
            return Err(ServiceError::Unreachable("message store down".into()));
        }

        let (id, created_at) = Self::next_record(&mut state);
        let stored = StoredEnvelope {
            id,
            sender_id: sender.clone(),
            receiver_id: envelope.receiver_id,
            encrypted_content: envelope.encrypted_content,
            sender_encrypted_content: Some(envelope.sender_encrypted_content),
            is_read: false,
            created_at,
        };
        state.envelopes.push(stored.clone());
        Ok(stored)
    }

    async fn mark_read(&self, message_id: &MessageId) -> Result<(), ServiceError> {
        let mut state = self.state();
        if state.mark_read_down.contains(message_id) {
            return Err(ServiceError::Unreachable("message store down".into()));
        }

        let Some(envelope) = state.envelopes.iter_mut().find(|e| &e.id == message_id) else {
            return Err(ServiceError::Rejected {
                status: 404,
                reason: "message not found".into(),
            });
        };
        envelope.is_read = true;
        *state.read_marks.entry(message_id.clone()).or_insert(0) += 1;
        Ok(())
    }
}
