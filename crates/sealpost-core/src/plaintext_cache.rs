//! Plaintext cache for outgoing messages.
//!
//! Remembers the plaintext of every message the local user composed in this
//! profile, keyed by the id the message store assigned. Resolution consults
//! it before decrypting the sender-side mirror, and it is the only way to
//! read back legacy messages that were sent without a mirror.
//!
//! The cache is scoped to one user at a time. Entries written under one user
//! are never visible through another user's scope.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, warn};

use crate::{
    storage::{LocalStore, StorageError},
    types::{MessageId, UserId},
};

/// Storage key prefix for cache records.
const CACHE_PREFIX: &str = "sent_messages_";

/// In-memory entries and the user they belong to.
#[derive(Default)]
struct CacheState {
    owner: Option<UserId>,
    entries: HashMap<MessageId, String>,
    /// The owner's durable record could not be read on load. It may still
    /// hold entries, so it must be merged before it is overwritten.
    durable_unknown: bool,
}

/// Per-user durable map from message id to plaintext.
///
/// Write-through: [`PlaintextCache::record`] updates memory and then flushes
/// to the local store. The in-memory state stays authoritative for the
/// current session even when a flush fails.
///
/// # Invariants
///
/// - Entries exist only for messages the owner sent from this profile
/// - `get` for a user other than the loaded owner returns `None`
/// - A flush never drops a durable entry it could not read first
pub struct PlaintextCache<S: LocalStore> {
    store: S,
    state: Mutex<CacheState>,
}

impl<S: LocalStore> PlaintextCache<S> {
    /// Create an empty cache with no owner.
    pub fn new(store: S) -> Self {
        Self { store, state: Mutex::new(CacheState::default()) }
    }

    fn record_key(user_id: &UserId) -> String {
        format!("{CACHE_PREFIX}{user_id}")
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the in-memory cache with what is durably stored for
    /// `user_id`.
    ///
    /// Absent, unreadable, or corrupt storage yields an empty cache. An
    /// unreadable record is left in place and merged on the next
    /// [`flush`](Self::flush).
    pub fn load(&self, user_id: &UserId) {
        let mut state = self.state();

        let (entries, durable_unknown) = match self.read_durable(user_id) {
            Ok(entries) => (entries, false),
            Err(e) => {
                warn!(user = %user_id, error = %e, "plaintext cache unreadable, starting empty");
                (HashMap::new(), true)
            },
        };
        debug!(user = %user_id, entries = entries.len(), "plaintext cache loaded");

        state.owner = Some(user_id.clone());
        state.entries = entries;
        state.durable_unknown = durable_unknown;
    }

    /// Load `user_id`'s cache unless it is already the loaded owner.
    ///
    /// Returns `true` if a load happened.
    pub fn ensure_loaded(&self, user_id: &UserId) -> bool {
        if self.owner().as_ref() == Some(user_id) {
            return false;
        }
        self.load(user_id);
        true
    }

    /// Durable entries for `user_id`.
    ///
    /// Absent and corrupt records read as empty. Only I/O errors are
    /// returned.
    fn read_durable(&self, user_id: &UserId) -> Result<HashMap<MessageId, String>, StorageError> {
        let key = Self::record_key(user_id);

        let json = match self.store.get(&key) {
            Ok(Some(json)) => json,
            Ok(None) => return Ok(HashMap::new()),
            Err(e) if e.is_corruption() => {
                warn!(user = %user_id, error = %e, "plaintext cache corrupt, starting empty");
                return Ok(HashMap::new());
            },
            Err(e) => return Err(e),
        };

        Ok(serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!(user = %user_id, error = %e, "plaintext cache corrupt, starting empty");
            HashMap::new()
        }))
    }

    /// User whose entries are currently loaded. `None` before the first load.
    pub fn owner(&self) -> Option<UserId> {
        self.state().owner.clone()
    }

    /// Number of entries currently loaded.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    /// Whether no entries are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plaintext remembered for `message_id` under `user_id`'s scope.
    pub fn get(&self, user_id: &UserId, message_id: &MessageId) -> Option<String> {
        let state = self.state();
        if state.owner.as_ref() != Some(user_id) {
            return None;
        }
        state.entries.get(message_id).cloned()
    }

    /// Remember `plaintext` for `message_id` in memory.
    ///
    /// Switches scope to `user_id` first if another user is loaded. Call
    /// [`PlaintextCache::flush`] to persist.
    pub fn put(&self, user_id: &UserId, message_id: MessageId, plaintext: String) {
        self.ensure_loaded(user_id);

        let mut state = self.state();
        // Scope may have changed between ensure_loaded and here.
        if state.owner.as_ref() == Some(user_id) {
            state.entries.insert(message_id, plaintext);
        }
    }

    /// Persist `user_id`'s in-memory entries.
    ///
    /// A no-op if `user_id` is not the loaded owner. On failure the in-memory
    /// entries are kept.
    ///
    /// If the durable record was unreadable at load, it is read again and
    /// its entries are merged under the in-memory ones first. While it stays
    /// unreadable nothing is written and the read error is returned.
    ///
    /// The state lock is held through the write, so concurrent flushes land
    /// in lock order and the last write carries every entry.
    pub fn flush(&self, user_id: &UserId) -> Result<(), StorageError> {
        let key = Self::record_key(user_id);

        let mut state = self.state();
        if state.owner.as_ref() != Some(user_id) {
            return Ok(());
        }

        if state.durable_unknown {
            let durable = self.read_durable(user_id)?;
            debug!(
                user = %user_id,
                entries = durable.len(),
                "plaintext cache merged durable record"
            );
            for (message_id, plaintext) in durable {
                state.entries.entry(message_id).or_insert(plaintext);
            }
            state.durable_unknown = false;
        }

        let snapshot: BTreeMap<&MessageId, &String> = state.entries.iter().collect();
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| StorageError::Corrupt { key: key.clone(), reason: e.to_string() })?;

        self.store.put(&key, &json)
    }

    /// Write-through insert: [`put`](Self::put) followed by
    /// [`flush`](Self::flush).
    ///
    /// A flush failure is returned but the in-memory entry stays.
    pub fn record(
        &self,
        user_id: &UserId,
        message_id: MessageId,
        plaintext: String,
    ) -> Result<(), StorageError> {
        self.put(user_id, message_id, plaintext);
        self.flush(user_id)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc, Barrier,
            atomic::{AtomicBool, AtomicUsize, Ordering},
            mpsc,
        },
        thread,
        time::Duration,
    };

    use super::*;
    use crate::{ChaoticStore, MemoryStore};

    /// Fails the first `failures` reads, then delegates.
    #[derive(Clone)]
    struct FailingReads {
        inner: MemoryStore,
        remaining: Arc<AtomicUsize>,
    }

    impl FailingReads {
        fn new(inner: MemoryStore, failures: usize) -> Self {
            Self { inner, remaining: Arc::new(AtomicUsize::new(failures)) }
        }
    }

    impl LocalStore for FailingReads {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            let failed = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if failed.is_ok() {
                return Err(StorageError::Io("injected read failure".into()));
            }
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.put(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    /// Parks the first write between two barriers.
    #[derive(Clone)]
    struct GatedFirstWrite {
        inner: MemoryStore,
        armed: Arc<AtomicBool>,
        entered: Arc<Barrier>,
        release: Arc<Barrier>,
    }

    impl LocalStore for GatedFirstWrite {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.wait();
                self.release.wait();
            }
            self.inner.put(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    fn durable(store: &MemoryStore, key: &str) -> HashMap<String, String> {
        let json = store.get(key).unwrap().unwrap();
        serde_json::from_str(&json).unwrap()
    }

    fn alice() -> UserId {
        UserId::from("alice")
    }

    fn bob() -> UserId {
        UserId::from("bob")
    }

    #[test]
    fn record_then_get() {
        let cache = PlaintextCache::new(MemoryStore::new());
        cache.load(&alice());
        cache.record(&alice(), "m1".into(), "hello".into()).unwrap();

        assert_eq!(cache.get(&alice(), &"m1".into()).as_deref(), Some("hello"));
    }

    #[test]
    fn record_persists_json_object() {
        let store = MemoryStore::new();
        let cache = PlaintextCache::new(store.clone());
        cache.load(&alice());
        cache.record(&alice(), "m1".into(), "hello".into()).unwrap();

        let json = store.get("sent_messages_alice").unwrap().unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.get("m1").map(String::as_str), Some("hello"));
    }

    #[test]
    fn load_restores_from_store() {
        let store = MemoryStore::new();
        store.put("sent_messages_alice", r#"{"m1":"hello","m2":"again"}"#).unwrap();

        let cache = PlaintextCache::new(store);
        cache.load(&alice());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&alice(), &"m2".into()).as_deref(), Some("again"));
    }

    #[test]
    fn corrupt_record_loads_empty() {
        let store = MemoryStore::new();
        store.put("sent_messages_alice", "{not json").unwrap();

        let cache = PlaintextCache::new(store);
        cache.load(&alice());

        assert!(cache.is_empty());
        assert_eq!(cache.owner(), Some(alice()));
    }

    #[test]
    fn unreadable_store_loads_empty() {
        let cache = PlaintextCache::new(ChaoticStore::new(MemoryStore::new(), 1.0));
        cache.load(&alice());

        assert!(cache.is_empty());
    }

    #[test]
    fn other_users_scope_is_invisible() {
        let store = MemoryStore::new();
        let cache = PlaintextCache::new(store);
        cache.load(&alice());
        cache.record(&alice(), "m1".into(), "alice secret".into()).unwrap();

        assert_eq!(cache.get(&bob(), &"m1".into()), None);

        cache.load(&bob());
        assert_eq!(cache.get(&bob(), &"m1".into()), None);
        assert_eq!(cache.get(&alice(), &"m1".into()), None);
    }

    #[test]
    fn put_switches_scope() {
        let store = MemoryStore::new();
        store.put("sent_messages_bob", r#"{"b1":"from bob"}"#).unwrap();

        let cache = PlaintextCache::new(store);
        cache.load(&alice());
        cache.put(&bob(), "b2".into(), "more".into());

        assert_eq!(cache.owner(), Some(bob()));
        assert_eq!(cache.get(&bob(), &"b1".into()).as_deref(), Some("from bob"));
        assert_eq!(cache.get(&bob(), &"b2".into()).as_deref(), Some("more"));
    }

    #[test]
    fn flush_failure_keeps_memory_entry() {
        let cache = PlaintextCache::new(ChaoticStore::new(MemoryStore::new(), 1.0));
        cache.load(&alice());

        let result = cache.record(&alice(), "m1".into(), "hello".into());

        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(cache.get(&alice(), &"m1".into()).as_deref(), Some("hello"));
    }

    #[test]
    fn ensure_loaded_does_not_discard_unflushed_entries() {
        let cache = PlaintextCache::new(MemoryStore::new());
        cache.load(&alice());
        cache.put(&alice(), "m1".into(), "unflushed".into());

        assert!(!cache.ensure_loaded(&alice()));
        assert_eq!(cache.get(&alice(), &"m1".into()).as_deref(), Some("unflushed"));
    }

    #[test]
    fn flush_for_non_owner_writes_nothing() {
        let store = MemoryStore::new();
        let cache = PlaintextCache::new(store.clone());
        cache.load(&alice());

        cache.flush(&bob()).unwrap();

        assert!(store.is_empty());
    }

    #[test]
    fn failed_load_keeps_durable_entries_on_next_record() {
        let store = MemoryStore::new();
        store.put("sent_messages_alice", r#"{"legacy-1":"only copy"}"#).unwrap();
        let cache = PlaintextCache::new(FailingReads::new(store.clone(), 1));

        cache.load(&alice());
        assert!(cache.is_empty());

        cache.record(&alice(), "new-1".into(), "fresh".into()).unwrap();

        let record = durable(&store, "sent_messages_alice");
        assert_eq!(record.get("legacy-1").map(String::as_str), Some("only copy"));
        assert_eq!(record.get("new-1").map(String::as_str), Some("fresh"));
        assert_eq!(cache.get(&alice(), &"legacy-1".into()).as_deref(), Some("only copy"));
    }

    #[test]
    fn unreadable_record_is_not_overwritten() {
        let store = MemoryStore::new();
        store.put("sent_messages_alice", r#"{"legacy-1":"only copy"}"#).unwrap();
        let cache = PlaintextCache::new(FailingReads::new(store.clone(), 2));
        cache.load(&alice());

        let result = cache.record(&alice(), "new-1".into(), "fresh".into());

        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(
            store.get("sent_messages_alice").unwrap().as_deref(),
            Some(r#"{"legacy-1":"only copy"}"#)
        );
        assert_eq!(cache.get(&alice(), &"new-1".into()).as_deref(), Some("fresh"));

        // Reads recover; the next flush merges and writes everything.
        cache.record(&alice(), "new-2".into(), "later".into()).unwrap();

        let record = durable(&store, "sent_messages_alice");
        assert_eq!(record.len(), 3);
        assert_eq!(record.get("new-1").map(String::as_str), Some("fresh"));
    }

    #[test]
    fn memory_wins_over_merged_durable_entry() {
        let store = MemoryStore::new();
        store.put("sent_messages_alice", r#"{"m1":"stale","m2":"kept"}"#).unwrap();
        let cache = PlaintextCache::new(FailingReads::new(store.clone(), 1));
        cache.load(&alice());

        cache.record(&alice(), "m1".into(), "current".into()).unwrap();

        let record = durable(&store, "sent_messages_alice");
        assert_eq!(record.get("m1").map(String::as_str), Some("current"));
        assert_eq!(record.get("m2").map(String::as_str), Some("kept"));
    }

    #[test]
    fn concurrent_records_all_reach_durable_record() {
        let store = MemoryStore::new();
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let gated = GatedFirstWrite {
            inner: store.clone(),
            armed: Arc::new(AtomicBool::new(true)),
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        };
        let cache = PlaintextCache::new(gated);
        cache.load(&alice());
        let cache = &cache;

        thread::scope(|s| {
            let first = s.spawn(move || cache.record(&alice(), "m1".into(), "one".into()));
            entered.wait();

            let (done_tx, done_rx) = mpsc::channel();
            let second = s.spawn(move || {
                let result = cache.record(&alice(), "m2".into(), "two".into());
                done_tx.send(()).unwrap();
                result
            });

            // The second record may not finish until the first write lands.
            let _ = done_rx.recv_timeout(Duration::from_millis(50));
            release.wait();

            first.join().unwrap().unwrap();
            second.join().unwrap().unwrap();
        });

        let record = durable(&store, "sent_messages_alice");
        assert_eq!(record.get("m1").map(String::as_str), Some("one"));
        assert_eq!(record.get("m2").map(String::as_str), Some("two"));
    }
}
