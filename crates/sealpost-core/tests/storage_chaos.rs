//! Chaos and isolation property tests for local storage consumers
//!
//! These tests drive `KeyCustodian` and `PlaintextCache` over
//! `ChaoticStore` and check that:
//! - Key custody never reports success for a write that did not land
//! - The plaintext cache keeps every entry in memory regardless of flush
//!   failures, and durable state only ever contains entries that were
//!   recorded
//! - Entries already in the durable record survive failed loads and flushes
//! - Entries recorded under one user are never visible under another

use std::collections::HashMap;

use proptest::prelude::*;
use sealpost_core::{
    ChaoticStore, KeyCustodian, LocalStore, MemoryStore, PlaintextCache, PrivateKey, RedbStore,
    StorageError, UserId,
};
use tempfile::tempdir;

#[test]
fn prop_custodian_reports_every_failed_write() {
    proptest!(|(
        failure_rate in 0.0..0.9,
        seed in any::<u64>(),
        writes in 1usize..40,
    )| {
        let store = ChaoticStore::with_seed(MemoryStore::new(), failure_rate, seed);
        let custodian = KeyCustodian::new(store.clone());
        let user = UserId::from("alice");

        let mut last_ok: Option<String> = None;
        for i in 0..writes {
            let pem = format!("pem-{i}");
            match custodian.save(&user, &PrivateKey::new(pem.clone())) {
                Ok(()) => last_ok = Some(pem),
                Err(StorageError::Io(_)) => {},
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }

        // ORACLE: the durable record is exactly the last write that reported
        // success
        let inner = KeyCustodian::new(store.inner().clone());
        let stored = inner.get(&user).unwrap().map(|k| k.expose().to_string());
        prop_assert_eq!(stored, last_ok);
    });
}

#[test]
fn prop_cache_memory_is_authoritative_under_chaos() {
    proptest!(|(
        failure_rate in 0.0..0.9,
        seed in any::<u64>(),
        entries in prop::collection::vec("[a-z]{1,12}", 1..30),
    )| {
        let store = ChaoticStore::with_seed(MemoryStore::new(), failure_rate, seed);
        let cache = PlaintextCache::new(store.clone());
        let user = UserId::from("alice");
        cache.load(&user);

        for (i, text) in entries.iter().enumerate() {
            let _ = cache.record(&user, format!("m{i}").as_str().into(), text.clone());
        }

        // ORACLE: every entry is readable for the current session
        for (i, text) in entries.iter().enumerate() {
            let id = format!("m{i}");
            prop_assert_eq!(cache.get(&user, &id.as_str().into()), Some(text.clone()));
        }

        // ORACLE: durable state only holds entries that were recorded
        if let Some(json) = store.inner().get("sent_messages_alice").unwrap() {
            let durable: HashMap<String, String> = serde_json::from_str(&json).unwrap();
            for (id, text) in &durable {
                let i: usize = id.trim_start_matches('m').parse().unwrap();
                prop_assert_eq!(&entries[i], text);
            }
        }
    });
}

#[test]
fn prop_cache_never_drops_durable_entries_under_chaos() {
    proptest!(|(
        failure_rate in 0.0..0.9,
        seed in any::<u64>(),
        legacy in prop::collection::hash_map("l[0-9]{1,3}", "[a-z]{1,12}", 1..8),
        entries in prop::collection::vec("[a-z]{1,12}", 1..20),
    )| {
        let inner = MemoryStore::new();
        inner.put("sent_messages_alice", &serde_json::to_string(&legacy).unwrap()).unwrap();
        let store = ChaoticStore::with_seed(inner.clone(), failure_rate, seed);
        let cache = PlaintextCache::new(store);
        let user = UserId::from("alice");
        cache.load(&user);

        for (i, text) in entries.iter().enumerate() {
            let _ = cache.record(&user, format!("m{i}").as_str().into(), text.clone());
        }

        // ORACLE: whatever failed, every legacy entry is still durable
        let json = inner.get("sent_messages_alice").unwrap().unwrap();
        let durable: HashMap<String, String> = serde_json::from_str(&json).unwrap();
        for (id, text) in &legacy {
            prop_assert_eq!(durable.get(id), Some(text));
        }
    });
}

#[test]
fn prop_no_cross_user_cache_leakage() {
    proptest!(|(
        alice_entries in prop::collection::vec(("[a-z0-9]{1,6}", "[a-z ]{0,16}"), 0..20),
        bob_entries in prop::collection::vec(("[a-z0-9]{1,6}", "[a-z ]{0,16}"), 0..20),
    )| {
        let store = MemoryStore::new();
        let cache = PlaintextCache::new(store.clone());
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        cache.load(&alice);
        for (id, text) in &alice_entries {
            cache.record(&alice, id.as_str().into(), text.clone()).unwrap();
        }

        cache.load(&bob);
        for (id, text) in &bob_entries {
            cache.record(&bob, id.as_str().into(), text.clone()).unwrap();
        }

        let bob_ids: HashMap<&str, &str> =
            bob_entries.iter().map(|(id, text)| (id.as_str(), text.as_str())).collect();

        // ORACLE: bob's scope only exposes bob's entries
        for (id, _) in &alice_entries {
            let seen = cache.get(&bob, &id.as_str().into());
            prop_assert_eq!(seen.as_deref(), bob_ids.get(id.as_str()).copied());
        }

        // ORACLE: a fresh cache over the same profile keeps the scopes apart
        let fresh = PlaintextCache::new(store);
        fresh.load(&alice);
        for (id, _) in &bob_entries {
            if !alice_entries.iter().any(|(a, _)| a == id) {
                prop_assert_eq!(fresh.get(&alice, &id.as_str().into()), None);
            }
        }
    });
}

#[test]
fn cache_survives_profile_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profile.redb");
    let alice = UserId::from("alice");

    {
        let cache = PlaintextCache::new(RedbStore::open(&path).unwrap());
        cache.load(&alice);
        cache.record(&alice, "m1".into(), "hello".into()).unwrap();
    }

    let cache = PlaintextCache::new(RedbStore::open(&path).unwrap());
    cache.load(&alice);

    assert_eq!(cache.get(&alice, &"m1".into()).as_deref(), Some("hello"));
}

#[test]
fn key_survives_profile_reopen_until_removed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profile.redb");
    let alice = UserId::from("alice");

    {
        let custodian = KeyCustodian::new(RedbStore::open(&path).unwrap());
        custodian.save(&alice, &PrivateKey::new("pem-a")).unwrap();
    }

    let custodian = KeyCustodian::new(RedbStore::open(&path).unwrap());
    assert_eq!(custodian.get(&alice).unwrap().unwrap().expose(), "pem-a");

    custodian.remove(&alice).unwrap();
    assert_eq!(custodian.get(&alice).unwrap(), None);
}
