//! Interleaving tests: ticks in flight while the selection changes or a
//! send completes
//!
//! The simulated store parks fetches on demand, so each test can pin the
//! exact interleaving it exercises.

use sealpost_client::{ConversationSynchronizer, Session, SyncConfig, SyncPhase};
use sealpost_core::{MemoryStore, PublicKey};
use sealpost_harness::{Party, SimCrypto, SimMessageStore, World};

type Synchronizer = ConversationSynchronizer<MemoryStore, SimCrypto, SimMessageStore>;

fn sync_for(world: &World, party: &Party) -> Synchronizer {
    let session = Session::sign_in(
        MemoryStore::new(),
        party.user.clone(),
        Some(party.private_key.clone()),
    )
    .unwrap();
    ConversationSynchronizer::new(
        session,
        world.crypto.clone(),
        world.store.clone(),
        SyncConfig::default(),
    )
}

fn contents(sync: &Synchronizer) -> Vec<String> {
    sync.snapshot().messages().iter().map(|m| m.content.to_string()).collect()
}

fn public_key(party: &Party) -> PublicKey {
    party.user.public_key.clone().unwrap()
}

#[tokio::test]
async fn tick_outliving_its_selection_is_discarded() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;
    let carol = world.register("carol").await;

    let unread = world.store.insert(
        &bob.user.id,
        &alice.user.id,
        world.crypto.ciphertext_for("for alice", &public_key(&alice)),
        None,
    );

    let alice_sync = sync_for(&world, &alice);
    alice_sync.select_peer(bob.user.clone());

    world.store.hold_fetches();
    let tick = tokio::spawn({
        let sync = alice_sync.clone();
        async move { sync.poll_once().await }
    });
    world.store.fetch_started().await;

    alice_sync.select_peer(carol.user.clone());
    world.store.release_fetch();
    let report = tick.await.unwrap().unwrap();

    // ORACLE: bob's batch never reaches carol's view and nothing is
    // acknowledged on its behalf
    assert!(!report.published);
    let view = alice_sync.snapshot();
    assert_eq!(view.peer().unwrap().id, carol.user.id);
    assert!(view.messages().is_empty());
    assert_eq!(view.phase(), SyncPhase::Loading);
    assert_eq!(world.store.read_mark_count(&unread), 0);
}

#[tokio::test]
async fn tick_outliving_deselect_is_discarded() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;

    let alice_sync = sync_for(&world, &alice);
    alice_sync.select_peer(bob.user.clone());
    alice_sync.send("before").await.unwrap();

    world.store.hold_fetches();
    let tick = tokio::spawn({
        let sync = alice_sync.clone();
        async move { sync.poll_once().await }
    });
    world.store.fetch_started().await;

    alice_sync.deselect();
    world.store.release_fetch();
    let report = tick.await.unwrap().unwrap();

    // ORACLE: the view stays idle
    assert!(!report.published);
    assert_eq!(alice_sync.snapshot().phase(), SyncPhase::Idle);
    assert!(alice_sync.snapshot().messages().is_empty());
}

#[tokio::test]
async fn optimistic_send_survives_tick_that_missed_it() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;

    let alice_sync = sync_for(&world, &alice);
    alice_sync.select_peer(bob.user.clone());
    alice_sync.poll_once().await.unwrap();

    // Tick fetches before the send lands server-side
    world.store.hold_fetches();
    let tick = tokio::spawn({
        let sync = alice_sync.clone();
        async move { sync.poll_once().await }
    });
    world.store.fetch_started().await;

    let sent = alice_sync.send("racing").await.unwrap();
    assert_eq!(contents(&alice_sync), vec!["racing"]);

    world.store.release_fetch();
    let report = tick.await.unwrap().unwrap();

    // ORACLE: the stale batch did not erase the local send
    assert!(report.published);
    assert_eq!(report.resolved, 0);
    assert_eq!(contents(&alice_sync), vec!["racing"]);
    assert_eq!(alice_sync.snapshot().unconfirmed().len(), 1);

    world.store.open_fetches();
    alice_sync.poll_once().await.unwrap();

    // ORACLE: once fetched, the server copy replaces the local one exactly once
    let view = alice_sync.snapshot();
    assert_eq!(contents(&alice_sync), vec!["racing"]);
    assert!(view.unconfirmed().is_empty());
    assert_eq!(view.messages()[0].id, sent.id);
}

#[tokio::test]
async fn unconfirmed_sends_follow_fetched_messages() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;

    let alice_sync = sync_for(&world, &alice);
    alice_sync.select_peer(bob.user.clone());

    world.store.hold_fetches();
    let tick = tokio::spawn({
        let sync = alice_sync.clone();
        async move { sync.poll_once().await }
    });
    world.store.fetch_started().await;

    // Arrives after the fetch snapshot, so the tick will not contain it
    world.store.insert(
        &bob.user.id,
        &alice.user.id,
        world.crypto.ciphertext_for("late", &public_key(&alice)),
        None,
    );
    alice_sync.send("mine").await.unwrap();
    world.store.release_fetch();
    tick.await.unwrap().unwrap();
    assert_eq!(contents(&alice_sync), vec!["mine"]);

    world.store.open_fetches();
    alice_sync.poll_once().await.unwrap();

    // ORACLE: after confirmation the order is creation order
    assert_eq!(contents(&alice_sync), vec!["late", "mine"]);
}
