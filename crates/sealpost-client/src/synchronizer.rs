//! Conversation synchronizer.
//!
//! Drives one conversation between the session user and a selected peer:
//! each tick fetches the full envelope list, resolves every envelope to
//! plaintext or a placeholder, publishes the result wholesale, and
//! acknowledges messages addressed to the local user. Sends seal the body
//! for both parties, submit it, remember the plaintext, and append the
//! message to the view without waiting for the next tick.
//!
//! # Resolution
//!
//! | Envelope                | Content                                      |
//! |-------------------------|----------------------------------------------|
//! | received                | decrypt receiver ciphertext (never cached)   |
//! | sent, cached            | cached plaintext, no decryption              |
//! | sent with mirror        | decrypt mirror ciphertext                    |
//! | sent without mirror     | `[Encrypted]`                                |
//!
//! A failed decryption degrades only that message to `[Failed to decrypt]`.

use std::sync::Arc;

use futures::future::join_all;
use sealpost_core::{
    EncryptionService, Envelope, EnvelopeCodec, LocalStore, MessageContent, MessageId,
    MessageStore, PrivateKey, ResolvedMessage, StoredEnvelope, User, UserId,
    env::Environment,
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    config::SyncConfig,
    conversation::{Conversation, TickTicket},
    error::{SendRejection, SyncError},
    session::Session,
    subscription::Subscription,
};

/// Outcome of one poll tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Messages resolved in this tick.
    pub resolved: usize,
    /// Read receipts acknowledged by the store.
    pub marked_read: usize,
    /// Read receipts that failed and will be retried by a later tick.
    pub read_failures: usize,
    /// Whether the batch was published. `false` when no peer was selected or
    /// the selection changed while the tick was in flight.
    pub published: bool,
}

struct Inner<S: LocalStore, C, M> {
    session: Session<S>,
    codec: EnvelopeCodec<C>,
    messages: M,
    config: SyncConfig,
    view: Arc<watch::Sender<Conversation>>,
}

/// Conversation synchronizer for one session.
///
/// Cheap to clone; clones drive the same view.
pub struct ConversationSynchronizer<S: LocalStore, C, M> {
    inner: Arc<Inner<S, C, M>>,
}

impl<S: LocalStore, C, M> Clone for ConversationSynchronizer<S, C, M> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S, C, M> ConversationSynchronizer<S, C, M>
where
    S: LocalStore,
    C: EncryptionService + 'static,
    M: MessageStore + 'static,
{
    /// Create an idle synchronizer.
    pub fn new(session: Session<S>, encryption: C, messages: M, config: SyncConfig) -> Self {
        let (view, _) = watch::channel(Conversation::new());
        Self {
            inner: Arc::new(Inner {
                session,
                codec: EnvelopeCodec::new(encryption),
                messages,
                config,
                view: Arc::new(view),
            }),
        }
    }

    /// Session this synchronizer acts for.
    pub fn session(&self) -> &Session<S> {
        &self.inner.session
    }

    /// Active configuration.
    pub fn config(&self) -> SyncConfig {
        self.inner.config
    }

    /// Receiver for the published view. Changes on every transition.
    pub fn view(&self) -> watch::Receiver<Conversation> {
        self.inner.view.subscribe()
    }

    /// Copy of the current view.
    pub fn snapshot(&self) -> Conversation {
        self.inner.view.borrow().clone()
    }

    /// Current selection generation.
    pub fn generation(&self) -> u64 {
        self.inner.view.borrow().generation()
    }

    fn user_id(&self) -> &UserId {
        self.inner.session.user_id()
    }

    /// Select `peer`. Returns the new selection generation.
    ///
    /// The previous view is cleared; nothing is fetched until the next tick.
    pub fn select_peer(&self, peer: User) -> u64 {
        self.inner.session.cache().ensure_loaded(self.user_id());

        debug!(user = %self.user_id(), peer = %peer.id, "peer selected");
        let mut generation = 0;
        self.inner.view.send_modify(|c| generation = c.select(peer));
        generation
    }

    /// Drop the selection. In-flight ticks will be discarded on arrival.
    pub fn deselect(&self) {
        debug!(user = %self.user_id(), "peer deselected");
        self.inner.view.send_modify(Conversation::deselect);
    }

    /// Poll the selected conversation once.
    ///
    /// # Errors
    ///
    /// - `KeyUnavailable` if no private key is on file. The view is left
    ///   untouched; callers treat this as silent (see
    ///   [`SyncError::is_silent`]).
    /// - `Transport` if the fetch failed. The previous batch stays published.
    /// - `Storage` if the key record could not be read.
    pub async fn poll_once(&self) -> Result<TickReport, SyncError> {
        self.tick(None).await
    }

    /// Run one tick, optionally only if `expected` is still the current
    /// generation.
    pub(crate) async fn tick(&self, expected: Option<u64>) -> Result<TickReport, SyncError> {
        let user_id = self.user_id().clone();

        let Some((ticket, peer_id)) = self.current_ticket(expected) else {
            return Ok(TickReport::default());
        };

        let Some(key) = self.inner.session.private_key()? else {
            debug!(user = %user_id, "no private key on file, skipping tick");
            return Err(SyncError::KeyUnavailable);
        };

        debug!(user = %user_id, peer = %peer_id, generation = ticket.generation(), "tick started");
        self.inner.view.send_if_modified(|c| c.begin_tick(ticket));

        let fetched = match self.inner.messages.fetch_conversation(&peer_id, &user_id).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(
                    user = %user_id,
                    peer = %peer_id,
                    error = %e,
                    "fetch failed, keeping previous view"
                );
                self.inner.view.send_if_modified(|c| c.abort_tick(ticket));
                return Err(SyncError::Transport(e));
            },
        };

        let unread: Vec<MessageId> = fetched
            .iter()
            .filter(|e| e.awaits_read_receipt(&user_id))
            .map(|e| e.id.clone())
            .collect();

        let resolved = self.resolve_batch(fetched, &user_id, &key).await;
        let count = resolved.len();

        let published = self.inner.view.send_if_modified(|c| c.publish(ticket, resolved));
        if !published {
            debug!(
                user = %user_id,
                peer = %peer_id,
                "selection changed during tick, result discarded"
            );
            return Ok(TickReport { resolved: count, ..TickReport::default() });
        }

        let (marked_read, read_failures) = self.mark_read(&unread).await;

        debug!(
            user = %user_id,
            peer = %peer_id,
            resolved = count,
            marked_read,
            read_failures,
            "tick finished"
        );

        Ok(TickReport { resolved: count, marked_read, read_failures, published: true })
    }

    fn current_ticket(&self, expected: Option<u64>) -> Option<(TickTicket, UserId)> {
        let view = self.inner.view.borrow();
        let ticket = view.ticket()?;
        if expected.is_some_and(|g| g != ticket.generation()) {
            return None;
        }
        let peer_id = view.peer()?.id.clone();
        Some((ticket, peer_id))
    }

    async fn resolve_batch(
        &self,
        fetched: Vec<StoredEnvelope>,
        user_id: &UserId,
        key: &PrivateKey,
    ) -> Vec<ResolvedMessage> {
        let envelopes = fetched.into_iter().filter_map(|stored| {
            let id = stored.id.clone();
            let classified = stored.classify(user_id);
            if classified.is_none() {
                warn!(user = %user_id, message = %id, "envelope involves neither party, dropped");
            }
            classified
        });

        join_all(envelopes.map(|envelope| self.resolve(envelope, user_id, key))).await
    }

    async fn resolve(
        &self,
        envelope: Envelope,
        user_id: &UserId,
        key: &PrivateKey,
    ) -> ResolvedMessage {
        let cache = self.inner.session.cache();

        let (meta, content) = match envelope {
            Envelope::Received { meta, ciphertext } => {
                let content = self.decrypt(&meta.id, &ciphertext, key).await;
                (meta, content)
            },
            Envelope::SentWithMirror { meta, mirror } => match cache.get(user_id, &meta.id) {
                Some(text) => (meta, MessageContent::Plaintext(text)),
                None => {
                    let content = self.decrypt(&meta.id, &mirror, key).await;
                    (meta, content)
                },
            },
            Envelope::SentLegacy { meta } => match cache.get(user_id, &meta.id) {
                Some(text) => (meta, MessageContent::Plaintext(text)),
                None => (meta, MessageContent::StillEncrypted),
            },
        };

        ResolvedMessage::new(meta, content)
    }

    async fn decrypt(&self, id: &MessageId, ciphertext: &str, key: &PrivateKey) -> MessageContent {
        match self.inner.codec.decrypt_with(ciphertext, key).await {
            Ok(text) => MessageContent::Plaintext(text),
            Err(e) => {
                warn!(message = %id, error = %e, "message could not be decrypted");
                MessageContent::FailedToDecrypt
            },
        }
    }

    async fn mark_read(&self, ids: &[MessageId]) -> (usize, usize) {
        let results = join_all(ids.iter().map(|id| self.inner.messages.mark_read(id))).await;

        let mut marked = 0;
        let mut failed = 0;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => marked += 1,
                Err(e) => {
                    warn!(message = %id, error = %e, "read receipt failed, next tick retries");
                    failed += 1;
                },
            }
        }
        (marked, failed)
    }

    /// Send `body` to the selected peer.
    ///
    /// The body is checked (non-empty after trimming) but sent as typed. On
    /// success the message is already in the view when this returns. On
    /// failure nothing was transmitted or cached and the caller still holds
    /// the body for a retry.
    ///
    /// # Errors
    ///
    /// - `SendRejected` before any network activity
    /// - `Codec(EncryptionUnavailable)` if either ciphertext could not be
    ///   produced
    /// - `Transport` if the store refused or was unreachable
    pub async fn send(&self, body: &str) -> Result<ResolvedMessage, SyncError> {
        let (generation, peer) = {
            let view = self.inner.view.borrow();
            let peer = view.peer().cloned().ok_or(SendRejection::NoPeerSelected)?;
            (view.generation(), peer)
        };

        if body.trim().is_empty() {
            return Err(SendRejection::EmptyMessage.into());
        }
        let peer_key = peer.public_key.as_ref().ok_or(SendRejection::PeerKeyMissing)?;
        let own_key =
            self.inner.session.user().public_key.as_ref().ok_or(SendRejection::SenderKeyMissing)?;

        let user_id = self.user_id();

        let sealed = self.inner.codec.seal(body, peer_key, own_key).await.inspect_err(|e| {
            warn!(user = %user_id, peer = %peer.id, error = %e, "send aborted, encryption failed");
        })?;

        let stored = self
            .inner
            .messages
            .send(user_id, sealed.into_outgoing(peer.id.clone()))
            .await
            .inspect_err(|e| {
                warn!(user = %user_id, peer = %peer.id, error = %e, "send failed");
            })?;

        if let Err(e) =
            self.inner.session.cache().record(user_id, stored.id.clone(), body.to_string())
        {
            warn!(
                user = %user_id,
                message = %stored.id,
                error = %e,
                "plaintext cache flush failed"
            );
        }

        let message =
            ResolvedMessage::new(stored.meta(), MessageContent::Plaintext(body.to_string()));
        let appended =
            self.inner.view.send_if_modified(|c| c.append_local(generation, message.clone()));

        debug!(user = %user_id, message = %message.id, len = body.len(), appended, "message sent");
        Ok(message)
    }

    /// Select `peer` and poll it every `poll_interval` until the returned
    /// subscription is cancelled or the selection changes.
    ///
    /// Must be called within a tokio runtime.
    pub fn start<E: Environment>(&self, env: E, peer: User) -> Subscription {
        let generation = self.select_peer(peer);
        Subscription::spawn(self.clone(), env, generation, Arc::clone(&self.inner.view))
    }
}
