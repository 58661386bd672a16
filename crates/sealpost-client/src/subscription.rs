//! Cancellable poll task bound to one peer selection.

use std::sync::Arc;

use sealpost_core::{EncryptionService, LocalStore, MessageStore, env::Environment};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::{conversation::Conversation, synchronizer::ConversationSynchronizer};

/// Handle to the poll loop of one (user, peer) selection.
///
/// The loop ticks immediately, then once per poll interval. It stops when
/// the subscription is cancelled or dropped, or when the selection it was
/// started for is replaced. Cancelling does not abort a tick already in
/// flight; that tick's result is discarded because the selection generation
/// has moved on.
pub struct Subscription {
    generation: u64,
    cancel: watch::Sender<bool>,
    view: Arc<watch::Sender<Conversation>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn spawn<S, C, M, E>(
        sync: ConversationSynchronizer<S, C, M>,
        env: E,
        generation: u64,
        view: Arc<watch::Sender<Conversation>>,
    ) -> Self
    where
        S: LocalStore,
        C: EncryptionService + 'static,
        M: MessageStore + 'static,
        E: Environment,
    {
        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(run(sync, env, generation, cancelled));

        Self { generation, cancel, view, task: Some(task) }
    }

    /// Selection generation this subscription polls.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Stop scheduling ticks and return the view to idle if this
    /// subscription's selection is still current.
    ///
    /// Idempotent.
    pub fn cancel(&self) {
        if self.cancel.send_replace(true) {
            return;
        }
        let generation = self.generation;
        if self.view.send_if_modified(|c| c.deselect_if(generation)) {
            debug!(generation, "subscription cancelled, view idle");
        }
    }

    /// Wait for the poll loop to exit.
    ///
    /// Resolves once the subscription was cancelled (and any tick in flight
    /// finished) or its selection was replaced.
    pub async fn stopped(mut self) {
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "poll task ended abnormally");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run<S, C, M, E>(
    sync: ConversationSynchronizer<S, C, M>,
    env: E,
    generation: u64,
    mut cancelled: watch::Receiver<bool>,
) where
    S: LocalStore,
    C: EncryptionService + 'static,
    M: MessageStore + 'static,
    E: Environment,
{
    let interval = sync.config().poll_interval;

    loop {
        if *cancelled.borrow() || sync.generation() != generation {
            break;
        }

        let started = env.now();
        match sync.tick(Some(generation)).await {
            Ok(report) => {
                debug!(generation, ?report, elapsed = ?(env.now() - started), "poll tick");
            },
            Err(e) if e.is_silent() => debug!(generation, error = %e, "poll tick skipped"),
            Err(e) => warn!(generation, error = %e, "poll tick failed"),
        }

        tokio::select! {
            () = env.sleep(interval) => {},
            _ = cancelled.changed() => {},
        }
    }

    debug!(generation, "poll loop stopped");
}
