//! Published conversation view.
//!
//! Pure state machine, no I/O. The synchronizer owns one `Conversation`
//! inside a watch channel and mutates it only through these transitions.
//!
//! # Selection generations
//!
//! Every `select`/`deselect` bumps a generation counter. A tick captures the
//! generation when it starts ([`TickTicket`]) and may only publish while the
//! generation is unchanged, so results of a tick that outlived its peer
//! selection are discarded on arrival.
//!
//! # Unconfirmed sends
//!
//! A message sent locally is appended right away and kept in an unconfirmed
//! list. Every publish re-appends unconfirmed messages after the fetched
//! batch until a batch contains their id, at which point the fetched copy
//! replaces them.

use sealpost_core::{MessageId, ResolvedMessage, User};

/// Lifecycle phase of the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No peer selected.
    Idle,
    /// A fetch is in flight, or the first one has not completed yet.
    Loading,
    /// A resolved batch is published.
    Resolved,
}

/// Proof that a tick started under a given selection generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTicket {
    generation: u64,
}

impl TickTicket {
    /// Generation the tick started under.
    pub fn generation(self) -> u64 {
        self.generation
    }
}

/// The conversation as currently shown to the local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    phase: SyncPhase,
    generation: u64,
    peer: Option<User>,
    messages: Vec<ResolvedMessage>,
    unconfirmed: Vec<ResolvedMessage>,
    has_published: bool,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Idle view with no peer.
    pub fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            generation: 0,
            peer: None,
            messages: Vec::new(),
            unconfirmed: Vec::new(),
            has_published: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Current selection generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Selected peer.
    pub fn peer(&self) -> Option<&User> {
        self.peer.as_ref()
    }

    /// Published messages: the last fetched batch followed by unconfirmed
    /// local sends.
    pub fn messages(&self) -> &[ResolvedMessage] {
        &self.messages
    }

    /// Local sends not yet seen in a fetched batch.
    pub fn unconfirmed(&self) -> &[ResolvedMessage] {
        &self.unconfirmed
    }

    /// Switch to `peer`, dropping everything published for the previous
    /// selection. Returns the new generation.
    pub fn select(&mut self, peer: User) -> u64 {
        self.generation += 1;
        self.peer = Some(peer);
        self.messages.clear();
        self.unconfirmed.clear();
        self.has_published = false;
        self.phase = SyncPhase::Loading;
        self.generation
    }

    /// Drop the selection and return to `Idle`.
    pub fn deselect(&mut self) {
        self.generation += 1;
        self.peer = None;
        self.messages.clear();
        self.unconfirmed.clear();
        self.has_published = false;
        self.phase = SyncPhase::Idle;
    }

    /// Deselect only if `generation` is still current.
    ///
    /// Returns `true` if the view changed.
    pub fn deselect_if(&mut self, generation: u64) -> bool {
        if self.generation != generation || self.peer.is_none() {
            return false;
        }
        self.deselect();
        true
    }

    /// Ticket for a tick under the current selection. `None` when idle.
    pub fn ticket(&self) -> Option<TickTicket> {
        self.peer.as_ref().map(|_| TickTicket { generation: self.generation })
    }

    /// Whether `ticket` still matches the current selection.
    pub fn is_current(&self, ticket: TickTicket) -> bool {
        self.peer.is_some() && ticket.generation == self.generation
    }

    /// Mark a fetch as in flight. Returns `false` if `ticket` is stale.
    pub fn begin_tick(&mut self, ticket: TickTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let changed = self.phase != SyncPhase::Loading;
        self.phase = SyncPhase::Loading;
        changed
    }

    /// A tick failed; keep the previous batch. Returns `true` if the phase
    /// changed.
    pub fn abort_tick(&mut self, ticket: TickTicket) -> bool {
        if !self.is_current(ticket) || !self.has_published || self.phase == SyncPhase::Resolved {
            return false;
        }
        self.phase = SyncPhase::Resolved;
        true
    }

    /// Replace the published batch wholesale with `fetched`.
    ///
    /// Returns `false` (and changes nothing) if `ticket` is stale.
    pub fn publish(&mut self, ticket: TickTicket, fetched: Vec<ResolvedMessage>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.unconfirmed.retain(|local| !fetched.iter().any(|m| m.id == local.id));

        self.messages = fetched;
        self.messages.extend(self.unconfirmed.iter().cloned());
        self.has_published = true;
        self.phase = SyncPhase::Resolved;
        true
    }

    /// Append a message the local user just sent under `generation`.
    ///
    /// Returns `false` if the selection changed since the send started or
    /// the message is already shown.
    pub fn append_local(&mut self, generation: u64, message: ResolvedMessage) -> bool {
        if self.peer.is_none() || generation != self.generation || self.contains(&message.id) {
            return false;
        }
        self.unconfirmed.push(message.clone());
        self.messages.push(message);
        true
    }

    fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }
}
