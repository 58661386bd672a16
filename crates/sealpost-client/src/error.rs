//! Synchronizer error types.

use sealpost_core::{CodecError, ServiceError, StorageError};
use thiserror::Error;

/// Why a send was refused before any network activity.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    /// No conversation is selected.
    #[error("no peer selected")]
    NoPeerSelected,

    /// The selected peer has no public key and cannot be messaged.
    #[error("peer has no public key")]
    PeerKeyMissing,

    /// The local user has no public key, so no sender-side copy can be made.
    #[error("local user has no public key")]
    SenderKeyMissing,

    /// The message body is empty after trimming.
    #[error("message is empty")]
    EmptyMessage,
}

/// Errors surfaced by the conversation synchronizer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No private key on file for the local user.
    ///
    /// A normal state (e.g. between logout and key provisioning). Ticks
    /// abort silently and leave the view unchanged.
    #[error("no private key on file")]
    KeyUnavailable,

    /// The encryption service could not complete an operation.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Fetch, send or mark-read failed in transit.
    #[error("transport failure: {0}")]
    Transport(#[from] ServiceError),

    /// Local storage failed.
    #[error("local storage failure: {0}")]
    Storage(#[from] StorageError),

    /// Send refused before any network activity.
    #[error("send rejected: {0}")]
    SendRejected(#[from] SendRejection),
}

impl SyncError {
    /// Returns true for outcomes that are silent by design.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::KeyUnavailable)
    }

    /// Returns true if the next tick (or a retried send) may succeed without
    /// any change on the caller's side.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_transient(),
            Self::Codec(CodecError::EncryptionUnavailable { .. }) | Self::Storage(_) => true,
            Self::KeyUnavailable
            | Self::Codec(CodecError::DecryptionFailed { .. })
            | Self::SendRejected(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_key_absence_is_silent() {
        assert!(SyncError::KeyUnavailable.is_silent());
        assert!(!SyncError::SendRejected(SendRejection::EmptyMessage).is_silent());
        assert!(!SyncError::Transport(ServiceError::Unreachable("down".into())).is_silent());
    }

    #[test]
    fn transience_follows_the_underlying_failure() {
        assert!(SyncError::Transport(ServiceError::Unreachable("down".into())).is_transient());
        assert!(
            !SyncError::Transport(ServiceError::Rejected { status: 404, reason: "gone".into() })
                .is_transient()
        );
        assert!(!SyncError::SendRejected(SendRejection::PeerKeyMissing).is_transient());
    }
}
