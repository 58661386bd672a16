//! Error types for collaborator calls and the envelope codec.
//!
//! [`ServiceError`] describes why a call to an external collaborator did not
//! complete. [`CodecError`] narrows that down to the two outcomes the
//! synchronizer reacts to differently: a send must abort on
//! `EncryptionUnavailable`, while `DecryptionFailed` only degrades a single
//! message to a placeholder.

use thiserror::Error;

/// Errors returned by external collaborators (encryption service, message
/// store, user directory, account service).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Collaborator could not be reached (connection refused, timeout, DNS).
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// Collaborator answered but refused the request.
    #[error("request rejected with status {status}: {reason}")]
    Rejected {
        /// Status code reported by the collaborator
        status: u16,
        /// Reason reported by the collaborator
        reason: String,
    },

    /// Collaborator answered with a body we could not interpret.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ServiceError {
    /// Returns true if repeating the same request later may succeed.
    ///
    /// Rejections are stable for a given request (wrong key, unknown
    /// message); connectivity problems and garbled responses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Malformed(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
        }
    }
}

/// Errors produced by [`crate::EnvelopeCodec`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The encryption service is unreachable or rejected the public key.
    #[error("encryption unavailable: {reason}")]
    EncryptionUnavailable {
        /// Underlying service failure
        reason: String,
    },

    /// The encryption service rejected the ciphertext/private key pair.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Underlying service failure
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_errors_are_transient() {
        assert!(ServiceError::Unreachable("connection refused".into()).is_transient());
        assert!(ServiceError::Malformed("truncated body".into()).is_transient());
        assert!(ServiceError::Rejected { status: 503, reason: "busy".into() }.is_transient());
    }

    #[test]
    fn client_rejections_are_not_transient() {
        assert!(!ServiceError::Rejected { status: 400, reason: "bad key".into() }.is_transient());
        assert!(!ServiceError::Rejected { status: 404, reason: "unknown".into() }.is_transient());
    }
}
