//! error types for tablelog
//!
//! two families:
//! - `Error`: caller-facing failures (key setup, encryption, publishing)
//! - `AuthFailure`: why an envelope or snapshot did not authenticate.
//!   replay never surfaces these, it quarantines the command instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key derivation failed")]
    KeyDerivationFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(&'static str),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("missing key: {0}")]
    MissingKey(&'static str),

    // === publishing ===
    #[error("viewer cannot author commands")]
    NotAnAuthor,

    #[error("command {id} rejected locally: {reason}")]
    Rejected { id: String, reason: String },

    // === snapshots ===
    #[error("not caught up: applied {applied} of {observed} log entries")]
    NotCaughtUp { applied: usize, observed: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// reasons an envelope or snapshot fails authentication.
///
/// `Display` yields the kebab-case reason string used on the wire and in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("missing-mac")]
    MissingMac,
    #[error("missing-sig")]
    MissingSig,
    #[error("missing-room-sig")]
    MissingRoomSig,
    #[error("missing-room-key")]
    MissingRoomKey,
    #[error("invalid-pubkey")]
    InvalidPubkey,
    #[error("actor-id-mismatch")]
    ActorIdMismatch,
    #[error("expected-actor-mismatch")]
    ExpectedActorMismatch,
    #[error("seq-mismatch")]
    SeqMismatch,
    #[error("mac-mismatch")]
    MacMismatch,
    #[error("sig-mismatch")]
    SigMismatch,
    #[error("room-sig-mismatch")]
    RoomSigMismatch,
    #[error("invalid-envelope")]
    InvalidEnvelope,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings() {
        assert_eq!(AuthFailure::MissingMac.to_string(), "missing-mac");
        assert_eq!(AuthFailure::ActorIdMismatch.to_string(), "actor-id-mismatch");
        assert_eq!(AuthFailure::SeqMismatch.to_string(), "seq-mismatch");
        assert_eq!(AuthFailure::InvalidEnvelope.to_string(), "invalid-envelope");
    }
}
