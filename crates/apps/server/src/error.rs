//! Handshake error taxonomy.
//!
//! None of these escape the handshake core as faults: each one is turned
//! into a rejection, a log line and, on a server, a forced disconnect.

use crate::fingerprint::{Fingerprint, FingerprintError};
use modgate_network::{PackageError, PeerHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The local fingerprint could not be computed.
    #[error(transparent)]
    LocalFingerprintUnreadable(#[from] FingerprintError),

    /// The peer's handshake payload did not decode.
    #[error("malformed handshake: {0}")]
    MalformedHandshake(#[from] PackageError),

    #[error("version mismatch: local {local}, remote {remote}")]
    VersionMismatch {
        local: Fingerprint,
        remote: Fingerprint,
    },

    #[error("content hash mismatch: local {local}, remote {remote}")]
    HashMismatch {
        local: Fingerprint,
        remote: Fingerprint,
    },

    /// A gated RPC arrived before the peer completed the handshake.
    #[error("{0} invoked a gated RPC before completing the handshake")]
    UnvalidatedPeerRpc(PeerHandle),
}

impl HandshakeError {
    /// The remote fingerprint, when one was decoded.
    pub fn remote(&self) -> Option<&Fingerprint> {
        match self {
            Self::VersionMismatch { remote, .. } | Self::HashMismatch { remote, .. } => {
                Some(remote)
            }
            _ => None,
        }
    }
}
