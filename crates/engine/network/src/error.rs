//! Network error types.

use crate::peer::PeerHandle;
use thiserror::Error;

/// Network-specific errors.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection failed to establish.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection was closed unexpectedly.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The peer handle does not name a live connection.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerHandle),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A frame exceeded the configured size limit.
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,

    /// Operation not available for the current role or state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
