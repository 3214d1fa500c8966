//! Wire frames for named RPCs.
//!
//! Every message on a connection is a [`Frame`]: an RPC name plus its
//! parameter package. Frames are transport-agnostic and serialized with
//! bincode; stream transports add their own length prefix.

use crate::error::NetworkError;
use crate::package::Package;
use serde::{Deserialize, Serialize};

/// Protocol-level peer info exchange. Gated until the handshake completes.
pub const PEER_INFO: &str = "PeerInfo";

/// Carries a [`DisconnectReason`](crate::DisconnectReason) code right before
/// the sender closes the connection.
pub const ERROR: &str = "Error";

/// A single named RPC invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub name: String,
    pub payload: Package,
    /// Routed frames are dispatched by name alone instead of through the
    /// receiving peer's handler table.
    pub routed: bool,
}

impl Frame {
    pub fn new(name: impl Into<String>, payload: Package) -> Self {
        Self {
            name: name.into(),
            payload,
            routed: false,
        }
    }

    pub fn routed(name: impl Into<String>, payload: Package) -> Self {
        Self {
            name: name.into(),
            payload,
            routed: true,
        }
    }
}

/// Serialize a message to bytes using bincode.
pub fn serialize<T: Serialize>(message: &T) -> Result<Vec<u8>, NetworkError> {
    bincode::serialize(message).map_err(|e| NetworkError::Serialization(e.to_string()))
}

/// Deserialize bytes to a message using bincode.
pub fn deserialize<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetworkError> {
    bincode::deserialize(bytes).map_err(|e| NetworkError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_survives_serialization() {
        let mut payload = Package::new();
        payload.write_string("1.0.0");
        payload.write_string("ABCD");

        let bytes = serialize(&Frame::new("Mod_VersionCheck", payload)).unwrap();
        let mut frame: Frame = deserialize(&bytes).unwrap();

        assert_eq!(frame.name, "Mod_VersionCheck");
        assert!(!frame.routed);
        assert_eq!(frame.payload.read_string().unwrap(), "1.0.0");
        assert_eq!(frame.payload.read_string().unwrap(), "ABCD");
    }

    #[test]
    fn test_garbage_is_a_deserialization_error() {
        let result: Result<Frame, _> = deserialize(&[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(NetworkError::Deserialization(_))));
    }
}
