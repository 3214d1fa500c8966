//! Codec for the version check message.
//!
//! The payload is exactly two strings, version then content hash. The layout
//! has no format version of its own, so both sides must agree on it.

use crate::error::HandshakeError;
use crate::fingerprint::Fingerprint;
use modgate_network::Package;

pub fn encode_fingerprint(fingerprint: &Fingerprint) -> Package {
    let mut package = Package::new();
    package.write_string(&fingerprint.version);
    package.write_string(&fingerprint.content_hash);
    package
}

/// Decode a received version check. Trailing bytes are ignored.
pub fn decode_fingerprint(mut package: Package) -> Result<Fingerprint, HandshakeError> {
    let version = package.read_string()?;
    let content_hash = package.read_string()?;
    Ok(Fingerprint {
        version,
        content_hash,
    })
}
