//! Identity fingerprint of the running code.
//!
//! A fingerprint pairs the advertised version string with a SHA-256 digest of
//! the code actually loaded. Two processes built from byte-identical files
//! produce identical fingerprints, so peers compare them with plain string
//! equality.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Version plus content hash, as exchanged during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub version: String,
    /// 64 uppercase hex characters, no separators.
    pub content_hash: String,
}

impl Fingerprint {
    pub fn new(version: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            content_hash: content_hash.into(),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.version, self.content_hash)
    }
}

#[derive(Debug, Error)]
pub enum FingerprintError {
    /// The hashed artifact could not be read. The handshake cannot run
    /// without a local fingerprint, so this is not retried.
    #[error("cannot read {path} to fingerprint the running code: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Computes [`Fingerprint`]s for one artifact.
#[derive(Debug, Clone)]
pub struct FingerprintComputer {
    version: String,
    source: PathBuf,
}

impl FingerprintComputer {
    pub fn new(version: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            version: version.into(),
            source: source.into(),
        }
    }

    /// Hash the executable of the current process.
    pub fn for_current_exe(version: impl Into<String>) -> Result<Self, FingerprintError> {
        let source = std::env::current_exe().map_err(|source| FingerprintError::Unreadable {
            path: PathBuf::from("<current executable>"),
            source,
        })?;
        Ok(Self::new(version, source))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Read the artifact and hash it. Every call reads the file again.
    pub fn compute(&self) -> Result<Fingerprint, FingerprintError> {
        let content_hash = hash_file(&self.source).map_err(|source| FingerprintError::Unreadable {
            path: self.source.clone(),
            source,
        })?;

        tracing::debug!(
            "Fingerprinted {} as {}",
            self.source.display(),
            content_hash
        );

        Ok(Fingerprint {
            version: self.version.clone(),
            content_hash,
        })
    }
}

fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode_upper(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn artifact(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_compute_is_stable() {
        let file = artifact(b"plugin bytes");
        let computer = FingerprintComputer::new("1.0.0", file.path());

        let first = computer.compute().unwrap();
        let second = computer.compute().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.version, "1.0.0");
    }

    #[test]
    fn test_hash_is_uppercase_sha256_hex() {
        let file = artifact(b"abc");
        let fingerprint = FingerprintComputer::new("1.0.0", file.path())
            .compute()
            .unwrap();

        assert_eq!(
            fingerprint.content_hash,
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        );
    }

    #[test]
    fn test_identical_bytes_give_identical_hashes() {
        let a = artifact(b"same build");
        let b = artifact(b"same build");
        let c = artifact(b"other build");

        let hash = |file: &tempfile::NamedTempFile| {
            FingerprintComputer::new("1.0.0", file.path())
                .compute()
                .unwrap()
                .content_hash
        };

        assert_eq!(hash(&a), hash(&b));
        assert_ne!(hash(&a), hash(&c));
    }

    #[test]
    fn test_missing_artifact_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.dll");

        let err = FingerprintComputer::new("1.0.0", &missing)
            .compute()
            .unwrap_err();

        let FingerprintError::Unreadable { path, .. } = err;
        assert_eq!(path, missing);
    }

    #[test]
    fn test_current_exe_is_readable() {
        let computer = FingerprintComputer::for_current_exe("1.0.0").unwrap();
        let fingerprint = computer.compute().unwrap();
        assert_eq!(fingerprint.content_hash.len(), 64);
    }
}
