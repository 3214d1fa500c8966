//! Generic binary parameter package.
//!
//! A package is the payload of every named RPC. Values are appended in order
//! and read back in the same order; there are no field tags, so both sides
//! must agree on the layout of each message.
//!
//! Strings carry a 7-bit variable-length byte count followed by their UTF-8
//! bytes. Integers are little-endian.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A length prefix never needs more than five 7-bit groups for a `u32`.
const MAX_VARINT_BYTES: usize = 5;

/// Errors raised while reading a package.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    #[error("unexpected end of package: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("string length prefix is longer than 5 bytes")]
    OverlongLength,

    #[error("string is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Package {
    data: Vec<u8>,
    #[serde(skip)]
    cursor: usize,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap received bytes, positioned at the first field.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, cursor: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed by a read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    /// Move the read cursor back to the first field.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_varint(value.len() as u32);
        self.data.extend_from_slice(value.as_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn read_string(&mut self) -> Result<String, PackageError> {
        let len = self.read_varint()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PackageError::InvalidUtf8)
    }

    pub fn read_i32(&mut self) -> Result<i32, PackageError> {
        let bytes = self.take(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(i32::from_le_bytes(buf))
    }

    fn write_varint(&mut self, mut value: u32) {
        while value >= 0x80 {
            self.data.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.data.push(value as u8);
    }

    fn read_varint(&mut self) -> Result<u32, PackageError> {
        let mut value: u32 = 0;
        for group in 0..MAX_VARINT_BYTES {
            let byte = self.take(1)?[0];
            value |= u32::from(byte & 0x7f) << (7 * group);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(PackageError::OverlongLength)
    }

    fn take(&mut self, len: usize) -> Result<&[u8], PackageError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(PackageError::UnexpectedEnd {
                needed: len,
                remaining,
            });
        }
        let start = self.cursor;
        self.cursor += len;
        Ok(&self.data[start..self.cursor])
    }
}
