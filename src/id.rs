//! Lock identifier generation.
//!
//! A [`LockId`] is exactly [`ID_LEN`] bytes of text. Identifiers are either
//! fully random or built from a caller-supplied prefix whose remaining
//! positions are filled with random characters from [`ALPHABET`].
//!
//! Uniqueness is probabilistic: 63^36 combinations make collisions between
//! live identifiers negligible, and no global check is made at generation
//! time. Two handles carrying the same bytes are the same logical lock.

use crate::error::{LockTableError, Result};
use rand::Rng;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of an identifier in bytes.
pub const ID_LEN: usize = 36;

/// Characters used for random filler.
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-";

/// Fixed-width lock identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockId([u8; ID_LEN]);

impl LockId {
    /// Generate a fully random identifier.
    pub fn random() -> Self {
        let mut bytes = [0u8; ID_LEN];
        fill_random(&mut bytes);
        Self(bytes)
    }

    /// Generate an identifier that starts with `prefix`.
    ///
    /// The prefix is copied verbatim and every remaining position is filled
    /// from [`ALPHABET`]. A prefix longer than [`ID_LEN`] is rejected rather
    /// than truncated.
    pub fn with_prefix(prefix: impl AsRef<[u8]>) -> Result<Self> {
        let prefix = prefix.as_ref();
        if prefix.len() > ID_LEN {
            return Err(LockTableError::InvalidIdentifier(format!(
                "prefix is {} bytes, at most {} allowed",
                prefix.len(),
                ID_LEN
            )));
        }

        let mut bytes = [0u8; ID_LEN];
        bytes[..prefix.len()].copy_from_slice(prefix);
        fill_random(&mut bytes[prefix.len()..]);
        Ok(Self(bytes))
    }

    /// Build an identifier from exactly [`ID_LEN`] raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; ID_LEN] = bytes.try_into().map_err(|_| {
            LockTableError::InvalidIdentifier(format!(
                "expected {} bytes, got {}",
                ID_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Raw identifier bytes as stored in the table.
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }
}

fn fill_random(dst: &mut [u8]) {
    let mut rng = rand::thread_rng();
    for byte in dst {
        *byte = ALPHABET[rng.gen_range(0..ALPHABET.len())];
    }
}

impl FromStr for LockId {
    type Err = LockTableError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockId({})", self)
    }
}

impl Serialize for LockId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
