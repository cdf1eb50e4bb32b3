//! Content hashing for artifact identity

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix used by every content URL
pub const HASH_PREFIX: &str = "sha256:";

/// A SHA-256 hash of an artifact payload.
///
/// Artifacts are identified by the hash of their bytes, so two builds that
/// produce identical payloads produce identical identities and the store
/// can deduplicate them.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash a byte payload
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Full lowercase hex digest
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex digest with the `sha256:` prefix, the form used in asset URLs
    pub fn to_prefixed_hex(&self) -> String {
        format!("{}{}", HASH_PREFIX, self.to_hex())
    }

    /// Parse a `sha256:`-prefixed hex digest
    pub fn from_prefixed_hex(s: &str) -> Option<Self> {
        Self::from_hex(s.strip_prefix(HASH_PREFIX)?)
    }

    /// Parse a bare 64-character hex digest
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}
