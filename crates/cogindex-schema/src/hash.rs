use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Algorithm name for SHA-256 fingerprints.
pub const SHA256: &str = "sha256";
/// Algorithm name for BLAKE3 fingerprints.
pub const BLAKE3: &str = "blake3";

/// Algorithms consulted first when comparing two fingerprint sets.
///
/// Comparison falls back to any algorithm present in both sets when none
/// of the preferred ones is shared.
pub const PREFERRED_ALGORITHMS: &[&str] = &[SHA256];

/// Newtype for a hex-encoded digest string.
///
/// Provides compile-time distinction from other strings. The algorithm is
/// carried separately (as the key of a [`Fingerprints`] map), so this type
/// holds digests of any length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct HexDigest(String);

impl HexDigest {
    /// Create a new `HexDigest` without validation (for deserialized data).
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Create a validated `HexDigest` (non-empty, ASCII hex only).
    ///
    /// # Errors
    ///
    /// Returns an error string if `s` is empty or contains non-hex characters.
    pub fn validated(s: &str) -> Result<Self, String> {
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_lowercase()))
        } else {
            Err(format!("invalid hex digest: '{s}'"))
        }
    }

    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HexDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for HexDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for HexDigest {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for HexDigest {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Map of algorithm name to hex digest, covering one cog's file tree.
///
/// `BTreeMap` keeps serialization order stable across runs.
pub type Fingerprints = BTreeMap<String, HexDigest>;

/// Compare two digests for equality, scanning every byte.
///
/// This is the single equality function used for fingerprint comparison.
/// Timing-attack resistance is not a requirement here, but routing all
/// digest comparisons through one explicit function keeps the comparison
/// rules in one place.
pub fn digest_eq(a: &HexDigest, b: &HexDigest) -> bool {
    let (a, b) = (a.as_str().as_bytes(), b.as_str().as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
