//! Page and file digests
//!
//! Digests are XXH3-128 values. A page digest covers one page-sized slice
//! of a data-page file (a trailing partial page is digested over the bytes
//! actually present). A file digest covers the entire file and is always
//! computed incrementally so large relations are never held in memory.
//!
//! Digests render as 32 lowercase hex characters and serialize the same way.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use xxhash_rust::xxh3::{xxh3_128, Xxh3};

/// 128-bit content digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(u128);

impl Digest {
    /// Digest a single page (or any byte slice) in one call
    pub fn of_page(bytes: &[u8]) -> Self {
        Digest(xxh3_128(bytes))
    }

    /// Raw digest value
    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Error parsing a hex digest
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid digest '{0}': expected 32 hex characters")]
pub struct DigestParseError(String);

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DigestParseError(s.to_string()));
        }
        u128::from_str_radix(s, 16)
            .map(Digest)
            .map_err(|_| DigestParseError(s.to_string()))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Incremental whole-file digest
///
/// Order-sensitive: feeding the same bytes in a different order yields a
/// different digest, while the split points between `update` calls do not
/// matter.
pub struct StreamDigest {
    state: Xxh3,
    len: u64,
}

impl StreamDigest {
    /// Start an empty digest
    pub fn new() -> Self {
        StreamDigest {
            state: Xxh3::new(),
            len: 0,
        }
    }

    /// Feed the next run of bytes
    pub fn update(&mut self, bytes: &[u8]) {
        self.state.update(bytes);
        self.len += bytes.len() as u64;
    }

    /// Number of bytes fed so far
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if no bytes have been fed
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Produce the digest of everything fed so far
    pub fn finish(&self) -> Digest {
        Digest(self.state.digest128())
    }
}

impl Default for StreamDigest {
    fn default() -> Self {
        Self::new()
    }
}
