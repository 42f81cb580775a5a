//! Content-addressing.

use std::fmt;
use std::str::FromStr;

use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};

/// A SHA-256 digest, used as the key under which a signed artifact is
/// stored and as its stable identity.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash([u8; 32]);

impl Hash {
    /// Hash a payload's raw bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = digest(&SHA256, bytes);
        let mut buf = [0u8; 32];
        buf.copy_from_slice(digest.as_ref());
        Hash(buf)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

/// A hash string was not 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHashError;

impl fmt::Display for ParseHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not a 64-character hex-encoded SHA-256 hash")
    }
}

impl FromStr for Hash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(ParseHashError);
        }
        let mut buf = [0u8; 32];
        for (i, chunk) in buf.iter_mut().enumerate() {
            let byte_str = s.get(i * 2..i * 2 + 2).ok_or(ParseHashError)?;
            *chunk = u8::from_str_radix(byte_str, 16).map_err(|_| ParseHashError)?;
        }
        Ok(Hash(buf))
    }
}

impl TryFrom<String> for Hash {
    type Error = ParseHashError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let hash = Hash::of(b"hello world");
        let hex = hash.to_string();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<Hash>().unwrap(), hash);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!("not-a-hash".parse::<Hash>().is_err());
        assert!("ab".parse::<Hash>().is_err());
    }
}
