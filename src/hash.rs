//! Torrent identity helpers.
//!
//! qBittorrent keys every per-torrent query by the torrent's 40 character
//! hexadecimal info-hash. Input is accepted in any case and always emitted in lowercase.

use crate::error::{QbitError, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Length of a hex encoded SHA-1 digest
pub const HASH_LEN: usize = 40;

/// Returns `true` if `hash` is exactly 40 hexadecimal characters
#[must_use]
pub fn is_valid(hash: &str) -> bool {
    hash.len() == HASH_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validates and lowercases a torrent hash
///
/// # Errors
///
/// Returns [`QbitError::InvalidIdentity`] if the hash is not 40 hexadecimal characters
pub fn normalize(hash: &str) -> Result<String> {
    if is_valid(hash) {
        Ok(hash.to_ascii_lowercase())
    } else {
        Err(QbitError::InvalidIdentity(hash.to_string()))
    }
}

/// A validated, lowercase torrent info-hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TorrentHash(String);

impl TorrentHash {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TorrentHash {
    type Err = QbitError;

    fn from_str(s: &str) -> Result<Self> {
        normalize(s).map(Self)
    }
}

impl TryFrom<&str> for TorrentHash {
    type Error = QbitError;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

impl AsRef<str> for TorrentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TorrentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TorrentHash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UBUNTU: &str = "778CE280B595E57780FF083F2EB6F897DFA4A4EE";

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(
            "778ce280b595e57780ff083f2eb6f897dfa4a4ee",
            normalize(UBUNTU).unwrap()
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(UBUNTU).unwrap();
        assert_eq!(once, normalize(&once).unwrap());
    }

    #[test]
    fn test_rejects_malformed() {
        for hash in [
            "",
            "0",
            &"0".repeat(39),
            &"0".repeat(41),
            "778ce280b595e57780ff083f2eb6f897dfa4a4eg",
            " 78ce280b595e57780ff083f2eb6f897dfa4a4ee",
        ] {
            assert!(!is_valid(hash), "{hash:?} should be invalid");
            assert!(matches!(
                normalize(hash),
                Err(QbitError::InvalidIdentity(_))
            ));
        }
    }

    #[test]
    fn test_deserialize_normalizes() {
        let hash: TorrentHash = serde_json::from_str(&format!("\"{UBUNTU}\"")).unwrap();
        assert_eq!(UBUNTU.to_ascii_lowercase(), hash.as_str());

        assert!(serde_json::from_str::<TorrentHash>("\"not-a-hash\"").is_err());
    }
}
