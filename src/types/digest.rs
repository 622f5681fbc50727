// ABOUTME: Content-addressed digest newtype (sha256:<64 hex chars>).
// ABOUTME: Validates algorithm and encoding so only real digests circulate.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseDigestError {
    #[error("digest cannot be empty")]
    Empty,

    #[error("digest must use the sha256 algorithm prefix: {0}")]
    UnsupportedAlgorithm(String),

    #[error("digest hex part must be 64 lowercase hex characters, got {0} characters")]
    BadLength(usize),

    #[error("invalid character in digest hex part: '{0}'")]
    InvalidChar(char),
}

/// A validated `sha256:...` content digest as issued by a container engine
/// or registry. Two identical inputs always produce the same digest;
/// different inputs never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest(String);

impl Digest {
    pub fn parse(input: &str) -> Result<Self, ParseDigestError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseDigestError::Empty);
        }

        let hex = input
            .strip_prefix("sha256:")
            .ok_or_else(|| ParseDigestError::UnsupportedAlgorithm(input.to_string()))?;

        if hex.len() != 64 {
            return Err(ParseDigestError::BadLength(hex.len()));
        }

        for c in hex.chars() {
            if !c.is_ascii_hexdigit() || c.is_ascii_uppercase() {
                return Err(ParseDigestError::InvalidChar(c));
            }
        }

        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex part without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.0["sha256:".len()..]
    }

    /// A short prefix of the hex part, for display.
    pub fn short(&self) -> &str {
        &self.hex()[..12]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Digest::parse(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "a3ed95caeb02ffe68cdd9fd84406680ae93d633cb16422d00e8a7c22955b46d4";

    #[test]
    fn parses_valid_sha256() {
        let d = Digest::parse(&format!("sha256:{HEX}")).unwrap();
        assert_eq!(d.hex(), HEX);
        assert_eq!(d.short(), &HEX[..12]);
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(matches!(
            Digest::parse(HEX),
            Err(ParseDigestError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            Digest::parse("sha256:abc123"),
            Err(ParseDigestError::BadLength(6))
        ));
    }

    #[test]
    fn rejects_uppercase_hex() {
        let upper = HEX.to_uppercase();
        assert!(matches!(
            Digest::parse(&format!("sha256:{upper}")),
            Err(ParseDigestError::InvalidChar(_))
        ));
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(Digest::parse("  "), Err(ParseDigestError::Empty)));
    }
}
