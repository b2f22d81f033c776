//! Schema version value type
//!
//! Version folders and registry rows are named `major.minor[.patch]`.
//! A missing patch is 0, so `1.2` and `1.2.0` are the same version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::result::{Error, Result};

/// A totally ordered (major, minor, patch) triple
///
/// Field order matters: the derived `Ord` compares major, then minor,
/// then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse `major.minor[.patch]`
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersionFormat(text.to_string());

        let parts: Vec<&str> = text.split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(invalid());
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }

    /// Canonical registry key; equal versions always produce the same key
    pub fn normalized_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_and_three_parts() {
        assert_eq!(Version::parse("1.2").unwrap(), Version::new(1, 2, 0));
        assert_eq!(Version::parse("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(Version::parse("0.0").unwrap(), Version::new(0, 0, 0));
    }

    #[test]
    fn test_equal_spellings_are_equal() {
        let short: Version = "0.1".parse().unwrap();
        let long: Version = "0.1.0".parse().unwrap();
        assert_eq!(short, long);
        assert_eq!(short.normalized_key(), long.normalized_key());
        assert_eq!(long.normalized_key(), "0.1");
    }

    #[test]
    fn test_ordering_is_numeric_not_textual() {
        let v1_9 = Version::parse("1.9").unwrap();
        let v1_10 = Version::parse("1.10").unwrap();
        assert!(v1_9 < v1_10);
        assert!(Version::parse("1.2.1").unwrap() > Version::parse("1.2").unwrap());
        assert!(Version::parse("2.0").unwrap() > Version::parse("1.99.99").unwrap());
    }

    #[test]
    fn test_rejects_malformed_text() {
        for text in ["", "1", "1.", ".1", "1.2.3.4", "v1.2", "1.-2", " 1.2", "1.2 ", "1.x", "+1.2"] {
            let err = Version::parse(text).unwrap_err();
            assert!(
                matches!(err, Error::InvalidVersionFormat(ref t) if t == text),
                "expected InvalidVersionFormat for {text:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(Version::parse("99999999999.0").is_err());
    }

    #[test]
    fn test_display_keeps_nonzero_patch() {
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
        assert_eq!(Version::new(1, 0, 0).to_string(), "1.0");
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Version::new(0, 2, 1)).unwrap();
        assert_eq!(json, "\"0.2.1\"");
        let back: Version = serde_json::from_str("\"0.2.1\"").unwrap();
        assert_eq!(back, Version::new(0, 2, 1));
    }
}
