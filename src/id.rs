//! Artifact identifiers
//!
//! A confirmed id is `TYPE-<n>` (e.g. `REQ-7`); a provisional id is
//! `TYPE-PROVISIONAL<n>` and is only meaningful inside a single draft.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::artifact_type::ArtifactType;
use crate::error::StoreError;

/// Marker between the type prefix and a draft-local ordinal
pub const PROVISIONAL_MARKER: &str = "PROVISIONAL";

/// Numeric part of an id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ordinal {
    Confirmed(u32),
    Provisional(u32),
}

impl Ordinal {
    pub fn number(&self) -> u32 {
        match self {
            Ordinal::Confirmed(n) | Ordinal::Provisional(n) => *n,
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Ordinal::Provisional(_))
    }

    /// Parse the text after `TYPE-` (either `17` or `PROVISIONAL3`)
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(rest) = text.strip_prefix(PROVISIONAL_MARKER) {
            return parse_digits(rest).map(Ordinal::Provisional);
        }
        parse_digits(text).map(Ordinal::Confirmed)
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ordinal::Confirmed(n) => write!(f, "{}", n),
            Ordinal::Provisional(n) => write!(f, "{}{}", PROVISIONAL_MARKER, n),
        }
    }
}

fn parse_digits(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Composite artifact identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId {
    pub artifact_type: ArtifactType,
    pub ordinal: Ordinal,
}

impl ArtifactId {
    pub fn confirmed(artifact_type: ArtifactType, n: u32) -> Self {
        Self {
            artifact_type,
            ordinal: Ordinal::Confirmed(n),
        }
    }

    pub fn provisional(artifact_type: ArtifactType, n: u32) -> Self {
        Self {
            artifact_type,
            ordinal: Ordinal::Provisional(n),
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.ordinal.is_provisional()
    }

    /// The numeric part, regardless of confirmation state
    pub fn number(&self) -> u32 {
        self.ordinal.number()
    }

    /// Parse an identifier typed by a caller: trimmed, case-insensitive
    pub fn normalize(input: &str) -> Result<Self, StoreError> {
        input.trim().to_ascii_uppercase().parse()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.artifact_type, self.ordinal)
    }
}

impl FromStr for ArtifactId {
    type Err = StoreError;

    /// Strict parse of the on-disk form (`REQ-7`, `UACC-PROVISIONAL2`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, rest) = s
            .split_once('-')
            .ok_or_else(|| StoreError::InvalidIdentifier(s.to_string()))?;
        let artifact_type = ArtifactType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == prefix)
            .ok_or_else(|| StoreError::InvalidIdentifier(s.to_string()))?;
        let ordinal = Ordinal::parse(rest).ok_or_else(|| StoreError::InvalidIdentifier(s.to_string()))?;
        if ordinal == Ordinal::Confirmed(0) {
            return Err(StoreError::InvalidIdentifier(s.to_string()));
        }
        Ok(Self {
            artifact_type,
            ordinal,
        })
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_confirmed() {
        let id: ArtifactId = "TASKPRD-12".parse().unwrap();
        assert_eq!(id.artifact_type, ArtifactType::Taskprd);
        assert_eq!(id.ordinal, Ordinal::Confirmed(12));
        assert_eq!(id.to_string(), "TASKPRD-12");
    }

    #[test]
    fn test_parse_provisional() {
        let id: ArtifactId = "UACC-PROVISIONAL3".parse().unwrap();
        assert!(id.is_provisional());
        assert_eq!(id.number(), 3);
        assert_eq!(id.to_string(), "UACC-PROVISIONAL3");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["REQ", "REQ-", "REQ-x1", "FOO-1", "REQ-0", "REQ-PROVISIONAL", "req-1"] {
            assert!(bad.parse::<ArtifactId>().is_err(), "{} should not parse", bad);
        }
    }

    #[test]
    fn test_normalize_user_input() {
        let id = ArtifactId::normalize("  req-5 ").unwrap();
        assert_eq!(id, ArtifactId::confirmed(ArtifactType::Req, 5));
    }

    #[test]
    fn test_serde_as_string() {
        let id = ArtifactId::confirmed(ArtifactType::Sacc, 4);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"SACC-4\"");
        let back: ArtifactId = serde_json::from_str("\"SACC-4\"").unwrap();
        assert_eq!(back, id);
    }
}
