//! Document fingerprints used to detect edits made outside the store

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum of a document's text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Fingerprint document text exactly as read from disk
    pub fn of_text(text: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(text.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `text` is byte-identical to what was fingerprinted
    pub fn matches(&self, text: &str) -> bool {
        *self == Self::of_text(text)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for log lines
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let text = "# PRD-1: Login\n`Status`: NEW\n";
        assert_eq!(Checksum::of_text(text), Checksum::of_text(text));
    }

    #[test]
    fn test_single_byte_edit_detected() {
        let checksum = Checksum::of_text("`Status`: NEW\n");
        assert!(checksum.matches("`Status`: NEW\n"));
        assert!(!checksum.matches("`Status`: NEW \n"));
    }

    #[test]
    fn test_display_is_abbreviated() {
        let checksum = Checksum::of_text("x");
        assert_eq!(checksum.to_string().len(), 12);
        assert_eq!(checksum.as_str().len(), 64);
    }
}
