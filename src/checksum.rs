//! Checksums identifying the exact text an MDF model was read from

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum of one MDF document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum of document text
    pub fn of_text(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve hex digits, for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }

    /// True when `content` hashes to this checksum
    pub fn matches(&self, content: &str) -> bool {
        *self == Self::of_text(content)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A loaded source and the checksum of its text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDigest {
    /// Path, URL or caller-supplied name of the source
    pub source: String,
    pub checksum: Checksum,
}

impl SourceDigest {
    pub fn new(source: impl Into<String>, content: &str) -> Self {
        Self {
            source: source.into(),
            checksum: Checksum::of_text(content),
        }
    }
}

impl fmt::Display for SourceDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.source, self.checksum.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_text_same_checksum() {
        let mdf = "Handle: test\nNodes: {}\n";
        assert_eq!(Checksum::of_text(mdf), Checksum::of_text(mdf));
        assert_ne!(Checksum::of_text(mdf), Checksum::of_text("Handle: other\n"));
    }

    #[test]
    fn test_digest_display_is_short() {
        let digest = SourceDigest::new("model.yml", "Handle: test\n");
        assert!(digest.checksum.matches("Handle: test\n"));
        assert_eq!(digest.checksum.short().len(), 12);
        assert!(digest.to_string().starts_with("model.yml ("));
    }
}
