//! Scan verdicts and content digests.

use serde::{Deserialize, Serialize};

/// Substring of a daemon reply that marks a detection.
pub const DETECTION_MARKER: &str = "FOUND";

/// Substring of a daemon reply that marks a protocol or scan error.
pub const ERROR_MARKER: &str = "ERROR";

/// Classified outcome of scanning one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Verdict {
    /// The daemon found nothing.
    Clean,
    /// The daemon reported a detection.
    Infected,
    /// The file could not be scanned; it is retried next cycle.
    Errored,
}

impl Verdict {
    /// Classify a daemon reply line.
    ///
    /// Detection wins over error, anything else is clean.
    pub fn from_reply(reply: &str) -> Self {
        if reply.contains(DETECTION_MARKER) {
            Self::Infected
        } else if reply.contains(ERROR_MARKER) {
            Self::Errored
        } else {
            Self::Clean
        }
    }
}

/// BLAKE3 digest of a file's content, kept as forensic evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Rebuild a hash from stored bytes, `None` if the length is wrong.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_clamd_replies() {
        assert_eq!(Verdict::from_reply("stream: OK\n"), Verdict::Clean);
        assert_eq!(
            Verdict::from_reply("stream: Win.Test.EICAR_HDB-1 FOUND\n"),
            Verdict::Infected
        );
        assert_eq!(
            Verdict::from_reply("INSTREAM size limit exceeded. ERROR\n"),
            Verdict::Errored
        );
    }

    #[test]
    fn test_detection_takes_precedence() {
        assert_eq!(
            Verdict::from_reply("stream: ERROR.Sig FOUND"),
            Verdict::Infected
        );
    }

    #[test]
    fn test_empty_reply_is_clean() {
        assert_eq!(Verdict::from_reply(""), Verdict::Clean);
    }

    #[test]
    fn test_content_hash_from_slice() {
        let hash = ContentHash::new([0x5a; 32]);
        assert_eq!(ContentHash::from_slice(hash.as_bytes()), Some(hash));
        assert_eq!(ContentHash::from_slice(&[0u8; 16]), None);
        assert_eq!(hash.to_string(), "5a".repeat(32));
    }
}
