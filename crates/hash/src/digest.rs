//! Source archive digests declared by recipes

use kiln_errors::FetchError;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Algorithm a recipe used to record its source digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
    Blake3,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

/// Expected content digest of a source archive
///
/// The hex value is kept as declared (lowercased) so that a placeholder such
/// as an empty string or a run of zeros survives loading and can be rejected
/// at fetch time with a precise error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDigest {
    pub algorithm: DigestAlgorithm,
    pub hex: String,
}

impl SourceDigest {
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm, hex: impl Into<String>) -> Self {
        Self {
            algorithm,
            hex: hex.into().trim().to_ascii_lowercase(),
        }
    }

    #[must_use]
    pub fn sha256(hex: impl Into<String>) -> Self {
        Self::new(DigestAlgorithm::Sha256, hex)
    }

    #[must_use]
    pub fn blake3(hex: impl Into<String>) -> Self {
        Self::new(DigestAlgorithm::Blake3, hex)
    }

    /// Compute the digest of `data` with the given algorithm
    #[must_use]
    pub fn compute(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut hasher = DigestHasher::new(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    /// True when the digest carries no information: empty or all zeros
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.hex.is_empty() || self.hex.bytes().all(|b| b == b'0')
    }

    /// Check that the value is 64 hex characters
    ///
    /// # Errors
    ///
    /// Returns `InvalidDigest` describing the malformed value.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.hex.len() != 64 {
            return Err(FetchError::InvalidDigest {
                digest: self.to_string(),
                message: format!("expected 64 hex characters, got {}", self.hex.len()),
            });
        }
        if !self.hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FetchError::InvalidDigest {
                digest: self.to_string(),
                message: "contains non-hex characters".to_string(),
            });
        }
        Ok(())
    }

    /// Whether `data` hashes to this digest
    #[must_use]
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::compute(self.algorithm, data) == *self
    }
}

impl fmt::Display for SourceDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Incremental hasher for either supported algorithm
pub enum DigestHasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl DigestHasher {
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    #[must_use]
    pub fn finalize(self) -> SourceDigest {
        match self {
            Self::Sha256(h) => SourceDigest::sha256(hex::encode(h.finalize())),
            Self::Blake3(h) => SourceDigest::blake3(h.finalize().to_hex().to_string()),
        }
    }
}
