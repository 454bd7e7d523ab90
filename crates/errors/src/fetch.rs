//! Source acquisition and integrity error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum FetchError {
    #[error("recipe {recipe} has no integrity digest for {uri}")]
    MissingIntegrityDigest { recipe: String, uri: String },

    #[error("integrity mismatch for {uri}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        uri: String,
        expected: String,
        actual: String,
    },

    #[error("source unavailable: {uri}: {message}")]
    FetchUnavailable { uri: String, message: String },

    #[error("invalid source locator {uri}: {message}")]
    InvalidSource { uri: String, message: String },

    #[error("invalid digest {digest}: {message}")]
    InvalidDigest { digest: String, message: String },

    #[error("failed to unpack {archive}: {message}")]
    ExtractionFailed { archive: String, message: String },
}

impl UserFacingError for FetchError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingIntegrityDigest { .. } => {
                Some("Record the source archive's sha256 or blake3 digest in the recipe.")
            }
            Self::IntegrityMismatch { .. } => Some(
                "The downloaded source does not match the recipe; verify the URL and update the digest only if the change is trusted.",
            ),
            Self::FetchUnavailable { .. } => {
                Some("Check network access to the source host and retry.")
            }
            Self::InvalidSource { .. } | Self::InvalidDigest { .. } => {
                Some("Correct the source section of the recipe.")
            }
            Self::ExtractionFailed { .. } => {
                Some("Ensure the source is a .tar, .tar.gz or .tgz archive.")
            }
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchUnavailable { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::MissingIntegrityDigest { .. } => "fetch.missing_integrity_digest",
            Self::IntegrityMismatch { .. } => "fetch.integrity_mismatch",
            Self::FetchUnavailable { .. } => "fetch.unavailable",
            Self::InvalidSource { .. } => "fetch.invalid_source",
            Self::InvalidDigest { .. } => "fetch.invalid_digest",
            Self::ExtractionFailed { .. } => "fetch.extraction_failed",
        };
        Some(code)
    }
}
