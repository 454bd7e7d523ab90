//! Post-install verification error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum VerifyError {
    #[error("verification check {check_index} failed: expected {expected}, got {actual}")]
    VerificationFailed {
        check_index: usize,
        expected: String,
        actual: String,
    },
}

impl UserFacingError for VerifyError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        Some("The install was rolled back; check the recipe's verify section against the built artifacts.")
    }

    fn user_code(&self) -> Option<&'static str> {
        Some("verify.failed")
    }
}
