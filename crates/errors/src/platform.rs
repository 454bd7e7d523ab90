//! Host process and filesystem operation errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Errors that can occur while talking to the host
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PlatformError {
    #[error("process execution failed: {command} - {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("filesystem operation failed: {operation} - {message}")]
    FilesystemOperationFailed { operation: String, message: String },
}

impl UserFacingError for PlatformError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ProcessExecutionFailed { .. } => {
                Some("Check that the program exists and is on PATH.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ProcessExecutionFailed { .. } => "platform.process_failed",
            Self::FilesystemOperationFailed { .. } => "platform.filesystem_failed",
        };
        Some(code)
    }
}
