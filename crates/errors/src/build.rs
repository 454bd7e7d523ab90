//! Stage runner error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum BuildError {
    #[error("phase {phase} failed with {}{}", exit_status_label(.exit_status), stderr_suffix(.stderr_tail))]
    PhaseFailed {
        phase: String,
        exit_status: Option<i32>,
        stderr_tail: String,
    },

    #[error("phase {phase} declares an empty command")]
    EmptyCommand { phase: String },

    #[error("work directory error at {path}: {message}")]
    WorkDirectory { path: String, message: String },
}

#[allow(clippy::ref_option)]
fn exit_status_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "no exit status".to_string(),
    }
}

fn stderr_suffix(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(": {tail}")
    }
}

impl UserFacingError for BuildError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PhaseFailed { .. } => Some(
                "Inspect the build output, fix the recipe or host toolchain, and rerun the install.",
            ),
            Self::EmptyCommand { .. } => Some("Give every phase a program and its arguments."),
            Self::WorkDirectory { .. } => Some("Ensure paths.build_dir is writable."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::PhaseFailed { .. } => "build.phase_failed",
            Self::EmptyCommand { .. } => "build.empty_command",
            Self::WorkDirectory { .. } => "build.work_directory",
        };
        Some(code)
    }
}
