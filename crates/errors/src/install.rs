//! Installation, rollback and manifest error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum InstallError {
    #[error("install conflict at {destination}: {message}")]
    InstallConflict {
        destination: String,
        message: String,
    },

    #[error("required artifact missing from build output: {source_path} (install action {action_index})")]
    MissingArtifact {
        source_path: String,
        action_index: usize,
    },

    #[error("filesystem operation failed: {operation} on {path}: {message}")]
    FilesystemError {
        operation: String,
        path: String,
        message: String,
    },

    #[error("rollback failed: {message}")]
    RollbackFailed { message: String },

    #[error("not installed: {name}")]
    NotInstalled { name: String },

    #[error("{name} is required at runtime by {}", .dependents.join(", "))]
    HasDependents {
        name: String,
        dependents: Vec<String>,
    },

    #[error("manifest for {name} is unreadable: {message}")]
    ManifestCorrupt { name: String, message: String },

    #[error("invalid destination {path}: {message}")]
    InvalidDestination { path: String, message: String },
}

impl InstallError {
    /// Shorthand for a filesystem failure
    pub fn fs(
        operation: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        err: &std::io::Error,
    ) -> Self {
        Self::FilesystemError {
            operation: operation.into(),
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InstallConflict { .. } => Some(
                "Give each install action a distinct destination, or remove the unmanaged file from the install root.",
            ),
            Self::MissingArtifact { .. } => Some(
                "Mark the action `when: exists` if the artifact is optional, or fix the build so it is produced.",
            ),
            Self::FilesystemError { .. } => {
                Some("Ensure the install root and state directory are writable.")
            }
            Self::RollbackFailed { .. } => Some(
                "The install root may contain leftovers; inspect it and remove them manually.",
            ),
            Self::NotInstalled { .. } => Some("Run `kiln list` to see installed recipes."),
            Self::HasDependents { .. } => {
                Some("Uninstall the dependents first or pass --force.")
            }
            Self::ManifestCorrupt { .. } => {
                Some("Reinstall the recipe with --force to rewrite its manifest.")
            }
            Self::InvalidDestination { .. } => {
                Some("Use relative source paths and plain file names for rename.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InstallConflict { .. } => "install.conflict",
            Self::MissingArtifact { .. } => "install.missing_artifact",
            Self::FilesystemError { .. } => "install.filesystem",
            Self::RollbackFailed { .. } => "install.rollback_failed",
            Self::NotInstalled { .. } => "install.not_installed",
            Self::HasDependents { .. } => "install.has_dependents",
            Self::ManifestCorrupt { .. } => "install.manifest_corrupt",
            Self::InvalidDestination { .. } => "install.invalid_destination",
        };
        Some(code)
    }
}
