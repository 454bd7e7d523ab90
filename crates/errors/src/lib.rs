#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the kiln formula engine
//!
//! Errors are organized by the stage of the install transaction that
//! raises them. Every domain error is `Clone` so it can travel through the
//! event channel as well as up the call stack.

use std::borrow::Cow;

use thiserror::Error;

pub mod build;
pub mod config;
pub mod fetch;
pub mod install;
pub mod platform;
pub mod recipe;
pub mod resolve;
pub mod verify;
pub mod version;

// Re-export all error types at the root
pub use build::BuildError;
pub use config::ConfigError;
pub use fetch::FetchError;
pub use install::InstallError;
pub use platform::PlatformError;
pub use recipe::RecipeError;
pub use resolve::ResolveError;
pub use verify::VerifyError;
pub use version::VersionError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("recipe error: {0}")]
    Recipe(#[from] RecipeError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("install error: {0}")]
    Install(#[from] InstallError),

    #[error("verification error: {0}")]
    Verify(#[from] VerifyError),

    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {message}")]
    Io {
        #[cfg_attr(feature = "serde", serde(with = "io_kind_as_str"))]
        kind: std::io::ErrorKind,
        message: String,
        #[cfg_attr(feature = "serde", serde(with = "opt_path_buf"))]
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<semver::Error> for Error {
    fn from(err: semver::Error) -> Self {
        Self::Version(VersionError::ParseError {
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

/// Result type alias for kiln operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information without
/// requiring heavyweight envelopes.
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Recipe(err) => err.user_message(),
            Error::Resolve(err) => err.user_message(),
            Error::Fetch(err) => err.user_message(),
            Error::Build(err) => err.user_message(),
            Error::Install(err) => err.user_message(),
            Error::Verify(err) => err.user_message(),
            Error::Io { message, path, .. } => match path {
                Some(path) => Cow::Owned(format!("{message} ({})", path.display())),
                None => Cow::Owned(message.clone()),
            },
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Recipe(err) => err.user_hint(),
            Error::Resolve(err) => err.user_hint(),
            Error::Fetch(err) => err.user_hint(),
            Error::Build(err) => err.user_hint(),
            Error::Install(err) => err.user_hint(),
            Error::Verify(err) => err.user_hint(),
            Error::Version(err) => err.user_hint(),
            Error::Config(err) => err.user_hint(),
            Error::Platform(err) => err.user_hint(),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch(err) => err.is_retryable(),
            Error::Install(err) => err.is_retryable(),
            Error::Io { kind, .. } => matches!(
                kind,
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Recipe(err) => err.user_code(),
            Error::Resolve(err) => err.user_code(),
            Error::Fetch(err) => err.user_code(),
            Error::Build(err) => err.user_code(),
            Error::Install(err) => err.user_code(),
            Error::Verify(err) => err.user_code(),
            Error::Version(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::Platform(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Cancelled => Some("error.cancelled"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}

// Serde helper modules for optional path and io::ErrorKind as string
#[cfg(feature = "serde")]
mod io_kind_as_str {
    use serde::{Deserialize, Deserializer, Serializer};
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(kind: &std::io::ErrorKind, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&format!("{kind:?}"))
    }
    pub fn deserialize<'de, D>(deserializer: D) -> Result<std::io::ErrorKind, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "NotFound" => std::io::ErrorKind::NotFound,
            "PermissionDenied" => std::io::ErrorKind::PermissionDenied,
            "AlreadyExists" => std::io::ErrorKind::AlreadyExists,
            "InvalidInput" => std::io::ErrorKind::InvalidInput,
            "InvalidData" => std::io::ErrorKind::InvalidData,
            "TimedOut" => std::io::ErrorKind::TimedOut,
            "Interrupted" => std::io::ErrorKind::Interrupted,
            "Unsupported" => std::io::ErrorKind::Unsupported,
            "UnexpectedEof" => std::io::ErrorKind::UnexpectedEof,
            _ => std::io::ErrorKind::Other,
        })
    }
}

#[cfg(feature = "serde")]
mod opt_path_buf {
    use serde::{Deserialize, Deserializer, Serializer};
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(path: &Option<std::path::PathBuf>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match path {
            Some(pb) => s.serialize_some(&pb.display().to_string()),
            None => s.serialize_none(),
        }
    }
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<std::path::PathBuf>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<String>::deserialize(deserializer)?;
        Ok(opt.map(std::path::PathBuf::from))
    }
}
