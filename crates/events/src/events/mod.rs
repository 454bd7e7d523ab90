use serde::{Deserialize, Serialize};

use crate::EventSource;
use kiln_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureContext {
    /// Stable error code such as `fetch.integrity_mismatch`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod build;
pub mod fetch;
pub mod general;
pub mod install;
pub mod platform;
pub mod recipe;
pub mod resolver;
pub mod transaction;
pub mod verify;

pub use build::BuildEvent;
pub use fetch::FetchEvent;
pub use general::GeneralEvent;
pub use install::InstallEvent;
pub use platform::PlatformEvent;
pub use recipe::RecipeEvent;
pub use resolver::ResolverEvent;
pub use transaction::TransactionEvent;
pub use verify::VerifyEvent;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Recipe loading and platform checks
    Recipe(RecipeEvent),

    /// Dependency resolution
    Resolver(ResolverEvent),

    /// Source download, digest verification and unpacking
    Fetch(FetchEvent),

    /// Stage runner phases
    Build(BuildEvent),

    /// Conditional installer and uninstall
    Install(InstallEvent),

    /// Post-install verification checks
    Verify(VerifyEvent),

    /// Transaction begin, rollback and commit
    Transaction(TransactionEvent),

    /// External process execution
    Platform(PlatformEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Recipe(_) => EventSource::RECIPE,
            Self::Resolver(_) => EventSource::RESOLVER,
            Self::Fetch(_) => EventSource::FETCH,
            Self::Build(_) => EventSource::BUILD,
            Self::Install(_) => EventSource::INSTALL,
            Self::Verify(_) => EventSource::VERIFY,
            Self::Transaction(_) => EventSource::TRANSACTION,
            Self::Platform(_) => EventSource::PLATFORM,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            // Error-level events
            Self::Recipe(RecipeEvent::Rejected { .. })
            | Self::Resolver(ResolverEvent::Failed { .. })
            | Self::Fetch(FetchEvent::Failed { .. })
            | Self::Build(BuildEvent::Failed { .. })
            | Self::Install(InstallEvent::Failed { .. })
            | Self::Verify(VerifyEvent::CheckFailed { .. })
            | Self::Transaction(TransactionEvent::RollbackFailed { .. })
            | Self::Platform(PlatformEvent::ProcessExecutionFailed { .. }) => Level::ERROR,

            // Warning-level events
            Self::General(GeneralEvent::Warning { .. })
            | Self::Fetch(FetchEvent::Retrying { .. })
            | Self::Install(InstallEvent::ModifiedArtifactRemoved { .. })
            | Self::Transaction(TransactionEvent::RollbackStarted { .. }) => Level::WARN,

            // Debug-level events (internal detail)
            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Recipe(RecipeEvent::PlatformChecked { .. })
            | Self::Install(InstallEvent::ArtifactSkipped { .. })
            | Self::Platform(_) => Level::DEBUG,

            // Default to INFO for most events
            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "kiln::events::general",
            Self::Recipe(_) => "kiln::events::recipe",
            Self::Resolver(_) => "kiln::events::resolver",
            Self::Fetch(_) => "kiln::events::fetch",
            Self::Build(_) => "kiln::events::build",
            Self::Install(_) => "kiln::events::install",
            Self::Verify(_) => "kiln::events::verify",
            Self::Transaction(_) => "kiln::events::transaction",
            Self::Platform(_) => "kiln::events::platform",
        }
    }
}
