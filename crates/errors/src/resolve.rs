//! Dependency resolution error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ResolveError {
    #[error("unresolved dependency: {name} ({constraint}) required by {required_by}")]
    UnresolvedDependency {
        name: String,
        constraint: String,
        required_by: String,
    },

    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },
}

impl UserFacingError for ResolveError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnresolvedDependency { .. } => Some(
                "Install the dependency on the host, declare it under host.provides, or add a recipe for it to a catalog directory.",
            ),
            Self::DependencyCycle { .. } => {
                Some("Remove the circular dependency from the recipes involved.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UnresolvedDependency { .. } => "resolve.unresolved_dependency",
            Self::DependencyCycle { .. } => "resolve.dependency_cycle",
        };
        Some(code)
    }
}
