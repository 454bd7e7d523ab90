//! Recipe loading and validation error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum RecipeError {
    #[error("malformed recipe {source_name}: {message}")]
    MalformedRecipe {
        source_name: String,
        message: String,
    },

    #[error("recipe {recipe} does not support this host: requires {constraint}, host is {host}")]
    UnsupportedPlatform {
        recipe: String,
        constraint: String,
        host: String,
    },

    #[error("recipe not found: {name}")]
    NotFound { name: String },

    #[error("failed to read recipe {path}: {message}")]
    ReadFailed { path: String, message: String },
}

impl RecipeError {
    /// Shorthand for a malformed-recipe error
    pub fn malformed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRecipe {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

impl UserFacingError for RecipeError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MalformedRecipe { .. } => {
                Some("Correct the recipe definition before retrying the install.")
            }
            Self::UnsupportedPlatform { .. } => {
                Some("Run the install on a host matching the recipe's platform section.")
            }
            Self::NotFound { .. } => Some(
                "Pass a path to the recipe file or add its directory to paths.recipe_dirs.",
            ),
            Self::ReadFailed { .. } => Some("Check that the recipe file exists and is readable."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::MalformedRecipe { .. } => "recipe.malformed",
            Self::UnsupportedPlatform { .. } => "recipe.unsupported_platform",
            Self::NotFound { .. } => "recipe.not_found",
            Self::ReadFailed { .. } => "recipe.read_failed",
        };
        Some(code)
    }
}
