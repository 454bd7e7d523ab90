#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for kiln
//!
//! Value types shared by the recipe model, the resolver, the stage runner
//! and the installer: version constraints, dependency phases, install
//! destination categories, build phase names and operation reports.

pub mod formula;
pub mod reports;
pub mod version;

// Re-export commonly used types
pub use formula::{DependencyPhase, DestinationCategory, PhaseName};
pub use reports::{
    ArtifactInfo, FetchReport, InstallReport, InstalledRecipe, PlanEntry, PlanEntryAction,
    PlanReport, RecipeChange, RecipeInfo,
};
pub use semver::Version;
pub use version::{parse_version, VersionConstraint, VersionSpec};

use serde::{Deserialize, Serialize};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    #[default]
    Tty,
    Json,
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    Always,
    #[default]
    Auto,
    Never,
}

// Implement clap::ValueEnum for ColorChoice
impl clap::ValueEnum for ColorChoice {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Always, Self::Auto, Self::Never]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Always => clap::builder::PossibleValue::new("always"),
            Self::Auto => clap::builder::PossibleValue::new("auto"),
            Self::Never => clap::builder::PossibleValue::new("never"),
        })
    }
}
