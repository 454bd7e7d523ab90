#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! High-level operations orchestration for kiln
//!
//! This crate sits between the CLI and the specialized crates. It wires the
//! recipe model, resolver, fetcher, stage runner and installer into one
//! install transaction, and offers the read-only queries around it.

mod context;
mod install;
mod locate;
mod query;
mod uninstall;

pub use context::{OpsContextBuilder, OpsCtx};
pub use install::{install, InstallRequest};
pub use locate::{ensure_supported, load_recipe};
pub use query::{check, fetch, info, list, plan};
pub use uninstall::uninstall;

pub use kiln_install::{IntegrityReport, UninstallReport};
pub use kiln_types::{
    FetchReport, InstallReport, InstalledRecipe, PlanReport, RecipeChange, RecipeInfo,
};

use kiln_errors::Error;

/// Operation result that can be serialized for CLI output
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "type", content = "data")]
pub enum OperationResult {
    /// Installation report
    InstallReport(InstallReport),
    /// Uninstall report
    UninstallReport(UninstallReport),
    /// Install plan
    PlanReport(PlanReport),
    /// Verified source fetch
    FetchReport(FetchReport),
    /// Installed recipes
    RecipeList(Vec<InstalledRecipe>),
    /// One installed recipe
    RecipeInfo(RecipeInfo),
    /// Integrity check results
    IntegrityReport(IntegrityReport),
}

impl OperationResult {
    /// Convert to JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Check if this is a success result
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            OperationResult::InstallReport(_)
            | OperationResult::UninstallReport(_)
            | OperationResult::PlanReport(_)
            | OperationResult::FetchReport(_)
            | OperationResult::RecipeList(_)
            | OperationResult::RecipeInfo(_) => true,
            OperationResult::IntegrityReport(report) => report.is_intact(),
        }
    }
}
