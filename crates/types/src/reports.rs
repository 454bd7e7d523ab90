//! Report type definitions for operations

use crate::DependencyPhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Installation report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallReport {
    /// `None` when nothing needed installing
    pub transaction_id: Option<Uuid>,
    pub install_root: PathBuf,
    /// Recipes built and installed, in plan order
    pub installed: Vec<RecipeChange>,
    /// Recipes whose committed install was intact and left alone
    pub already_installed: Vec<String>,
    /// Dependencies the host already provided
    pub satisfied: Vec<String>,
    /// Build-only dependencies removed after a successful install
    pub removed_build_dependencies: Vec<String>,
    pub duration_ms: u64,
}

/// One recipe placed by an install
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecipeChange {
    pub name: String,
    pub version: String,
    /// Version of the manifest this install superseded
    pub from_version: Option<String>,
    pub phase: DependencyPhase,
    pub artifacts: usize,
    pub skipped: usize,
}

/// Plan without side effects
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanReport {
    pub recipe: String,
    pub version: String,
    pub steps: Vec<PlanEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanEntry {
    pub name: String,
    pub version: Option<String>,
    pub phase: DependencyPhase,
    pub action: PlanEntryAction,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryAction {
    Install,
    Satisfied,
}

/// Fetch and verify without building
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchReport {
    pub recipe: String,
    pub version: String,
    pub uri: String,
    /// Verified digest in `algorithm:hex` form
    pub digest: String,
    pub size: u64,
    /// Where the archive was written, when kept
    pub path: Option<PathBuf>,
}

/// Summary of a committed install
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstalledRecipe {
    pub name: String,
    pub version: String,
    pub license: Option<String>,
    pub installed_at: DateTime<Utc>,
    pub entries: usize,
    pub runtime_dependencies: Vec<String>,
    pub build_dependencies: Vec<String>,
}

/// Full record of one committed install
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecipeInfo {
    #[serde(flatten)]
    pub summary: InstalledRecipe,
    pub source_url: String,
    pub source_digest: Option<String>,
    pub install_root: PathBuf,
    pub artifacts: Vec<ArtifactInfo>,
    /// Installed recipes that need this one at runtime
    pub dependents: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub destination: PathBuf,
    pub category: String,
    pub kind: String,
    pub checksum: String,
}
