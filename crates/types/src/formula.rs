//! Shared enums describing a formula's dependencies, phases and install layout

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// When a dependency is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPhase {
    /// Needed only while configuring/building the recipe
    #[serde(alias = "build-only", alias = "build_only")]
    Build,
    /// Needed by the installed artifacts
    #[default]
    Runtime,
}

impl DependencyPhase {
    #[must_use]
    pub fn is_build_only(self) -> bool {
        matches!(self, Self::Build)
    }
}

impl fmt::Display for DependencyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build-only"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

/// Target directory category for an installed artifact
///
/// Each category maps to a fixed directory under the install root. The
/// per-recipe categories (`doc`, `share`) are namespaced by recipe name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationCategory {
    Bin,
    Lib,
    Doc,
    Share,
}

impl DestinationCategory {
    /// Directory for this category relative to the install root
    #[must_use]
    pub fn relative_dir(self, recipe_name: &str) -> PathBuf {
        match self {
            Self::Bin => PathBuf::from("bin"),
            Self::Lib => PathBuf::from("lib"),
            Self::Doc => PathBuf::from("share").join("doc").join(recipe_name),
            Self::Share => PathBuf::from("share").join(recipe_name),
        }
    }

    /// Variable name exposing this category's absolute directory to commands
    #[must_use]
    pub fn variable_name(self) -> &'static str {
        match self {
            Self::Bin => "BIN",
            Self::Lib => "LIB",
            Self::Doc => "DOC",
            Self::Share => "SHARE",
        }
    }

    #[must_use]
    pub fn all() -> [Self; 4] {
        [Self::Bin, Self::Lib, Self::Doc, Self::Share]
    }
}

impl fmt::Display for DestinationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bin => write!(f, "bin"),
            Self::Lib => write!(f, "lib"),
            Self::Doc => write!(f, "doc"),
            Self::Share => write!(f, "share"),
        }
    }
}

/// Named step of the stage runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Configure,
    Build,
    Test,
    #[serde(rename = "smoke-run")]
    SmokeRun,
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configure => write!(f, "configure"),
            Self::Build => write!(f, "build"),
            Self::Test => write!(f, "test"),
            Self::SmokeRun => write!(f, "smoke-run"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_do_not_overlap() {
        let dirs: Vec<PathBuf> = DestinationCategory::all()
            .iter()
            .map(|c| c.relative_dir("o2l"))
            .collect();
        for (i, a) in dirs.iter().enumerate() {
            for (j, b) in dirs.iter().enumerate() {
                if i != j {
                    assert!(!a.starts_with(b), "{} overlaps {}", a.display(), b.display());
                }
            }
        }
    }

    #[test]
    fn dependency_phase_accepts_build_only_spelling() {
        let phase: DependencyPhase = serde_yml::from_str("build-only").unwrap();
        assert_eq!(phase, DependencyPhase::Build);
        let phase: DependencyPhase = serde_yml::from_str("runtime").unwrap();
        assert_eq!(phase, DependencyPhase::Runtime);
    }
}
