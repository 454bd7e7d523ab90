//! YAML recipe document
//!
//! A recipe is loaded once per invocation and never mutated afterwards.
//! Conditional behaviour is data: install actions carry a predicate and
//! optional phases carry the artifact they require, so nothing in the
//! document is imperative.

use kiln_hash::SourceDigest;
use kiln_types::{parse_version, DependencyPhase, DestinationCategory, Version, VersionSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Complete recipe document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Identity and descriptive metadata (required)
    pub metadata: Metadata,

    /// Source archive locator and integrity digest (required)
    pub source: Source,

    /// Hosts this recipe can be installed on (optional, empty = any)
    #[serde(default)]
    pub platform: PlatformConstraint,

    /// Declared dependencies in declaration order
    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Build environment additions
    #[serde(default)]
    pub environment: Environment,

    /// Stage runner phase commands
    #[serde(default)]
    pub phases: Phases,

    /// Conditional install actions in declaration order
    #[serde(default)]
    pub install: Vec<InstallAction>,

    /// Post-install checks; at least one is required
    #[serde(default)]
    pub verify: Vec<VerificationCheck>,

    /// Free-form values available to `${VAR}` expansion
    #[serde(default)]
    pub facts: BTreeMap<String, String>,

    /// File the recipe was loaded from, if any
    #[serde(skip)]
    pub(crate) origin: Option<PathBuf>,
}

impl Recipe {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Version parsed leniently; `None` for non-numeric version strings
    #[must_use]
    pub fn semver(&self) -> Option<Version> {
        parse_version(&self.metadata.version).ok()
    }

    /// Path of the recipe document when loaded from disk
    #[must_use]
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Directory relative source paths are resolved against
    #[must_use]
    pub fn base_dir(&self) -> Option<&Path> {
        self.origin.as_deref().and_then(Path::parent)
    }

    /// Build-only dependency names in declaration order
    #[must_use]
    pub fn build_dependencies(&self) -> Vec<String> {
        self.dependencies_with(DependencyPhase::Build)
    }

    /// Runtime dependency names in declaration order
    #[must_use]
    pub fn runtime_dependencies(&self) -> Vec<String> {
        self.dependencies_with(DependencyPhase::Runtime)
    }

    fn dependencies_with(&self, phase: DependencyPhase) -> Vec<String> {
        self.dependencies
            .iter()
            .filter(|d| d.phase == phase)
            .map(|d| d.name.clone())
            .collect()
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.metadata.name, self.metadata.version)
    }
}

/// Package metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub homepage: Option<String>,

    #[serde(default)]
    pub license: Option<String>,
}

/// Source archive locator
///
/// Exactly one of `sha256` or `blake3` is expected. An absent or placeholder
/// digest still loads so that the fetcher can refuse it explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
}

impl Source {
    /// Declared digest, if any field was present
    #[must_use]
    pub fn digest(&self) -> Option<SourceDigest> {
        match (&self.sha256, &self.blake3) {
            (Some(hex), _) => Some(SourceDigest::sha256(hex.clone())),
            (None, Some(hex)) => Some(SourceDigest::blake3(hex.clone())),
            (None, None) => None,
        }
    }

    /// Archive file name taken from the last URL segment
    #[must_use]
    pub fn file_name(&self) -> String {
        let trimmed = self.url.split(['?', '#']).next().unwrap_or_default();
        trimmed
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("source")
            .to_string()
    }
}

/// Host predicate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConstraint {
    /// Accepted operating systems (`macos`, `linux`, ...)
    #[serde(default)]
    pub os: Vec<String>,

    /// Accepted architectures (`aarch64`, `x86_64`, ...)
    #[serde(default)]
    pub arch: Vec<String>,

    /// Minimum dotted OS release, e.g. `12.0` for macOS Monterey
    #[serde(default)]
    pub min_os_version: Option<String>,
}

/// A declared dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,

    #[serde(default)]
    pub phase: DependencyPhase,

    /// Version constraint, `*` when omitted
    #[serde(default)]
    pub version: VersionSpec,
}

/// Build environment additions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    /// C++ language standard, e.g. `23` for `-std=c++23`
    #[serde(default)]
    pub cxx_standard: Option<u16>,

    /// Extra variables; these win over computed defaults
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// Phase commands; each command is a program followed by its arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Phases {
    #[serde(default)]
    pub configure: Option<Vec<String>>,

    #[serde(default)]
    pub build: Option<Vec<String>>,

    /// Runs only when `requires` exists in the source tree after building
    #[serde(default)]
    pub test: Option<OptionalPhase>,

    /// Sample-program run, gated the same way as `test`
    #[serde(default)]
    pub smoke: Option<OptionalPhase>,
}

/// A phase gated on the presence of an artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionalPhase {
    /// Path relative to the source directory
    pub requires: PathBuf,
    pub command: Vec<String>,
}

/// When an install action applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallPredicate {
    /// The artifact is required; its absence is an error
    #[default]
    Always,
    /// Any filesystem entry at the source path
    Exists,
    FileExists,
    DirExists,
}

impl InstallPredicate {
    /// Whether a false evaluation is an error rather than a skip
    #[must_use]
    pub fn is_required(self) -> bool {
        matches!(self, Self::Always)
    }
}

impl fmt::Display for InstallPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Exists => write!(f, "exists"),
            Self::FileExists => write!(f, "file_exists"),
            Self::DirExists => write!(f, "dir_exists"),
        }
    }
}

/// Copy one build output into a destination category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallAction {
    /// Path relative to the source directory
    pub source: PathBuf,

    pub category: DestinationCategory,

    #[serde(default)]
    pub when: InstallPredicate,

    /// Destination file name; defaults to the source's file name
    #[serde(default)]
    pub rename: Option<String>,
}

impl InstallAction {
    /// File name the artifact gets inside its category directory
    #[must_use]
    pub fn destination_name(&self) -> Option<String> {
        self.rename.clone().or_else(|| {
            self.source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
    }
}

/// Expected signal from a verification probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expectation {
    /// Process exits with exactly this status
    ExitCode { exit_code: i32 },
    /// Trimmed stdout equals this string
    Exact { exact: String },
    /// Stdout or stderr contains this string
    Contains { contains: String },
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitCode { exit_code } => write!(f, "exit code {exit_code}"),
            Self::Exact { exact } => write!(f, "output equal to {exact:?}"),
            Self::Contains { contains } => write!(f, "output containing {contains:?}"),
        }
    }
}

/// Post-install probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCheck {
    pub run: Vec<String>,
    pub expect: Expectation,
}
