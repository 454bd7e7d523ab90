//! Version specification and constraint parsing
//!
//! Dependency constraints use a comparison-operator syntax:
//! - `==1.2.3` - Exact version
//! - `>=1.2.0` - Minimum version
//! - `<=2.0.0` - Maximum version
//! - `~=1.2.0` - Compatible release (>=1.2.0,<1.3.0)
//! - `!=1.5.0` - Exclude version
//! - Multiple constraints: `>=1.2,<2.0,!=1.5.0`
//!
//! Upstream projects rarely publish strict three-part versions, so
//! `parse_version` accepts `1`, `1.14` and `v3.2` and pads them to semver.

use kiln_errors::VersionError;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parse a version leniently, padding missing minor/patch components
///
/// # Errors
///
/// Returns an error if the input is not a dotted numeric version with an
/// optional pre-release or build suffix.
pub fn parse_version(input: &str) -> Result<Version, VersionError> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(VersionError::InvalidVersion {
            input: input.to_string(),
        });
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).map_err(|e| VersionError::ParseError {
        message: format!("{input}: {e}"),
    })
}

/// A single version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    Exact(Version),
    GreaterEqual(Version),
    LessEqual(Version),
    Greater(Version),
    Less(Version),
    Compatible(Version),
    NotEqual(Version),
}

impl VersionConstraint {
    /// Check if a version satisfies this constraint
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => version == v,
            Self::GreaterEqual(v) => version >= v,
            Self::LessEqual(v) => version <= v,
            Self::Greater(v) => version > v,
            Self::Less(v) => version < v,
            Self::NotEqual(v) => version != v,
            // ~=1.2.3 allows patch updates only: >=1.2.3,<1.3.0
            Self::Compatible(v) => {
                version >= v && version.major == v.major && version.minor == v.minor
            }
        }
    }

    /// Parse a single constraint from a string
    fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();

        // Two-character operators must be tried before their one-character prefixes
        let operators: [(&str, fn(Version) -> Self); 7] = [
            ("==", Self::Exact),
            (">=", Self::GreaterEqual),
            ("<=", Self::LessEqual),
            ("!=", Self::NotEqual),
            ("~=", Self::Compatible),
            (">", Self::Greater),
            ("<", Self::Less),
        ];

        for (op, build) in operators {
            if let Some(version_str) = s.strip_prefix(op) {
                return parse_version(version_str).map(build);
            }
        }

        Err(VersionError::InvalidConstraint {
            input: s.to_string(),
        })
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "=={v}"),
            Self::GreaterEqual(v) => write!(f, ">={v}"),
            Self::LessEqual(v) => write!(f, "<={v}"),
            Self::Greater(v) => write!(f, ">{v}"),
            Self::Less(v) => write!(f, "<{v}"),
            Self::Compatible(v) => write!(f, "~={v}"),
            Self::NotEqual(v) => write!(f, "!={v}"),
        }
    }
}

/// A version specification that can contain multiple constraints
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionSpec {
    constraints: Vec<VersionConstraint>,
}

impl VersionSpec {
    /// A spec accepting every version
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Create a version spec from a single constraint
    #[must_use]
    pub fn single(constraint: VersionConstraint) -> Self {
        Self {
            constraints: vec![constraint],
        }
    }

    /// Create an exact version spec
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self::single(VersionConstraint::Exact(version))
    }

    /// Check if a version satisfies all constraints
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| c.matches(version))
    }

    /// Get the constraints
    #[must_use]
    pub fn constraints(&self) -> &[VersionConstraint] {
        &self.constraints
    }

    /// Check if this spec has any constraints
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl FromStr for VersionSpec {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(Self::any());
        }

        let constraints = s
            .split(',')
            .map(|part| VersionConstraint::parse(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { constraints })
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            write!(f, "*")
        } else {
            let strs: Vec<_> = self.constraints.iter().map(ToString::to_string).collect();
            write!(f, "{}", strs.join(","))
        }
    }
}

impl Serialize for VersionSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
