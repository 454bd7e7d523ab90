//! Host capability queries
//!
//! A capability is a named, optionally versioned thing the host already
//! has. The resolver only ever asks one question of the host: is `name`
//! available in a version matching this spec?

use kiln_errors::{ConfigError, Error};
use kiln_types::{parse_version, Version, VersionSpec};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Answers whether the host satisfies a dependency
///
/// Implementations must be side-effect free; the resolver may ask the same
/// question several times.
pub trait CapabilityQuery: Send + Sync + fmt::Debug {
    fn is_satisfied(&self, name: &str, spec: &VersionSpec) -> bool;
}

/// Simple representation of an installed package
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    /// `None` when the recorded version is not a dotted numeric version
    pub version: Option<Version>,
}

impl InstalledPackage {
    #[must_use]
    pub fn new(name: impl Into<String>, version: Option<Version>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// A known version satisfies a spec when it matches; an unknown version
/// only satisfies the unconstrained spec
fn version_satisfies(version: Option<&Version>, spec: &VersionSpec) -> bool {
    match version {
        Some(v) => spec.matches(v),
        None => spec.is_any(),
    }
}

/// Capabilities declared in configuration (`host.provides`)
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    provides: HashMap<String, Option<Version>>,
}

impl StaticCapabilities {
    /// Parse `name` or `name@version` entries
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty name or an
    /// unparseable version.
    pub fn from_provides<S: AsRef<str>>(entries: &[S]) -> Result<Self, Error> {
        let mut provides = HashMap::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            let (name, version) = match entry.split_once('@') {
                Some((name, version)) => {
                    let parsed = parse_version(version).map_err(|_| ConfigError::InvalidValue {
                        field: "host.provides".to_string(),
                        value: entry.to_string(),
                    })?;
                    (name.trim(), Some(parsed))
                }
                None => (entry, None),
            };
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "host.provides".to_string(),
                    value: entry.to_string(),
                }
                .into());
            }
            provides.insert(name.to_string(), version);
        }
        Ok(Self { provides })
    }

    pub fn insert(&mut self, name: impl Into<String>, version: Option<Version>) {
        self.provides.insert(name.into(), version);
    }
}

impl CapabilityQuery for StaticCapabilities {
    fn is_satisfied(&self, name: &str, spec: &VersionSpec) -> bool {
        self.provides
            .get(name)
            .is_some_and(|version| version_satisfies(version.as_ref(), spec))
    }
}

/// Packages with a committed installed manifest
#[derive(Debug, Clone, Default)]
pub struct ManifestCapabilities {
    installed: HashMap<String, Option<Version>>,
}

impl ManifestCapabilities {
    #[must_use]
    pub fn new(packages: Vec<InstalledPackage>) -> Self {
        Self {
            installed: packages
                .into_iter()
                .map(|p| (p.name, p.version))
                .collect(),
        }
    }
}

impl CapabilityQuery for ManifestCapabilities {
    fn is_satisfied(&self, name: &str, spec: &VersionSpec) -> bool {
        self.installed
            .get(name)
            .is_some_and(|version| version_satisfies(version.as_ref(), spec))
    }
}

/// Executables on `PATH`
///
/// A program's version cannot be known without running it, so this only
/// satisfies unconstrained dependencies.
#[derive(Debug, Clone, Default)]
pub struct PathCapabilities {
    search_path: Option<std::ffi::OsString>,
}

impl PathCapabilities {
    /// Search the invoking process's `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Search an explicit path list instead of `PATH`
    #[must_use]
    pub fn with_search_path(search_path: impl Into<std::ffi::OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }
}

impl CapabilityQuery for PathCapabilities {
    fn is_satisfied(&self, name: &str, spec: &VersionSpec) -> bool {
        if !spec.is_any() {
            return false;
        }
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_default();
                which::which_in(name, Some(paths), cwd).is_ok()
            }
            None => which::which(name).is_ok(),
        };
        if found {
            tracing::debug!(name, "dependency satisfied by executable on PATH");
        }
        found
    }
}

/// Satisfied when any member is
#[derive(Debug, Clone, Default)]
pub struct CompositeCapabilities {
    members: Vec<Arc<dyn CapabilityQuery>>,
}

impl CompositeCapabilities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, member: Arc<dyn CapabilityQuery>) -> Self {
        self.members.push(member);
        self
    }
}

impl CapabilityQuery for CompositeCapabilities {
    fn is_satisfied(&self, name: &str, spec: &VersionSpec) -> bool {
        self.members.iter().any(|m| m.is_satisfied(name, spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> VersionSpec {
        s.parse().unwrap()
    }

    #[test]
    fn static_capabilities_respect_versions() {
        let caps = StaticCapabilities::from_provides(&["cmake@3.29.2", "pkg-config"]).unwrap();

        assert!(caps.is_satisfied("cmake", &VersionSpec::any()));
        assert!(caps.is_satisfied("cmake", &spec(">=3.20")));
        assert!(!caps.is_satisfied("cmake", &spec(">=4.0")));
        assert!(caps.is_satisfied("pkg-config", &VersionSpec::any()));
        assert!(!caps.is_satisfied("pkg-config", &spec(">=0.29")));
        assert!(!caps.is_satisfied("ninja", &VersionSpec::any()));
    }

    #[test]
    fn static_capabilities_reject_bad_entries() {
        assert!(StaticCapabilities::from_provides(&["cmake@not-a-version"]).is_err());
        assert!(StaticCapabilities::from_provides(&["@1.0"]).is_err());
    }

    #[test]
    fn manifest_capabilities_match_installed_versions() {
        let caps = ManifestCapabilities::new(vec![
            InstalledPackage::new("libffi", Some(Version::new(3, 4, 6))),
            InstalledPackage::new("weird", None),
        ]);
        assert!(caps.is_satisfied("libffi", &spec(">=3.4")));
        assert!(!caps.is_satisfied("libffi", &spec("<3.0")));
        assert!(caps.is_satisfied("weird", &VersionSpec::any()));
        assert!(!caps.is_satisfied("weird", &spec(">=1.0")));
    }

    #[test]
    fn path_capabilities_find_executables() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("mytool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let caps = PathCapabilities::with_search_path(dir.path().as_os_str());
        assert!(caps.is_satisfied("mytool", &VersionSpec::any()));
        assert!(!caps.is_satisfied("mytool", &spec(">=1.0")));
        assert!(!caps.is_satisfied("othertool", &VersionSpec::any()));
    }

    #[test]
    fn composite_is_any_of() {
        let a = StaticCapabilities::from_provides(&["cmake"]).unwrap();
        let b = ManifestCapabilities::new(vec![InstalledPackage::new(
            "libffi",
            Some(Version::new(3, 4, 6)),
        )]);
        let caps = CompositeCapabilities::new()
            .with(Arc::new(a))
            .with(Arc::new(b));

        assert!(caps.is_satisfied("cmake", &VersionSpec::any()));
        assert!(caps.is_satisfied("libffi", &VersionSpec::any()));
        assert!(!caps.is_satisfied("ninja", &VersionSpec::any()));
    }
}
