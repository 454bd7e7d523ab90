//! Description of the machine recipes are installed on

use serde::{Deserialize, Serialize};

/// Operating system, architecture and OS release of the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// `std::env::consts::OS` spelling: `macos`, `linux`, ...
    pub os: String,
    /// `std::env::consts::ARCH` spelling: `aarch64`, `x86_64`, ...
    pub arch: String,
    /// Dotted OS release such as `14.5`, when the host reports one
    pub os_version: Option<String>,
}

impl HostInfo {
    /// Inspect the running host
    #[must_use]
    pub fn detect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            os_version: sysinfo::System::os_version(),
        }
    }

    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>, os_version: Option<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            os_version,
        }
    }
}

impl std::fmt::Display for HostInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.os_version {
            Some(version) => write!(f, "{} {} ({})", self.os, version, self.arch),
            None => write!(f, "{} ({})", self.os, self.arch),
        }
    }
}
