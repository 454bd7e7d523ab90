#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for kiln
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/kiln/config.toml)
//! - Environment variables
//! - CLI flags (applied by the caller)

pub mod core;

pub use crate::core::{BuildConfig, GeneralConfig, HostConfig, NetworkConfig, PathConfig};

use kiln_errors::{ConfigError, Error};
use kiln_types::{ColorChoice, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub host: HostConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("kiln").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this schema.
    pub fn from_toml(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// If path is provided, loads from that file.
    /// If path is None, uses the default loading behavior.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: &Option<PathBuf>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Merge overrides from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending variable.
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(output) = lookup("KILN_OUTPUT") {
            self.general.default_output = match output.as_str() {
                "plain" => OutputFormat::Plain,
                "tty" => OutputFormat::Tty,
                "json" => OutputFormat::Json,
                _ => return Err(invalid("KILN_OUTPUT", output)),
            };
        }

        if let Some(color) = lookup("KILN_COLOR") {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => return Err(invalid("KILN_COLOR", color)),
            };
        }

        if let Some(root) = lookup("KILN_INSTALL_ROOT") {
            self.paths.install_root = Some(non_empty_path("KILN_INSTALL_ROOT", root)?);
        }

        if let Some(state) = lookup("KILN_STATE_DIR") {
            self.paths.state_dir = Some(non_empty_path("KILN_STATE_DIR", state)?);
        }

        if let Some(build) = lookup("KILN_BUILD_DIR") {
            self.paths.build_dir = Some(non_empty_path("KILN_BUILD_DIR", build)?);
        }

        if let Some(jobs) = lookup("KILN_BUILD_JOBS") {
            self.build.jobs = jobs
                .parse()
                .map_err(|_| invalid("KILN_BUILD_JOBS", jobs.clone()))?;
        }

        if let Some(retries) = lookup("KILN_RETRIES") {
            self.network.retries = retries
                .parse()
                .map_err(|_| invalid("KILN_RETRIES", retries.clone()))?;
        }

        if let Some(keep) = lookup("KILN_KEEP_BUILD_DIR") {
            self.build.keep_build_dir = match keep.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(invalid("KILN_KEEP_BUILD_DIR", keep)),
            };
        }

        Ok(())
    }

    /// Root directory artifacts are installed under
    #[must_use]
    pub fn install_root(&self) -> PathBuf {
        self.paths.install_root.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("kiln")
        })
    }

    /// Directory holding manifests and logs
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.paths
            .state_dir
            .clone()
            .unwrap_or_else(|| self.install_root().join("var").join("kiln"))
    }

    /// Parent directory for per-recipe work directories
    #[must_use]
    pub fn build_dir(&self) -> PathBuf {
        self.paths
            .build_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("kiln-build"))
    }

    #[must_use]
    pub fn manifests_dir(&self) -> PathBuf {
        self.state_dir().join("manifests")
    }

    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir().join("logs")
    }

    /// Effective parallel job count for builds
    #[must_use]
    pub fn build_jobs(&self) -> usize {
        calculate_build_jobs(self.build.jobs)
    }
}

fn invalid(field: &str, value: String) -> Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value,
    }
    .into()
}

fn non_empty_path(field: &str, value: String) -> Result<PathBuf, Error> {
    if value.trim().is_empty() {
        Err(invalid(field, value))
    } else {
        Ok(PathBuf::from(value))
    }
}

/// Calculate build jobs based on CPU count
#[must_use]
pub fn calculate_build_jobs(config_value: usize) -> usize {
    if config_value > 0 {
        config_value // User override
    } else {
        // Use 75% of CPUs for builds, minimum 1
        let cpus = num_cpus::get();
        (cpus * 3 / 4).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_derive_paths_from_install_root() {
        let mut config = Config::default();
        config.paths.install_root = Some(PathBuf::from("/tmp/root"));

        assert_eq!(config.state_dir(), PathBuf::from("/tmp/root/var/kiln"));
        assert_eq!(
            config.manifests_dir(),
            PathBuf::from("/tmp/root/var/kiln/manifests")
        );
        assert!(config.build_jobs() >= 1);
        assert_eq!(config.network.retries, 3);
    }

    #[test]
    fn file_sections_are_optional() {
        let config = Config::from_toml(
            r#"
            [paths]
            install_root = "/srv/kiln"
            recipe_dirs = ["/srv/recipes"]

            [host]
            provides = ["cmake@3.28.1", "ninja"]
            "#,
        )
        .unwrap();

        assert_eq!(config.install_root(), PathBuf::from("/srv/kiln"));
        assert_eq!(config.paths.recipe_dirs.len(), 1);
        assert_eq!(config.host.provides, vec!["cmake@3.28.1", "ninja"]);
        assert_eq!(config.general.default_output, OutputFormat::Tty);
        assert!(!config.build.keep_build_dir);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let err = Config::from_toml("[build]\njobs = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ParseError { .. })));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = Config::from_toml("[build]\njobs = 2").unwrap();
        config
            .merge_env_from(env(&[
                ("KILN_BUILD_JOBS", "8"),
                ("KILN_OUTPUT", "json"),
                ("KILN_INSTALL_ROOT", "/opt/kiln"),
                ("KILN_KEEP_BUILD_DIR", "yes"),
                ("KILN_RETRIES", "0"),
            ]))
            .unwrap();

        assert_eq!(config.build.jobs, 8);
        assert_eq!(config.general.default_output, OutputFormat::Json);
        assert_eq!(config.install_root(), PathBuf::from("/opt/kiln"));
        assert!(config.build.keep_build_dir);
        assert_eq!(config.network.retries, 0);
    }

    #[test]
    fn invalid_environment_value_names_the_variable() {
        let mut config = Config::default();
        let err = config
            .merge_env_from(env(&[("KILN_COLOR", "sometimes")]))
            .unwrap_err();
        match err {
            Error::Config(ConfigError::InvalidValue { field, value }) => {
                assert_eq!(field, "KILN_COLOR");
                assert_eq!(value, "sometimes");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_from_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_or_default(&Some(dir.path().join("absent.toml")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NotFound { .. })));
    }

    #[test]
    fn explicit_jobs_win_over_detection() {
        assert_eq!(calculate_build_jobs(6), 6);
        assert!(calculate_build_jobs(0) >= 1);
    }
}
