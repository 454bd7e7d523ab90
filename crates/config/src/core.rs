//! Configuration sections shared across crates

use kiln_types::{ColorChoice, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
            color: default_color_choice(),
        }
    }
}

/// Filesystem locations
///
/// Unset paths are derived at lookup time, see [`crate::Config::install_root`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub install_root: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
    /// Directories searched for `<name>.yml` dependency recipes
    #[serde(default)]
    pub recipe_dirs: Vec<PathBuf>,
}

/// Stage runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_build_jobs")]
    pub jobs: usize, // 0 = auto-detect
    #[serde(default)]
    pub keep_build_dir: bool,
    /// Uninstall build-only dependencies after a successful install
    #[serde(default)]
    pub remove_build_dependencies: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            jobs: default_build_jobs(),
            keep_build_dir: false,
            remove_build_dependencies: false,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64, // seconds
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            user_agent: default_user_agent(),
        }
    }
}

/// Capabilities the host declares as already satisfied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Entries of the form `name` or `name@version`
    #[serde(default)]
    pub provides: Vec<String>,
}

// Default value functions for serde
fn default_output_format() -> OutputFormat {
    OutputFormat::Tty
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_build_jobs() -> usize {
    0 // 0 = auto-detect
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_user_agent() -> String {
    format!("kiln/{}", env!("CARGO_PKG_VERSION"))
}
