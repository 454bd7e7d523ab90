use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Recipe loading and validation events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecipeEvent {
    Loaded {
        name: String,
        version: String,
        path: PathBuf,
    },

    /// Platform predicate evaluated against the host
    PlatformChecked {
        name: String,
        host_os: String,
        host_arch: String,
        host_os_version: Option<String>,
        supported: bool,
    },

    Rejected {
        path: PathBuf,
        failure: FailureContext,
    },
}
