use kiln_types::DestinationCategory;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Conditional installer and uninstall events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallEvent {
    Started {
        recipe: String,
        version: String,
        actions: usize,
    },

    ArtifactInstalled {
        recipe: String,
        source: PathBuf,
        destination: PathBuf,
        category: DestinationCategory,
    },

    /// Predicate evaluated false; nothing was placed
    ArtifactSkipped {
        recipe: String,
        source: PathBuf,
        predicate: String,
    },

    Completed {
        recipe: String,
        installed: usize,
        skipped: usize,
    },

    Failed {
        recipe: String,
        failure: FailureContext,
    },

    UninstallStarted {
        recipe: String,
        entries: usize,
    },

    /// An entry removed during uninstall no longer matched its recorded checksum
    ModifiedArtifactRemoved {
        recipe: String,
        destination: PathBuf,
    },

    UninstallCompleted {
        recipe: String,
        removed: usize,
    },
}
