use kiln_types::PhaseName;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Stage runner events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEvent {
    Started {
        recipe: String,
        version: String,
        source_dir: PathBuf,
        jobs: usize,
    },

    PhaseStarted {
        recipe: String,
        phase: PhaseName,
        command: String,
    },

    /// Optional phase whose required artifact is absent
    PhaseSkipped {
        recipe: String,
        phase: PhaseName,
        missing: PathBuf,
    },

    PhaseCompleted {
        recipe: String,
        phase: PhaseName,
        duration_ms: u64,
    },

    Completed {
        recipe: String,
        duration_ms: u64,
    },

    Failed {
        recipe: String,
        phase: Option<PhaseName>,
        failure: FailureContext,
    },
}
