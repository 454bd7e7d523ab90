use kiln_types::DependencyPhase;
use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Dependency resolution events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolverEvent {
    Started {
        root: String,
    },

    /// A dependency was found already satisfied by the host
    CapabilitySatisfied {
        name: String,
        constraint: String,
        phase: DependencyPhase,
    },

    /// A dependency will be installed from a catalog recipe
    RecipeScheduled {
        name: String,
        version: String,
        phase: DependencyPhase,
        required_by: String,
    },

    Completed {
        total_steps: usize,
        to_install: usize,
    },

    Failed {
        root: String,
        failure: FailureContext,
    },
}
