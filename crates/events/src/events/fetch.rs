use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Source acquisition, verification and unpacking events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchEvent {
    Started {
        recipe: String,
        uri: String,
    },

    /// A retryable transport failure; another attempt follows after `delay_ms`
    Retrying {
        uri: String,
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
        failure: FailureContext,
    },

    Verified {
        recipe: String,
        uri: String,
        digest: String,
        bytes: u64,
    },

    Unpacked {
        recipe: String,
        source_dir: PathBuf,
        entries: usize,
    },

    Failed {
        recipe: String,
        uri: String,
        failure: FailureContext,
    },
}
