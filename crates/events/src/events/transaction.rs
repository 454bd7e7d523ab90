use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::FailureContext;

/// Lifecycle of one install transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionEvent {
    Started {
        transaction_id: Uuid,
        root: PathBuf,
        recipes: Vec<String>,
    },

    /// Committed manifest is intact; nothing to do
    AlreadyInstalled {
        name: String,
        version: String,
    },

    RollbackStarted {
        transaction_id: Uuid,
        entries: usize,
        reason: FailureContext,
    },

    RollbackCompleted {
        transaction_id: Uuid,
        removed: usize,
        restored: usize,
    },

    RollbackFailed {
        transaction_id: Uuid,
        failure: FailureContext,
    },

    Committed {
        transaction_id: Uuid,
        manifests: Vec<String>,
    },
}
