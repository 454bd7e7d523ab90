use serde::{Deserialize, Serialize};

/// Post-install verification events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VerifyEvent {
    CheckStarted {
        recipe: String,
        check_index: usize,
        command: String,
    },

    CheckPassed {
        recipe: String,
        check_index: usize,
    },

    CheckFailed {
        recipe: String,
        check_index: usize,
        expected: String,
        actual: String,
    },

    Completed {
        recipe: String,
        checks: usize,
    },
}
