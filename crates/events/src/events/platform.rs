//! External process events

use serde::{Deserialize, Serialize};

/// Events raised around every external process the engine spawns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    ProcessExecutionStarted {
        command: String,
        args: Vec<String>,
        working_dir: Option<String>,
    },

    ProcessExecutionCompleted {
        command: String,
        /// `None` when the process was terminated by a signal
        exit_code: Option<i32>,
        duration_ms: u64,
        stdout_bytes: usize,
        stderr_bytes: usize,
    },

    /// The process could not be spawned or waited on
    ProcessExecutionFailed {
        command: String,
        error_message: String,
        duration_ms: u64,
    },
}
