//! Process operations on tokio
//!
//! Every execution is bracketed by platform events so the CLI can log the
//! exact command line, duration and output sizes of each external tool.

use async_trait::async_trait;
use kiln_errors::{Error, PlatformError};
use kiln_events::{AppEvent, PlatformEvent};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::core::PlatformContext;
use crate::process::{CommandOutput, PlatformCommand, ProcessOperations};

/// Process operations backed by `tokio::process`
pub struct NativeProcessOperations;

impl NativeProcessOperations {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeProcessOperations {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl ProcessOperations for NativeProcessOperations {
    async fn execute_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, Error> {
        let start = Instant::now();

        ctx.emit_event(AppEvent::Platform(PlatformEvent::ProcessExecutionStarted {
            command: cmd.program().to_string(),
            args: cmd.get_args().to_vec(),
            working_dir: cmd
                .get_current_dir()
                .map(|dir| dir.display().to_string()),
        }));

        let result: Result<CommandOutput, PlatformError> = async {
            let mut command = Command::new(cmd.program());
            command
                .args(cmd.get_args())
                .stdin(Stdio::null())
                .kill_on_drop(cmd.kills_on_drop());

            if cmd.clears_env() {
                command.env_clear();
            }

            if let Some(dir) = cmd.get_current_dir() {
                command.current_dir(dir);
            }

            command.envs(cmd.get_env_vars());

            let output =
                command
                    .output()
                    .await
                    .map_err(|e| PlatformError::ProcessExecutionFailed {
                        command: cmd.program().to_string(),
                        message: e.to_string(),
                    })?;

            Ok(CommandOutput {
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
        .await;

        let duration_ms = duration_to_millis(start.elapsed());

        match &result {
            Ok(output) => {
                tracing::trace!(command = cmd.program(), exit_code = ?output.exit_code(), duration_ms, "process exited");
                ctx.emit_event(AppEvent::Platform(PlatformEvent::ProcessExecutionCompleted {
                    command: cmd.program().to_string(),
                    exit_code: output.exit_code(),
                    duration_ms,
                    stdout_bytes: output.stdout.len(),
                    stderr_bytes: output.stderr.len(),
                }));
            }
            Err(e) => {
                tracing::debug!(command = cmd.program(), error = %e, "process failed to start");
                ctx.emit_event(AppEvent::Platform(PlatformEvent::ProcessExecutionFailed {
                    command: cmd.program().to_string(),
                    error_message: e.to_string(),
                    duration_ms,
                }));
            }
        }

        result.map_err(Error::from)
    }

    fn create_command(&self, program: &str) -> PlatformCommand {
        PlatformCommand::new(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_events::EventEmitter as _;

    #[tokio::test]
    async fn child_sees_only_the_scoped_environment() {
        let ops = NativeProcessOperations::new();
        let ctx = PlatformContext::new(None);
        let mut cmd = ops.create_command("/bin/sh");
        cmd.args(["-c", "printf '%s|%s' \"$KILN_PROBE\" \"$HOME\""])
            .env_clear()
            .env("KILN_PROBE", "scoped");

        let output = ops.execute_command(&ctx, cmd).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout_lossy(), "scoped|");
        assert!(std::env::var("KILN_PROBE").is_err());
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_raised() {
        let ops = NativeProcessOperations::new();
        let (tx, mut rx) = kiln_events::channel();
        let ctx = PlatformContext::new(Some(tx));
        ctx.emit_debug("starting");
        let mut cmd = ops.create_command("/bin/sh");
        cmd.args(["-c", "echo one >&2; echo two >&2; exit 3"]);

        let output = ops.execute_command(&ctx, cmd).await.unwrap();
        assert_eq!(output.exit_code(), Some(3));
        assert_eq!(output.stderr_tail(1), "two");

        let mut saw_completed = false;
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Platform(PlatformEvent::ProcessExecutionCompleted {
                exit_code, ..
            }) = event
            {
                assert_eq!(exit_code, Some(3));
                saw_completed = true;
            }
        }
        assert!(saw_completed);
    }

    #[tokio::test]
    async fn missing_program_is_an_execution_failure() {
        let ops = NativeProcessOperations::new();
        let ctx = PlatformContext::new(None);
        let cmd = ops.create_command("/nonexistent/kiln-tool");
        let err = ops.execute_command(&ctx, cmd).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Platform(PlatformError::ProcessExecutionFailed { .. })
        ));
    }
}
