//! Post-install verification harness

use kiln_errors::{Error, VerifyError};
use kiln_events::{AppEvent, EventEmitter, EventSender, VerifyEvent};
use kiln_platform::{CommandOutput, Platform};
use kiln_recipe::{Expectation, Recipe, VerificationCheck, Variables};
use std::path::Path;
use std::sync::Arc;

const SYSTEM_PATH: &[&str] = &["/usr/local/bin", "/usr/bin", "/bin", "/usr/sbin", "/sbin"];
const PASSTHROUGH_VARS: &[&str] = &["HOME", "LANG", "LC_ALL", "TMPDIR"];

/// Longest slice of probe output quoted in a failure
const ACTUAL_LIMIT: usize = 512;

/// Runs a recipe's verification checks against its installed artifacts
#[derive(Clone)]
pub struct VerificationHarness {
    platform: Arc<Platform>,
    event_sender: Option<EventSender>,
}

impl std::fmt::Debug for VerificationHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationHarness").finish_non_exhaustive()
    }
}

impl EventEmitter for VerificationHarness {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl VerificationHarness {
    #[must_use]
    pub fn new(platform: Arc<Platform>, event_sender: Option<EventSender>) -> Self {
        Self {
            platform,
            event_sender,
        }
    }

    /// Run every check in order, stopping at the first failure
    ///
    /// Returns the number of checks that passed.
    ///
    /// # Errors
    ///
    /// Returns `VerificationFailed` with the index of the first failing check.
    pub async fn run(&self, recipe: &Recipe, root: &Path, vars: &Variables) -> Result<usize, Error> {
        for (index, check) in recipe.verify.iter().enumerate() {
            if let Err((expected, actual)) = self.run_check(recipe, index, check, root, vars).await {
                self.emit(AppEvent::Verify(VerifyEvent::CheckFailed {
                    recipe: recipe.name().to_string(),
                    check_index: index,
                    expected: expected.clone(),
                    actual: actual.clone(),
                }));
                return Err(VerifyError::VerificationFailed {
                    check_index: index,
                    expected,
                    actual,
                }
                .into());
            }
            self.emit(AppEvent::Verify(VerifyEvent::CheckPassed {
                recipe: recipe.name().to_string(),
                check_index: index,
            }));
        }

        self.emit(AppEvent::Verify(VerifyEvent::Completed {
            recipe: recipe.name().to_string(),
            checks: recipe.verify.len(),
        }));
        Ok(recipe.verify.len())
    }

    /// `Err((expected, actual))` when the check fails
    async fn run_check(
        &self,
        recipe: &Recipe,
        index: usize,
        check: &VerificationCheck,
        root: &Path,
        vars: &Variables,
    ) -> Result<(), (String, String)> {
        let expected = check.expect.to_string();
        let argv = vars.expand_all(&check.run);
        let Some((program, args)) = argv.split_first() else {
            return Err((expected, "empty command".to_string()));
        };

        let mut cmd = self.platform.command(&resolve_program(program, root));
        cmd.args(args)
            .current_dir(root)
            .env_clear()
            .env("PATH", probe_path(root))
            .kill_on_drop(true);
        for key in PASSTHROUGH_VARS {
            if let Ok(value) = std::env::var(key) {
                cmd.env(*key, value);
            }
        }

        self.emit(AppEvent::Verify(VerifyEvent::CheckStarted {
            recipe: recipe.name().to_string(),
            check_index: index,
            command: cmd.display(),
        }));

        let ctx = self.platform.create_context(self.event_sender.clone());
        let output = self
            .platform
            .execute_command(&ctx, cmd)
            .await
            .map_err(|e| (expected.clone(), e.to_string()))?;

        match evaluate(&check.expect, &output) {
            Ok(()) => Ok(()),
            Err(actual) => Err((expected, actual)),
        }
    }
}

/// Compare a probe's output with its expectation; `Err` carries what was seen
fn evaluate(expect: &Expectation, output: &CommandOutput) -> Result<(), String> {
    let status = describe_status(output);
    match expect {
        Expectation::ExitCode { exit_code } => {
            if output.exit_code() == Some(*exit_code) {
                Ok(())
            } else {
                Err(status)
            }
        }
        Expectation::Exact { exact } => {
            let stdout = output.stdout_lossy();
            if !output.success() {
                Err(format!("{status}: {}", clip(stdout.trim())))
            } else if stdout.trim() == exact {
                Ok(())
            } else {
                Err(clip(stdout.trim()))
            }
        }
        Expectation::Contains { contains } => {
            let stdout = output.stdout_lossy();
            let stderr = output.stderr_lossy();
            // Streams are matched separately so a needle cannot straddle them.
            let found = stdout.contains(contains.as_str()) || stderr.contains(contains.as_str());
            let seen = format!("{}\n{}", stdout.trim(), stderr.trim());
            if !output.success() {
                Err(format!("{status}: {}", clip(seen.trim())))
            } else if found {
                Ok(())
            } else {
                Err(clip(seen.trim()))
            }
        }
    }
}

fn describe_status(output: &CommandOutput) -> String {
    match output.exit_code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn clip(text: &str) -> String {
    if text.len() <= ACTUAL_LIMIT {
        return text.to_string();
    }
    let mut end = ACTUAL_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

fn probe_path(root: &Path) -> String {
    let root_bin = root.join("bin").display().to_string();
    std::iter::once(root_bin.as_str())
        .chain(SYSTEM_PATH.iter().copied())
        .collect::<Vec<_>>()
        .join(":")
}

fn resolve_program(program: &str, root: &Path) -> String {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        root.join(path).display().to_string()
    } else {
        program.to_string()
    }
}
