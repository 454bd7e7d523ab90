//! Stage runner: configure, build, test and smoke-run as external processes
//!
//! Phases run strictly in order. A nonzero exit status is the only failure
//! signal and is terminal: no later phase runs. Optional phases whose
//! required artifact is absent are skipped without failing.

use crate::environment::BuildEnvironment;
use kiln_errors::{BuildError, Error};
use kiln_events::{AppEvent, BuildEvent, EventEmitter, EventSender, FailureContext};
use kiln_platform::{Platform, PlatformContext};
use kiln_recipe::{Recipe, Variables};
use kiln_types::PhaseName;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Lines of stderr kept on a failed phase
const STDERR_TAIL_LINES: usize = 20;

/// Stage runner state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Configuring,
    Building,
    Testing,
    SmokeRunning,
    Succeeded,
    Failed {
        phase: PhaseName,
        exit_status: Option<i32>,
    },
}

impl StageState {
    fn running(phase: PhaseName) -> Self {
        match phase {
            PhaseName::Configure => Self::Configuring,
            PhaseName::Build => Self::Building,
            PhaseName::Test => Self::Testing,
            PhaseName::SmokeRun => Self::SmokeRunning,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

/// What happened to one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PhaseOutcome {
    Succeeded { duration_ms: u64 },
    /// Not declared, or its required artifact is absent
    Skipped { reason: String },
    Failed { exit_status: Option<i32> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: PhaseName,
    pub outcome: PhaseOutcome,
}

/// Result of one stage run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub recipe: String,
    pub phases: Vec<PhaseRecord>,
    /// Every state entered, starting with `Pending`
    pub history: Vec<StageState>,
    pub duration_ms: u64,
    #[serde(skip)]
    failure: Option<BuildError>,
}

impl StageReport {
    fn new(recipe: &str) -> Self {
        Self {
            recipe: recipe.to_string(),
            phases: Vec::new(),
            history: vec![StageState::Pending],
            duration_ms: 0,
            failure: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &StageState {
        self.history.last().unwrap_or(&StageState::Pending)
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        *self.state() == StageState::Succeeded
    }

    #[must_use]
    pub fn outcome(&self, phase: PhaseName) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|r| r.phase == phase)
            .map(|r| &r.outcome)
    }

    #[must_use]
    pub fn failure(&self) -> Option<&BuildError> {
        self.failure.as_ref()
    }

    /// The report on success, the phase error otherwise
    ///
    /// # Errors
    ///
    /// Returns the `BuildError` of the failed phase.
    pub fn into_result(self) -> Result<Self, Error> {
        match self.failure {
            Some(err) => Err(err.into()),
            None => Ok(self),
        }
    }

    fn transition(&mut self, state: StageState) {
        tracing::trace!(recipe = %self.recipe, ?state, "stage transition");
        self.history.push(state);
    }

    fn record(&mut self, phase: PhaseName, outcome: PhaseOutcome) {
        self.phases.push(PhaseRecord { phase, outcome });
    }
}

/// A phase ready to run
struct PlannedPhase {
    phase: PhaseName,
    command: Vec<String>,
    requires: Option<PathBuf>,
}

/// Runs a recipe's phases in its unpacked source directory
#[derive(Clone)]
pub struct StageRunner {
    platform: Arc<Platform>,
    event_sender: Option<EventSender>,
}

impl std::fmt::Debug for StageRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRunner").finish_non_exhaustive()
    }
}

impl EventEmitter for StageRunner {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl StageRunner {
    #[must_use]
    pub fn new(platform: Arc<Platform>) -> Self {
        Self {
            platform,
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, event_sender: Option<EventSender>) -> Self {
        self.event_sender = event_sender;
        self
    }

    /// Run every phase and fail on the first phase error
    ///
    /// `env` is consumed; it only ever exists on the child commands of this
    /// run and is dropped when the run ends.
    ///
    /// # Errors
    ///
    /// Returns `PhaseFailed` for a nonzero exit, a signal, or a program that
    /// cannot be spawned, and `EmptyCommand` for a phase without a program.
    pub async fn run(
        &self,
        recipe: &Recipe,
        source_dir: &Path,
        env: BuildEnvironment,
        vars: &Variables,
    ) -> Result<StageReport, Error> {
        self.execute(recipe, source_dir, env, vars)
            .await
            .into_result()
    }

    /// Run every phase, reporting failure inside the returned report
    pub async fn execute(
        &self,
        recipe: &Recipe,
        source_dir: &Path,
        env: BuildEnvironment,
        vars: &Variables,
    ) -> StageReport {
        let start = Instant::now();
        let mut report = StageReport::new(recipe.name());
        let ctx = self.platform.create_context(self.event_sender.clone());

        self.emit(AppEvent::Build(BuildEvent::Started {
            recipe: recipe.name().to_string(),
            version: recipe.version().to_string(),
            source_dir: source_dir.to_path_buf(),
            jobs: env
                .get("JOBS")
                .and_then(|j| j.parse().ok())
                .unwrap_or(1),
        }));

        for planned in plan_phases(recipe, vars) {
            let phase = planned.phase;

            if planned.command.is_empty() {
                let reason = "not declared".to_string();
                report.record(phase, PhaseOutcome::Skipped { reason });
                continue;
            }

            if let Some(requires) = &planned.requires {
                if !path_present(&source_dir.join(requires)).await {
                    self.emit(AppEvent::Build(BuildEvent::PhaseSkipped {
                        recipe: recipe.name().to_string(),
                        phase,
                        missing: requires.clone(),
                    }));
                    let reason = format!("{} not present", requires.display());
                    report.record(phase, PhaseOutcome::Skipped { reason });
                    continue;
                }
            }

            report.transition(StageState::running(phase));
            match self
                .run_phase(&ctx, recipe, phase, &planned.command, source_dir, &env)
                .await
            {
                Ok(duration_ms) => {
                    report.record(phase, PhaseOutcome::Succeeded { duration_ms });
                }
                Err(err) => {
                    let exit_status = match &err {
                        BuildError::PhaseFailed { exit_status, .. } => *exit_status,
                        _ => None,
                    };
                    self.emit(AppEvent::Build(BuildEvent::Failed {
                        recipe: recipe.name().to_string(),
                        phase: Some(phase),
                        failure: FailureContext::from_error(&err),
                    }));
                    report.record(phase, PhaseOutcome::Failed { exit_status });
                    report.transition(StageState::Failed { phase, exit_status });
                    report.failure = Some(err);
                    report.duration_ms = elapsed_ms(start);
                    return report;
                }
            }
        }

        report.transition(StageState::Succeeded);
        report.duration_ms = elapsed_ms(start);
        self.emit(AppEvent::Build(BuildEvent::Completed {
            recipe: recipe.name().to_string(),
            duration_ms: report.duration_ms,
        }));
        report
    }

    async fn run_phase(
        &self,
        ctx: &PlatformContext,
        recipe: &Recipe,
        phase: PhaseName,
        command: &[String],
        source_dir: &Path,
        env: &BuildEnvironment,
    ) -> Result<u64, BuildError> {
        let Some((program, args)) = command.split_first() else {
            return Err(BuildError::EmptyCommand {
                phase: phase.to_string(),
            });
        };

        let mut cmd = self.platform.command(&resolve_program(program, source_dir));
        cmd.args(args).current_dir(source_dir).kill_on_drop(true);
        env.apply(&mut cmd);

        self.emit(AppEvent::Build(BuildEvent::PhaseStarted {
            recipe: recipe.name().to_string(),
            phase,
            command: cmd.display(),
        }));

        let start = Instant::now();
        let output = self
            .platform
            .execute_command(ctx, cmd)
            .await
            .map_err(|e| BuildError::PhaseFailed {
                phase: phase.to_string(),
                exit_status: None,
                stderr_tail: e.to_string(),
            })?;

        if !output.success() {
            return Err(BuildError::PhaseFailed {
                phase: phase.to_string(),
                exit_status: output.exit_code(),
                stderr_tail: output.stderr_tail(STDERR_TAIL_LINES),
            });
        }

        let duration_ms = elapsed_ms(start);
        self.emit(AppEvent::Build(BuildEvent::PhaseCompleted {
            recipe: recipe.name().to_string(),
            phase,
            duration_ms,
        }));
        Ok(duration_ms)
    }
}

/// Phases in execution order with expanded commands
fn plan_phases(recipe: &Recipe, vars: &Variables) -> Vec<PlannedPhase> {
    let phases = &recipe.phases;
    let required = |phase, command: &Option<Vec<String>>| PlannedPhase {
        phase,
        command: command
            .as_deref()
            .map(|c| vars.expand_all(c))
            .unwrap_or_default(),
        requires: None,
    };
    let optional = |phase, opt: &Option<kiln_recipe::OptionalPhase>| match opt {
        Some(opt) => PlannedPhase {
            phase,
            command: vars.expand_all(&opt.command),
            requires: Some(PathBuf::from(vars.expand(&opt.requires.to_string_lossy()))),
        },
        None => PlannedPhase {
            phase,
            command: Vec::new(),
            requires: None,
        },
    };

    vec![
        required(PhaseName::Configure, &phases.configure),
        required(PhaseName::Build, &phases.build),
        optional(PhaseName::Test, &phases.test),
        optional(PhaseName::SmokeRun, &phases.smoke),
    ]
}

/// Relative programs with a directory part are taken from the source tree
fn resolve_program(program: &str, source_dir: &Path) -> String {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        source_dir.join(path).display().to_string()
    } else {
        program.to_string()
    }
}

async fn path_present(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
