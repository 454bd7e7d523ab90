//! Event handling and status display

use crate::logging::log_event_with_tracing;
use console::{style, Term};
use kiln_events::{
    AppEvent, BuildEvent, FetchEvent, GeneralEvent, InstallEvent, RecipeEvent, ResolverEvent,
    TransactionEvent, VerifyEvent,
};

/// Event handler for user feedback
pub struct EventHandler {
    term: Term,
    colors_enabled: bool,
    /// Suppress status lines so stdout/stderr stay machine-readable
    quiet: bool,
    /// Show debug-level detail (process spawns, skipped artifacts)
    verbose: bool,
}

impl EventHandler {
    /// Create new event handler
    pub fn new(colors_enabled: bool, quiet: bool, verbose: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors_enabled,
            quiet,
            verbose,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, event: AppEvent) {
        log_event_with_tracing(&event);
        if self.quiet {
            return;
        }
        if let Some(line) = self.describe(&event) {
            let _ = self.term.write_line(&line);
        }
    }

    /// Human status line for an event, if it warrants one
    fn describe(&self, event: &AppEvent) -> Option<String> {
        match event {
            AppEvent::General(general) => self.describe_general(general),
            AppEvent::Recipe(RecipeEvent::Loaded { name, version, .. }) => {
                Some(self.status(&format!("Loaded {name} {version}")))
            }
            AppEvent::Recipe(RecipeEvent::Rejected { path, failure }) => Some(self.error(&format!(
                "Rejected {}: {}",
                path.display(),
                failure.message
            ))),
            AppEvent::Resolver(ResolverEvent::Completed {
                total_steps,
                to_install,
            }) => Some(self.status(&format!(
                "Resolved {total_steps} steps, {to_install} to install"
            ))),
            AppEvent::Resolver(ResolverEvent::CapabilitySatisfied { name, .. }) if self.verbose => {
                Some(self.detail(&format!("{name} provided by host")))
            }
            AppEvent::Fetch(fetch) => self.describe_fetch(fetch),
            AppEvent::Build(build) => self.describe_build(build),
            AppEvent::Install(install) => self.describe_install(install),
            AppEvent::Verify(verify) => self.describe_verify(verify),
            AppEvent::Transaction(txn) => self.describe_transaction(txn),
            _ => None,
        }
    }

    fn describe_general(&self, event: &GeneralEvent) -> Option<String> {
        match event {
            GeneralEvent::Warning { message, context } => Some(self.warning(&match context {
                Some(context) => format!("{message} ({context})"),
                None => message.clone(),
            })),
            GeneralEvent::DebugLog { .. } => None,
        }
    }

    fn describe_fetch(&self, event: &FetchEvent) -> Option<String> {
        match event {
            FetchEvent::Started { recipe, uri } => {
                Some(self.status(&format!("Fetching {recipe} from {uri}")))
            }
            FetchEvent::Retrying {
                attempt,
                max_attempts,
                delay_ms,
                failure,
                ..
            } => Some(self.warning(&format!(
                "Fetch attempt {attempt}/{max_attempts} failed ({}), retrying in {delay_ms}ms",
                failure.message
            ))),
            FetchEvent::Verified { digest, bytes, .. } => {
                Some(self.detail(&format!("Verified {bytes} bytes ({digest})")))
            }
            FetchEvent::Unpacked { entries, .. } if self.verbose => {
                Some(self.detail(&format!("Unpacked {entries} entries")))
            }
            FetchEvent::Failed {
                recipe, failure, ..
            } => Some(self.error(&format!("Fetch of {recipe} failed: {}", failure.message))),
            _ => None,
        }
    }

    fn describe_build(&self, event: &BuildEvent) -> Option<String> {
        match event {
            BuildEvent::Started {
                recipe,
                version,
                jobs,
                ..
            } => Some(self.status(&format!("Building {recipe} {version} ({jobs} jobs)"))),
            BuildEvent::PhaseStarted { phase, command, .. } => {
                Some(self.detail(&format!("{phase}: {command}")))
            }
            BuildEvent::PhaseSkipped { phase, missing, .. } => Some(self.detail(&format!(
                "{phase}: skipped, {} not present",
                missing.display()
            ))),
            BuildEvent::Failed {
                recipe,
                phase,
                failure,
            } => Some(self.error(&match phase {
                Some(phase) => format!("{recipe} {phase} failed: {}", failure.message),
                None => format!("{recipe} build failed: {}", failure.message),
            })),
            _ => None,
        }
    }

    fn describe_install(&self, event: &InstallEvent) -> Option<String> {
        match event {
            InstallEvent::ArtifactInstalled { destination, .. } => {
                Some(self.detail(&format!("+ {}", destination.display())))
            }
            InstallEvent::ArtifactSkipped {
                source, predicate, ..
            } if self.verbose => Some(self.detail(&format!(
                "- {} ({predicate} is false)",
                source.display()
            ))),
            InstallEvent::Completed {
                recipe,
                installed,
                skipped,
            } => Some(self.status(&format!(
                "Placed {installed} artifacts for {recipe} ({skipped} skipped)"
            ))),
            InstallEvent::Failed { recipe, failure } => Some(self.error(&format!(
                "Install of {recipe} failed: {}",
                failure.message
            ))),
            InstallEvent::ModifiedArtifactRemoved {
                recipe,
                destination,
            } => Some(self.warning(&format!(
                "{recipe}: {} was modified since install and was removed anyway",
                destination.display()
            ))),
            InstallEvent::UninstallCompleted { recipe, removed } => {
                Some(self.success(&format!("Uninstalled {recipe} ({removed} entries)")))
            }
            _ => None,
        }
    }

    fn describe_verify(&self, event: &VerifyEvent) -> Option<String> {
        match event {
            VerifyEvent::CheckStarted { command, .. } => {
                Some(self.detail(&format!("probe: {command}")))
            }
            VerifyEvent::CheckFailed {
                recipe,
                check_index,
                expected,
                actual,
            } => Some(self.error(&format!(
                "{recipe} check {check_index} failed: expected {expected}, got {actual}"
            ))),
            VerifyEvent::Completed { recipe, checks } => {
                Some(self.status(&format!("Verified {recipe} ({checks} checks)")))
            }
            _ => None,
        }
    }

    fn describe_transaction(&self, event: &TransactionEvent) -> Option<String> {
        match event {
            TransactionEvent::AlreadyInstalled { name, version } => {
                Some(self.success(&format!("{name} {version} is already installed")))
            }
            TransactionEvent::RollbackStarted { reason, .. } => Some(self.warning(&format!(
                "Rolling back: {}",
                reason.message
            ))),
            TransactionEvent::RollbackCompleted {
                removed, restored, ..
            } => Some(self.warning(&format!(
                "Rolled back ({removed} removed, {restored} restored)"
            ))),
            TransactionEvent::RollbackFailed { failure, .. } => Some(self.error(&format!(
                "Rollback failed: {}",
                failure.message
            ))),
            TransactionEvent::Committed { manifests, .. } => {
                Some(self.success(&format!("Installed {}", manifests.join(", "))))
            }
            TransactionEvent::Started { .. } => None,
        }
    }

    fn status(&self, message: &str) -> String {
        self.paint(message, |s| s.cyan().to_string())
    }

    fn detail(&self, message: &str) -> String {
        self.paint(&format!("  {message}"), |s| s.dim().to_string())
    }

    fn success(&self, message: &str) -> String {
        self.paint(message, |s| s.green().bold().to_string())
    }

    fn warning(&self, message: &str) -> String {
        self.paint(&format!("warning: {message}"), |s| s.yellow().to_string())
    }

    fn error(&self, message: &str) -> String {
        self.paint(&format!("error: {message}"), |s| s.red().bold().to_string())
    }

    fn paint<F>(&self, message: &str, styled: F) -> String
    where
        F: FnOnce(console::StyledObject<&str>) -> String,
    {
        if self.colors_enabled {
            styled(style(message).force_styling(true))
        } else {
            message.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_events::FailureContext;
    use std::path::PathBuf;

    fn plain() -> EventHandler {
        EventHandler::new(false, false, false)
    }

    #[test]
    fn test_committed_transaction_is_reported() {
        let line = plain()
            .describe(&AppEvent::Transaction(TransactionEvent::Committed {
                transaction_id: uuid_nil(),
                manifests: vec!["libffi".to_string(), "o2l".to_string()],
            }))
            .unwrap();
        assert_eq!(line, "Installed libffi, o2l");
    }

    #[test]
    fn test_failures_are_prefixed() {
        let line = plain()
            .describe(&AppEvent::Install(InstallEvent::Failed {
                recipe: "o2l".to_string(),
                failure: FailureContext::new(
                    Some("install.conflict"),
                    "bin/o2l already exists",
                    None::<String>,
                    false,
                ),
            }))
            .unwrap();
        assert!(line.starts_with("error: Install of o2l failed"));
    }

    #[test]
    fn test_skipped_artifacts_only_when_verbose() {
        let event = AppEvent::Install(InstallEvent::ArtifactSkipped {
            recipe: "o2l".to_string(),
            source: PathBuf::from("wiki"),
            predicate: "dir_exists".to_string(),
        });
        assert!(plain().describe(&event).is_none());
        assert!(EventHandler::new(false, false, true).describe(&event).is_some());
    }

    #[test]
    fn test_uncolored_output_has_no_escapes() {
        let line = plain().status("Building o2l");
        assert!(!line.contains('\u{1b}'));
    }

    fn uuid_nil() -> uuid::Uuid {
        uuid::Uuid::nil()
    }
}
