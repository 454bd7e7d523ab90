//! Core platform abstractions and context management

use kiln_events::{AppEvent, EventEmitter, EventSender};

use crate::filesystem::FilesystemOperations;
use crate::process::{CommandOutput, PlatformCommand, ProcessOperations};

/// Context for platform operations, providing event emission
#[derive(Debug, Clone, Default)]
pub struct PlatformContext {
    event_sender: Option<EventSender>,
}

impl PlatformContext {
    /// Create a new platform context with event emission capabilities
    pub fn new(event_sender: Option<EventSender>) -> Self {
        Self { event_sender }
    }

    /// Emit a platform event if event sender is available
    pub fn emit_event(&self, event: AppEvent) {
        self.emit(event);
    }
}

impl EventEmitter for PlatformContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

/// Main platform abstraction providing access to all platform operations
pub struct Platform {
    filesystem_ops: Box<dyn FilesystemOperations>,
    process_ops: Box<dyn ProcessOperations>,
}

impl Platform {
    /// Create a new platform instance with the specified implementations
    pub fn new(
        filesystem_ops: Box<dyn FilesystemOperations>,
        process_ops: Box<dyn ProcessOperations>,
    ) -> Self {
        Self {
            filesystem_ops,
            process_ops,
        }
    }

    /// Platform backed by tokio processes and filesystem calls
    pub fn current() -> Self {
        use crate::implementations::native::{
            filesystem::NativeFilesystemOperations, process::NativeProcessOperations,
        };

        Self::new(
            Box::new(NativeFilesystemOperations::new()),
            Box::new(NativeProcessOperations::new()),
        )
    }

    /// Access filesystem operations
    pub fn filesystem(&self) -> &dyn FilesystemOperations {
        &*self.filesystem_ops
    }

    /// Access process operations
    pub fn process(&self) -> &dyn ProcessOperations {
        &*self.process_ops
    }

    /// Create a platform context with event emission
    pub fn create_context(&self, event_sender: Option<EventSender>) -> PlatformContext {
        PlatformContext::new(event_sender)
    }

    /// Convenience method: Execute a command and get output
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned or waited on. A
    /// nonzero exit status is not an error here.
    pub async fn execute_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, kiln_errors::Error> {
        self.process().execute_command(ctx, cmd).await
    }

    /// Command builder for `program`, as built by the process backend
    pub fn command(&self, program: &str) -> PlatformCommand {
        self.process().create_command(program)
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
