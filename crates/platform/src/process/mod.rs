//! Process execution operations

use async_trait::async_trait;
use kiln_errors::Error;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitStatus;

use crate::core::PlatformContext;

/// Platform-specific command builder and execution
#[derive(Debug, Clone)]
pub struct PlatformCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    env_clear: bool,
    kill_on_drop: bool,
}

impl PlatformCommand {
    /// Create a new platform command
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            current_dir: None,
            env: BTreeMap::new(),
            env_clear: false,
            kill_on_drop: false,
        }
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: Into<PathBuf>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the child only
    pub fn env<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables for the child only
    pub fn envs<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.env.insert(key.into(), value.into());
        }
        self
    }

    /// Start the child from an empty environment instead of inheriting ours
    pub fn env_clear(&mut self) -> &mut Self {
        self.env_clear = true;
        self
    }

    /// Kill the child if the future driving it is dropped
    pub fn kill_on_drop(&mut self, kill: bool) -> &mut Self {
        self.kill_on_drop = kill;
        self
    }

    /// Get the program name
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the arguments
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the current directory
    pub fn get_current_dir(&self) -> Option<&PathBuf> {
        self.current_dir.as_ref()
    }

    /// Get the environment variables set on this command
    pub fn get_env_vars(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn clears_env(&self) -> bool {
        self.env_clear
    }

    pub fn kills_on_drop(&self) -> bool {
        self.kill_on_drop
    }

    /// Program and arguments joined for display
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output from command execution
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or `None` when terminated by a signal
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Last `lines` lines of stderr, for error context
    pub fn stderr_tail(&self, lines: usize) -> String {
        let stderr = self.stderr_lossy();
        let all: Vec<&str> = stderr.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Trait for process execution operations
#[async_trait]
pub trait ProcessOperations: Send + Sync {
    /// Execute a command and return the output
    async fn execute_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, Error>;

    /// Create a new command builder
    fn create_command(&self, program: &str) -> PlatformCommand;
}
