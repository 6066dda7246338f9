//! Agent subprocess spawning and control.
//!
//! The agent runs in non-interactive mode with a fixed argument set selecting
//! verbose newline-delimited JSON output. The prompt is written to stdin,
//! which is then closed; stdout carries the event stream and stderr carries
//! free-text diagnostics.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The agent binary was not found.
    #[error("agent binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("permission denied")]
    PermissionDenied,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Builder for configuring an agent subprocess.
#[derive(Debug, Clone)]
pub struct AgentProcessBuilder {
    binary: String,
    working_dir: Option<PathBuf>,
}

impl AgentProcessBuilder {
    /// Create a builder for the given binary.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            working_dir: None,
        }
    }

    /// Set the working directory for the subprocess.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The fixed argument set for headless streaming execution.
    #[must_use]
    pub fn build_args(&self) -> Vec<&'static str> {
        vec![
            "-p",
            "--verbose",
            "--dangerously-skip-permissions",
            "--output-format",
            "stream-json",
        ]
    }

    /// Spawn the subprocess with piped stdio.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(&self) -> Result<AgentProcess, SpawnError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.build_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(SpawnError::from_io)?;
        Ok(AgentProcess { child })
    }
}

/// A running agent subprocess.
#[derive(Debug)]
pub struct AgentProcess {
    child: Child,
}

impl AgentProcess {
    /// Take ownership of the stdin handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }
}
