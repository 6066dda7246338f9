//! Agent abstraction and the Claude Code backend.
//!
//! An [`Agent`] runs one headless subprocess invocation: it feeds the prompt
//! to stdin, decodes the stream-json stdout, forwards formatted output to the
//! configured sinks and reports the iteration result.

mod claude;
mod events;
mod formatter;
mod process;

use std::path::Path;
use std::sync::Arc;

pub use claude::ClaudeAgent;
pub use events::{ContentBlock, Message, StreamEvent};
pub use formatter::format_event;
pub use process::{AgentProcess, AgentProcessBuilder, SpawnError};

use crate::stream::StreamPersister;

/// Error type for agent execution.
#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    /// The subprocess failed to spawn.
    #[error("failed to spawn agent: {0}")]
    Spawn(#[from] SpawnError),
    /// A piped stdio handle was not available.
    #[error("process {0} not available")]
    MissingPipe(&'static str),
    /// Other I/O error while driving the subprocess.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResult {
    /// Accumulated assistant text (plus captured stderr, when any).
    pub output: String,
    /// Subprocess exit code; 1 when the OS reports none.
    pub exit_code: i32,
    /// Wall-clock duration of the invocation in milliseconds.
    pub duration_ms: u64,
}

/// Sinks and switches for one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Durable sink for formatted output and stderr.
    pub persister: Option<Arc<StreamPersister>>,
    /// Echo formatted output and stderr to the console.
    pub echo: bool,
}

/// A coding agent that can be driven headlessly in a loop.
#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    /// Short identifier used on the command line.
    fn name(&self) -> &'static str;

    /// Run one subprocess invocation with the given prompt.
    ///
    /// # Errors
    ///
    /// Returns `AgentError` when the subprocess cannot be spawned or driven;
    /// a subprocess that runs but exits non-zero is a normal result.
    async fn execute(
        &self,
        prompt: &str,
        cwd: &Path,
        opts: &ExecuteOptions,
    ) -> Result<AgentResult, AgentError>;
}

/// Look up an agent backend by name.
///
/// `binary` overrides the executable the backend spawns (used by tests and
/// the `binary` config key).
#[must_use]
pub fn get_agent(name: &str, binary: Option<String>) -> Option<Arc<dyn Agent>> {
    match name {
        ClaudeAgent::NAME => {
            let agent = binary.map_or_else(ClaudeAgent::default, ClaudeAgent::with_binary);
            Some(Arc::new(agent))
        }
        _ => None,
    }
}

/// Whether `name` is a supported agent backend.
#[must_use]
pub fn is_valid_agent(name: &str) -> bool {
    name == ClaudeAgent::NAME
}
