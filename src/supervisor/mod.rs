//! Iteration run loop.
//!
//! The supervisor drives the agent for a bounded number of iterations,
//! giving each one a fresh crash-safe log, and stops early when the agent
//! declares the work complete or a signal cancels the run.

mod signals;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use signals::{signal_exit_code, CancellationController};

use crate::agent::{Agent, AgentError, AgentResult, ExecuteOptions};
use crate::display;
use crate::prompt::COMPLETION_MARKER;
use crate::session;
use crate::stream::StreamPersister;

/// Error type for run-loop operations.
#[derive(thiserror::Error, Debug)]
pub enum RunLoopError {
    /// The agent subprocess could not be driven.
    #[error(transparent)]
    Agent(#[from] AgentError),
    /// A non-streaming iteration log could not be written.
    #[error(transparent)]
    Session(#[from] session::SessionError),
}

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Iterations actually executed.
    pub iterations_run: u32,
    /// Whether the agent emitted the completion marker.
    pub completed: bool,
}

/// The supervisor for one `run` invocation.
pub struct RunLoop {
    pub agent: Arc<dyn Agent>,
    pub prompt: String,
    pub cwd: PathBuf,
    pub log_dir: PathBuf,
    pub iterations: u32,
    pub flush_interval: Duration,
    /// Persist the decoded stream incrementally; otherwise one log write
    /// per iteration after the subprocess exits.
    pub stream_logs: bool,
    /// Echo the formatted stream to the console.
    pub echo: bool,
}

impl RunLoop {
    /// Run with signal handlers installed for the duration of the loop.
    ///
    /// # Errors
    ///
    /// Returns `RunLoopError` when an iteration fails before producing a
    /// result; the partial log is finalized as crashed first.
    pub async fn run(&self) -> Result<RunOutcome, RunLoopError> {
        let controller = Arc::new(CancellationController::new());
        controller.register_handlers();
        let outcome = self.run_with_controller(&controller).await;
        controller.unregister_handlers();
        outcome
    }

    /// Run under an externally owned controller (tests drive this directly).
    ///
    /// # Errors
    ///
    /// See [`RunLoop::run`].
    pub async fn run_with_controller(
        &self,
        controller: &Arc<CancellationController>,
    ) -> Result<RunOutcome, RunLoopError> {
        let mut iterations_run = 0;

        for iteration in 0..self.iterations {
            if controller.is_cancelled() {
                break;
            }

            if self.echo {
                display::print_iteration_start(iteration, self.iterations);
            }
            tracing::info!(iteration, "starting iteration");

            iterations_run += 1;
            let result = if self.stream_logs {
                self.run_streaming_iteration(iteration, controller).await?
            } else {
                self.run_buffered_iteration(iteration).await?
            };

            if self.echo {
                if result.exit_code == 0 {
                    display::print_iteration_done(iteration, result.duration_ms);
                } else {
                    display::print_iteration_failed(iteration, result.exit_code);
                }
            }

            if result.output.contains(COMPLETION_MARKER) {
                tracing::info!(iteration, "completion marker detected");
                return Ok(RunOutcome {
                    iterations_run,
                    completed: true,
                });
            }
        }

        Ok(RunOutcome {
            iterations_run,
            completed: false,
        })
    }

    async fn run_streaming_iteration(
        &self,
        iteration: u32,
        controller: &Arc<CancellationController>,
    ) -> Result<AgentResult, RunLoopError> {
        let log_path = self.log_dir.join(format!("{iteration}.log"));
        let persister = Arc::new(StreamPersister::with_flush_interval(
            log_path,
            self.flush_interval,
        ));
        controller.set_active(Arc::clone(&persister));

        let opts = ExecuteOptions {
            persister: Some(Arc::clone(&persister)),
            echo: self.echo,
        };

        match self.agent.execute(&self.prompt, &self.cwd, &opts).await {
            Ok(result) => {
                persister
                    .complete(result.exit_code, result.duration_ms)
                    .await;
                controller.clear_active();
                Ok(result)
            }
            Err(err) => {
                controller.crash_active(&err.to_string()).await;
                Err(err.into())
            }
        }
    }

    async fn run_buffered_iteration(&self, iteration: u32) -> Result<AgentResult, RunLoopError> {
        let opts = ExecuteOptions {
            persister: None,
            echo: self.echo,
        };
        let result = self.agent.execute(&self.prompt, &self.cwd, &opts).await?;
        session::write_log(
            &self.log_dir,
            iteration,
            &result.output,
            result.exit_code,
            result.duration_ms,
        )?;
        Ok(result)
    }
}
