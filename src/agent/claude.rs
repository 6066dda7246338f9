//! Claude Code agent backend.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use owo_colors::OwoColorize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::events::{ContentBlock, StreamEvent};
use super::formatter::format_event;
use super::process::AgentProcessBuilder;
use super::{Agent, AgentError, AgentResult, ExecuteOptions};
use crate::display;
use crate::stream::NdjsonDecoder;

/// Characters of a malformed line shown in the warning forwarded to sinks.
const MALFORMED_PREVIEW_LEN: usize = 100;

/// Output accumulated synchronously by the decoder callbacks, drained
/// between reads for asynchronous delivery to the sinks.
#[derive(Debug, Default)]
struct Collected {
    /// Formatted chunks paired with their event-boundary flag.
    chunks: Vec<(String, bool)>,
    /// Assistant text accumulated for completion-marker detection.
    text: String,
}

/// The `claude` CLI driven in headless stream-json mode.
#[derive(Debug, Clone)]
pub struct ClaudeAgent {
    binary: String,
}

impl ClaudeAgent {
    /// Registry name for this backend.
    pub const NAME: &'static str = "claude";

    /// Use a custom binary instead of `claude` (for testing and the
    /// `binary` config override).
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for ClaudeAgent {
    fn default() -> Self {
        Self::with_binary(Self::NAME)
    }
}

#[async_trait::async_trait]
impl Agent for ClaudeAgent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn execute(
        &self,
        prompt: &str,
        cwd: &Path,
        opts: &ExecuteOptions,
    ) -> Result<AgentResult, AgentError> {
        let start = Instant::now();

        let mut process = AgentProcessBuilder::new(&self.binary)
            .working_dir(cwd)
            .spawn()?;

        let stdin = process
            .take_stdin()
            .ok_or(AgentError::MissingPipe("stdin"))?;
        let mut stdout = process
            .take_stdout()
            .ok_or(AgentError::MissingPipe("stdout"))?;
        let mut stderr = process
            .take_stderr()
            .ok_or(AgentError::MissingPipe("stderr"))?;

        // Deliver the prompt concurrently so a subprocess that emits output
        // before consuming stdin cannot deadlock against a full pipe. Write
        // errors (e.g. the process exiting early) are not fatal here; the
        // exit code tells the real story.
        let prompt_owned = prompt.to_string();
        let prompt_task = tokio::spawn(async move {
            let mut stdin = stdin;
            let _ = stdin.write_all(prompt_owned.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });

        let collected = Arc::new(Mutex::new(Collected::default()));
        let mut decoder = build_decoder(&collected);

        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut stdout_buf = vec![0u8; 8192];
        let mut stderr_buf = vec![0u8; 8192];
        let mut stderr_text = String::new();

        while stdout_open || stderr_open {
            tokio::select! {
                read = stdout.read(&mut stdout_buf), if stdout_open => {
                    match read {
                        Ok(0) | Err(_) => stdout_open = false,
                        Ok(n) => {
                            let chunk = String::from_utf8_lossy(&stdout_buf[..n]);
                            decoder.push(&chunk);
                            forward_chunks(&collected, opts).await;
                        }
                    }
                }
                read = stderr.read(&mut stderr_buf), if stderr_open => {
                    match read {
                        Ok(0) | Err(_) => stderr_open = false,
                        Ok(n) => {
                            let chunk = String::from_utf8_lossy(&stderr_buf[..n]).into_owned();
                            stderr_text.push_str(&chunk);
                            if opts.echo {
                                display::print_stderr(&chunk);
                            }
                            if let Some(persister) = &opts.persister {
                                persister.append_stderr(&chunk).await;
                            }
                        }
                    }
                }
            }
        }

        decoder.flush();
        forward_chunks(&collected, opts).await;
        let _ = prompt_task.await;

        let status = process.wait().await?;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let exit_code = status.code().unwrap_or(1);

        tracing::debug!(exit_code, duration_ms, "agent invocation finished");

        let text = {
            let guard = collected.lock().unwrap_or_else(PoisonError::into_inner);
            guard.text.clone()
        };
        let output = if stderr_text.is_empty() {
            text
        } else {
            format!("{text}\n[stderr]\n{stderr_text}")
        };

        Ok(AgentResult {
            output,
            exit_code,
            duration_ms,
        })
    }
}

/// Wire the stream decoder to the formatter and the warning path.
fn build_decoder(collected: &Arc<Mutex<Collected>>) -> NdjsonDecoder<StreamEvent> {
    let event_sink = Arc::clone(collected);
    let warn_sink = Arc::clone(collected);

    NdjsonDecoder::new(
        move |event: StreamEvent| {
            let mut guard = event_sink.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(formatted) = format_event(&event) {
                guard.chunks.push((format!("{formatted}\n"), true));
            }
            if let StreamEvent::Assistant { message } = &event {
                for block in &message.content {
                    if let ContentBlock::Text { text } = block {
                        guard.text.push_str(text);
                    }
                }
            }
        },
        move |_err, line| {
            let mut guard = warn_sink.lock().unwrap_or_else(PoisonError::into_inner);
            let shown: String = line.chars().take(MALFORMED_PREVIEW_LEN).collect();
            let warning = format!("{}", format!("[warn] malformed JSON: {shown}").yellow());
            guard.chunks.push((format!("{warning}\n"), false));
        },
    )
}

/// Drain collected chunks to the console and the persister, in order.
async fn forward_chunks(collected: &Arc<Mutex<Collected>>, opts: &ExecuteOptions) {
    let chunks = {
        let mut guard = collected.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut guard.chunks)
    };
    for (text, event_boundary) in chunks {
        if opts.echo {
            display::print_stream(&text);
        }
        if let Some(persister) = &opts.persister {
            persister.append(&text, event_boundary).await;
        }
    }
}
