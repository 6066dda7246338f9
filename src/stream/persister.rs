//! Incremental, crash-safe persistence for streamed agent output.
//!
//! A [`StreamPersister`] owns one log file for one iteration. Output is
//! buffered in memory and flushed on a recurring timer or at event
//! boundaries, so a crash loses at most one partially-buffered chunk. The
//! file is created lazily on the first non-empty flush and finalized exactly
//! once with a terminal status footer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Default interval between automatic buffer flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle status of a persisted log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    /// Header written (or pending), body still streaming.
    InProgress,
    /// Subprocess exited and the footer records exit code and duration.
    Completed,
    /// A termination signal interrupted the iteration.
    Aborted,
    /// An uncaught fault interrupted the iteration.
    Crashed,
}

impl LogStatus {
    /// The literal status string written to the log file.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Crashed => "crashed",
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    log_path: PathBuf,
    buffer: String,
    status: LogStatus,
    started_at: DateTime<Utc>,
    header_written: bool,
    write_failed: bool,
    finalized: bool,
    file: Option<tokio::fs::File>,
    flush_task: Option<JoinHandle<()>>,
}

impl Inner {
    /// Mark the instance as failed and disable all further file operations.
    fn fail(&mut self, err: &std::io::Error) {
        if !self.write_failed {
            tracing::error!(
                path = %self.log_path.display(),
                error = %err,
                "log write failed; persistence disabled for this file"
            );
        }
        self.write_failed = true;
        self.file = None;
    }

    /// Open the file (creating parent directories) and write the header once.
    ///
    /// Returns false when this instance has degraded to a no-op.
    async fn ensure_file(&mut self) -> bool {
        if self.write_failed {
            return false;
        }

        if self.file.is_none() {
            if let Some(parent) = self.log_path.parent() {
                if let Err(err) = tokio::fs::create_dir_all(parent).await {
                    self.fail(&err);
                    return false;
                }
            }
            match OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.log_path)
                .await
            {
                Ok(file) => self.file = Some(file),
                Err(err) => {
                    self.fail(&err);
                    return false;
                }
            }
        }

        if !self.header_written {
            self.header_written = true;
            let header = format!(
                "# Iteration Log\nTimestamp: {}\nStatus: {}\n---\n",
                self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                LogStatus::InProgress,
            );
            self.write_raw(&header).await;
        }

        !self.write_failed
    }

    /// Write a complete string to the file in one call.
    async fn write_raw(&mut self, content: &str) {
        if self.write_failed {
            return;
        }
        let result = match self.file.as_mut() {
            Some(file) => file.write_all(content.as_bytes()).await,
            None => return,
        };
        if let Err(err) = result {
            self.fail(&err);
        }
    }

    /// Flush the in-memory buffer to disk.
    ///
    /// No-op on an empty buffer, so the file is never created before the
    /// first byte of body output exists.
    async fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        if !self.ensure_file().await {
            return;
        }
        let content = std::mem::take(&mut self.buffer);
        self.write_raw(&content).await;
    }

    fn stop_flush_timer(&mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
    }

    async fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush().await;
        }
    }
}

/// Buffered writer for one iteration's log file.
///
/// All operations are infallible from the caller's point of view: disk
/// faults degrade the instance to a safe no-op after a single diagnostic.
/// Finalization (`complete`/`abort`/`crash`) is idempotent; the first call
/// wins and later calls do nothing.
#[derive(Debug)]
pub struct StreamPersister {
    inner: Arc<Mutex<Inner>>,
    log_path: PathBuf,
    flush_interval: Duration,
}

impl StreamPersister {
    /// Create a persister for the given log path with the default flush interval.
    #[must_use]
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self::with_flush_interval(log_path, DEFAULT_FLUSH_INTERVAL)
    }

    /// Create a persister with a custom flush interval.
    #[must_use]
    pub fn with_flush_interval(log_path: impl Into<PathBuf>, flush_interval: Duration) -> Self {
        let log_path = log_path.into();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                log_path: log_path.clone(),
                buffer: String::new(),
                status: LogStatus::InProgress,
                started_at: Utc::now(),
                header_written: false,
                write_failed: false,
                finalized: false,
                file: None,
                flush_task: None,
            })),
            log_path,
            flush_interval,
        }
    }

    /// The path this persister writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Current lifecycle status.
    pub async fn status(&self) -> LogStatus {
        self.inner.lock().await.status
    }

    /// Whether a terminal status has been written.
    pub async fn is_finalized(&self) -> bool {
        self.inner.lock().await.finalized
    }

    /// Append content to the buffer, starting the flush timer if needed.
    ///
    /// With `event_boundary` set, the buffer is flushed synchronously before
    /// returning so a fully-formed event hits disk promptly. Appends after
    /// finalization are dropped.
    pub async fn append(&self, content: &str, event_boundary: bool) {
        let mut inner = self.inner.lock().await;
        if inner.finalized {
            return;
        }
        inner.buffer.push_str(content);
        self.start_flush_timer(&mut inner);
        if event_boundary {
            inner.flush_buffer().await;
        }
    }

    /// Append stderr content, prefixing every non-empty line with `[stderr] `.
    pub async fn append_stderr(&self, content: &str) {
        let prefixed = content
            .split('\n')
            .map(|line| {
                if line.is_empty() {
                    String::new()
                } else {
                    format!("[stderr] {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut inner = self.inner.lock().await;
        if inner.finalized {
            return;
        }
        inner.buffer.push_str(&prefixed);
        self.start_flush_timer(&mut inner);
    }

    /// Force a flush of any buffered content.
    pub async fn flush(&self) {
        let mut inner = self.inner.lock().await;
        if inner.finalized {
            return;
        }
        inner.flush_buffer().await;
    }

    /// Finalize the log as completed, recording exit code and duration.
    pub async fn complete(&self, exit_code: i32, duration_ms: u64) {
        self.finalize(
            LogStatus::Completed,
            format!("Exit Code: {exit_code}\nDuration: {duration_ms}ms\n"),
        )
        .await;
    }

    /// Finalize the log as aborted by a termination signal.
    pub async fn abort(&self, signal: &str) {
        self.finalize(LogStatus::Aborted, format!("Interrupted: {signal}\n"))
            .await;
    }

    /// Finalize the log as crashed, recording the fault message.
    pub async fn crash(&self, message: &str) {
        self.finalize(LogStatus::Crashed, format!("Error: {message}\n"))
            .await;
    }

    /// Release resources without writing a footer.
    ///
    /// For persisters abandoned outside the normal lifecycle (for example
    /// test teardown). Never blocks on pending output and never fails.
    pub async fn destroy(&self) {
        let mut inner = self.inner.lock().await;
        inner.stop_flush_timer();
        inner.close().await;
    }

    async fn finalize(&self, status: LogStatus, detail: String) {
        let mut inner = self.inner.lock().await;
        if inner.finalized {
            return;
        }
        inner.finalized = true;
        inner.stop_flush_timer();
        inner.status = status;
        inner.flush_buffer().await;
        // A log finalized before any body output still gets header + footer.
        inner.ensure_file().await;
        inner
            .write_raw(&format!("\n---\nStatus: {status}\n{detail}"))
            .await;
        inner.close().await;
    }

    /// Start the recurring flush task if it is not already running.
    ///
    /// The task holds only a weak reference, so a dropped persister does not
    /// keep flushing forever even if `destroy` was never called.
    fn start_flush_timer(&self, inner: &mut Inner) {
        if inner.flush_task.is_some() || inner.finalized {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let interval = self.flush_interval;
        inner.flush_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick resolves immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let mut guard = inner.lock().await;
                if guard.finalized {
                    break;
                }
                guard.flush_buffer().await;
            }
        }));
    }
}
