//! Session directories under `~/.ralph` and buffered iteration logs.
//!
//! Every `run` invocation gets its own session directory named by a fresh
//! UUID, holding one numbered log file per iteration plus a small metadata
//! file describing the run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error type for session operations.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The home directory could not be determined.
    #[error("could not determine home directory")]
    NoHome,
    /// Filesystem error under the session directory.
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Metadata could not be serialized.
    #[error("failed to encode session metadata: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Metadata recorded when a session is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: Uuid,
    pub agent: String,
    pub started_at: DateTime<Utc>,
    pub iterations: u32,
    pub cwd: PathBuf,
    pub prompt_files: Vec<PathBuf>,
}

/// Root data directory, `~/.ralph`.
///
/// # Errors
///
/// Returns `SessionError::NoHome` when the home directory is unknown.
pub fn ralph_dir() -> Result<PathBuf, SessionError> {
    dirs::home_dir()
        .map(|home| home.join(".ralph"))
        .ok_or(SessionError::NoHome)
}

/// Directory holding all session directories.
///
/// # Errors
///
/// See [`ralph_dir`].
pub fn sessions_dir() -> Result<PathBuf, SessionError> {
    Ok(ralph_dir()?.join("sessions"))
}

/// Create a new session directory with its metadata file.
///
/// # Errors
///
/// Returns `SessionError` when the directory or metadata cannot be written.
pub fn create_session(
    root: &Path,
    agent: &str,
    iterations: u32,
    cwd: &Path,
    prompt_files: &[PathBuf],
) -> Result<(SessionMeta, PathBuf), SessionError> {
    let meta = SessionMeta {
        id: Uuid::new_v4(),
        agent: agent.to_string(),
        started_at: Utc::now(),
        iterations,
        cwd: cwd.to_path_buf(),
        prompt_files: prompt_files.to_vec(),
    };
    let dir = root.join(meta.id.to_string());
    std::fs::create_dir_all(&dir)?;
    let encoded = serde_json::to_string_pretty(&meta)?;
    std::fs::write(dir.join("meta.json"), encoded)?;
    Ok((meta, dir))
}

/// Path of the numbered log for one iteration.
#[must_use]
pub fn iteration_log_path(session_dir: &Path, iteration: u32) -> PathBuf {
    session_dir.join(format!("{iteration}.log"))
}

/// Write a complete iteration log in one shot (the non-streaming path).
///
/// # Errors
///
/// Returns `SessionError` when the log cannot be written.
pub fn write_log(
    session_dir: &Path,
    iteration: u32,
    output: &str,
    exit_code: i32,
    duration_ms: u64,
) -> Result<PathBuf, SessionError> {
    std::fs::create_dir_all(session_dir)?;
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let content = format!(
        "# Iteration {iteration}\nTimestamp: {timestamp}\nDuration: {duration_ms}ms\nExit Code: {exit_code}\n---\n{output}"
    );
    let path = iteration_log_path(session_dir, iteration);
    std::fs::write(&path, content)?;
    Ok(path)
}
