//! Prompt assembly from context files.

use std::path::{Path, PathBuf};

/// Marker the agent must emit verbatim when the task is done.
pub const COMPLETION_MARKER: &str = "<ralph>RALPH_COMPLETED</ralph>";

/// Error type for prompt assembly.
#[derive(thiserror::Error, Debug)]
pub enum PromptError {
    /// A context file could not be read.
    #[error("failed to read context file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Read the context files, each rendered with a path banner.
///
/// # Errors
///
/// Returns `PromptError::Read` for the first unreadable file.
pub fn read_context_files(paths: &[PathBuf]) -> Result<String, PromptError> {
    let mut sections = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(path).map_err(|source| PromptError::Read {
            path: path.clone(),
            source,
        })?;
        sections.push(format!("# File: {}\n{content}", path.display()));
    }
    Ok(sections.join("\n\n"))
}

/// Build the per-iteration prompt: the context files followed by the
/// completion-marker instructions.
///
/// # Errors
///
/// See [`read_context_files`].
pub fn build_prompt(paths: &[PathBuf]) -> Result<String, PromptError> {
    let context = read_context_files(paths)?;
    Ok(format!(
        "{context}\n\n\
         Work on the task described above. Pick the most important \
         unfinished item and make real progress on it.\n\
         When, and only when, every requirement is fully implemented and \
         verified, output the exact text {COMPLETION_MARKER} on its own line."
    ))
}

/// Whether every context file exists, reporting the first missing one.
pub fn missing_context_file(paths: &[PathBuf]) -> Option<&Path> {
    paths
        .iter()
        .find(|path| !path.exists())
        .map(PathBuf::as_path)
}
