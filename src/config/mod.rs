//! Run-loop configuration loaded from TOML.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Defaults applied when no config file overrides them.
pub const DEFAULT_ITERATIONS: u32 = 4;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;

/// Configuration loaded from `.ralph.toml` or `~/.ralph/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RalphConfig {
    /// Agent backend to run.
    pub agent: String,
    /// Maximum iterations per run.
    pub iterations: u32,
    /// Persister flush interval in milliseconds.
    pub flush_interval_ms: u64,
    /// Override the agent binary (mainly for testing).
    pub binary: Option<String>,
}

impl Default for RalphConfig {
    fn default() -> Self {
        Self {
            agent: "claude".to_string(),
            iterations: DEFAULT_ITERATIONS,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            binary: None,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader with the default search paths: the project-local
    /// `.ralph.toml`, then `~/.ralph/config.toml`.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from(".ralph.toml")];
        if let Some(home) = dirs::home_dir() {
            search_paths.push(home.join(".ralph").join("config.toml"));
        }
        Self { search_paths }
    }

    /// Create a loader pinned to a specific config file.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load(&self) -> Result<RalphConfig, ConfigError> {
        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config file");
                return Self::load_from_path(path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(RalphConfig::default())
    }

    /// Like [`ConfigLoader::load`], but a broken config file degrades to
    /// defaults with a warning instead of failing the run.
    #[must_use]
    pub fn load_or_default(&self) -> RalphConfig {
        match self.load() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring invalid config file");
                RalphConfig::default()
            }
        }
    }

    fn load_from_path(path: &PathBuf) -> Result<RalphConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            source: e,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/ralph.toml"));
        let config = loader.load().unwrap();
        assert_eq!(config.agent, "claude");
        assert_eq!(config.iterations, 4);
        assert_eq!(config.flush_interval_ms, 100);
        assert!(config.binary.is_none());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "iterations = 10\n").unwrap();

        let config = ConfigLoader::with_path(path).load().unwrap();
        assert_eq!(config.iterations, 10);
        assert_eq!(config.agent, "claude");
    }

    #[test]
    fn invalid_config_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "iterations = \"many\"\n").unwrap();

        let loader = ConfigLoader::with_path(path);
        assert!(matches!(loader.load(), Err(ConfigError::Parse { .. })));
        assert_eq!(loader.load_or_default().iterations, 4);
    }

    #[test]
    fn binary_override_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "binary = \"/usr/local/bin/claude-nightly\"\n").unwrap();

        let config = ConfigLoader::with_path(path).load().unwrap();
        assert_eq!(config.binary.as_deref(), Some("/usr/local/bin/claude-nightly"));
    }
}
