//! Error types for the cache worker.

use thiserror::Error;

use crate::worker::WorkerState;

/// Errors raised by cache storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to serialize cached headers: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("storage lock poisoned")]
  LockPoisoned,

  #[error("could not determine data directory for the cache database")]
  NoDataDir,

  #[error("failed to create cache directory: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to parse stored timestamp '{value}': {source}")]
  Timestamp {
    value: String,
    source: chrono::ParseError,
  },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0:?}")]
  NotFound(std::path::PathBuf),

  #[error("failed to read config file {0:?}: {1}")]
  Read(std::path::PathBuf, #[source] std::io::Error),

  #[error("failed to parse config file {0:?}: {1}")]
  Parse(std::path::PathBuf, #[source] serde_yaml::Error),
}

/// Errors raised when fetching from the network.
#[derive(Debug, Error)]
pub enum NetworkError {
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("network unreachable")]
  Unreachable,
}

/// Errors raised by worker lifecycle operations.
///
/// Fetch handling never returns these: every intercepted request resolves to
/// a response, with degraded content standing in for failures.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("invalid lifecycle transition from {from:?} to {to:?}")]
  InvalidTransition { from: WorkerState, to: WorkerState },

  #[error("install aborted: precache of {url} failed: {reason}")]
  InstallAborted { url: String, reason: String },

  #[error(transparent)]
  Storage(#[from] StorageError),
}
