use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("status query failed: {0}")]
    StatusQuery(String),

    #[error("remediation failed: {0}")]
    Remediation(String),

    #[error("command not found on PATH: {0}")]
    CommandNotFound(String),

    #[error("failed to spawn '{program}': {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no Tokio runtime available to drive the polling loop")]
    NoRuntime,

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ReadinessError>;

/// Why a run ended in `Failed`.
///
/// Unlike [`ReadinessError`] this is `Clone` so it can ride along in a
/// [`crate::RunOutcome`] handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    #[error("timed out after {after:?} (last status: {})", last_status.as_deref().unwrap_or("none"))]
    TimeoutExceeded {
        after: Duration,
        last_status: Option<String>,
    },

    #[error("{consecutive} consecutive status query failures; last: {last_error}")]
    StatusQueryLimit { consecutive: u32, last_error: String },

    #[error("polling task ended without reporting an outcome")]
    Aborted,
}
