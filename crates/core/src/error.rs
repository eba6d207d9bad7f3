use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A job finished without migrating its data correctly, but the rest of the
/// batch may keep going. Another full run over the same types is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySignal {
    /// Label of the job that asked for the rerun.
    pub job: String,
    /// Why the job could not complete.
    pub reason: String,
}

impl RetrySignal {
    pub fn new(job: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RetrySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {}: {}", self.job, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("another migration run is required ({0})")]
    RetryNeeded(RetrySignal),

    #[error("migration still incomplete after {attempts} attempts ({last})")]
    RetriesExhausted { attempts: usize, last: RetrySignal },

    #[error("destination job failed: {0}")]
    JobFailed(String),

    #[error("destination job panicked: {0}")]
    JobPanicked(String),

    #[error("job source error: {0}")]
    JobSource(String),

    #[error("interrupted: {0}")]
    Interrupted(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrationError {
    /// True only for the deferred rerun signal; every other kind is fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MigrationError::RetryNeeded(_))
    }
}

pub type MigrationResult<T> = std::result::Result<T, MigrationError>;
