use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrationResult;

/// A primary type to migrate and how many units of it the source holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryTypeMetadata {
    pub type_name: String,
    pub count: u64,
}

impl PrimaryTypeMetadata {
    pub fn new(type_name: impl Into<String>, count: u64) -> Self {
        Self {
            type_name: type_name.into(),
            count,
        }
    }
}

/// Number of units of one type held by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    pub type_name: String,
    pub count: u64,
}

impl TypeCount {
    pub fn new(type_name: impl Into<String>, count: u64) -> Self {
        Self {
            type_name: type_name.into(),
            count,
        }
    }
}

/// Per-type counts taken from both ends of the migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    #[serde(default)]
    pub source: Vec<TypeCount>,
    #[serde(default)]
    pub destination: Vec<TypeCount>,
}

impl TypeCounts {
    pub fn from_json_str(json: &str) -> MigrationResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read counts from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> MigrationResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Source counts as the list of primary types to migrate.
    pub fn primary_types(&self) -> Vec<PrimaryTypeMetadata> {
        self.source
            .iter()
            .map(|c| PrimaryTypeMetadata::new(c.type_name.clone(), c.count))
            .collect()
    }
}

/// Which side of the migration a job runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobTarget {
    Source,
    Destination,
}

impl fmt::Display for JobTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobTarget::Source => write!(f, "SOURCE"),
            JobTarget::Destination => write!(f, "DESTINATION"),
        }
    }
}

/// Snapshot of a running job, used for progress lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub started_on: DateTime<Utc>,
    pub request_type: String,
}

/// What a single call of the driver did before returning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationRunSummary {
    /// Jobs handed to the executor.
    pub submitted: usize,
    /// Jobs observed finishing successfully.
    pub succeeded: usize,
    /// Retry signals observed (only the last one is reported).
    pub retries_observed: usize,
    /// Sleep-and-drain cycles spent waiting under the cap.
    pub poll_cycles: usize,
    /// Jobs still unobserved when the job sequence ran out.
    pub outstanding: usize,
}
