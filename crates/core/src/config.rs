use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, MigrationResult};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_max_concurrent_destination_jobs() -> usize { 10 }
fn default_destination_start_delay_ms() -> u64 { 0 }
fn default_max_retries() -> usize { 3 }
fn default_max_batch_size() -> u64 { 10_000 }
fn default_progress_interval_ms() -> u64 { 10_000 }

// ── Migration config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,
    /// Ceiling on destination jobs whose termination has not been observed.
    #[serde(default = "default_max_concurrent_destination_jobs")]
    pub max_concurrent_destination_jobs: usize,
    /// Countdown before the first run starts, in milliseconds.
    #[serde(default = "default_destination_start_delay_ms")]
    pub destination_start_delay_ms: u64,
    /// Extra full runs allowed after a run asks for a retry.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Largest number of units a single destination job covers.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u64,
    /// How often a running job logs a progress line.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            profile: String::new(),
            max_concurrent_destination_jobs: default_max_concurrent_destination_jobs(),
            destination_start_delay_ms: default_destination_start_delay_ms(),
            max_retries: default_max_retries(),
            max_batch_size: default_max_batch_size(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

impl MigrationConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TYPEMIG_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TYPEMIG_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            max_concurrent_destination_jobs: profiled_env_usize(
                p,
                "MAX_CONCURRENT_DESTINATION_JOBS",
                default_max_concurrent_destination_jobs(),
            ),
            destination_start_delay_ms: profiled_env_u64(
                p,
                "DESTINATION_START_DELAY_MS",
                default_destination_start_delay_ms(),
            ),
            max_retries: profiled_env_usize(p, "MAX_RETRIES", default_max_retries()),
            max_batch_size: profiled_env_u64(p, "MAX_BATCH_SIZE", default_max_batch_size()),
            progress_interval_ms: profiled_env_u64(
                p,
                "PROGRESS_INTERVAL_MS",
                default_progress_interval_ms(),
            ),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    pub fn destination_start_delay(&self) -> Duration {
        Duration::from_millis(self.destination_start_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Reject values the driver cannot work with.
    pub fn validate(&self) -> MigrationResult<()> {
        if self.max_concurrent_destination_jobs == 0 {
            return Err(MigrationError::Config(
                "MAX_CONCURRENT_DESTINATION_JOBS must be positive".into(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(MigrationError::Config("MAX_BATCH_SIZE must be positive".into()));
        }
        if self.progress_interval_ms == 0 {
            return Err(MigrationError::Config("PROGRESS_INTERVAL_MS must be positive".into()));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  max_concurrent_destination_jobs={}", self.max_concurrent_destination_jobs);
        tracing::info!("  destination_start_delay_ms={}", self.destination_start_delay_ms);
        tracing::info!("  max_retries={}", self.max_retries);
        tracing::info!("  max_batch_size={}", self.max_batch_size);
        tracing::info!("  progress_interval_ms={}", self.progress_interval_ms);
    }
}
