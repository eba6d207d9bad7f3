use std::path::PathBuf;

use clap::Parser;

use typemig_core::MigrationConfig;

/// Migrate primary types from a source store to a destination store.
///
/// Reads per-type counts for both stores from a JSON file, reports where they
/// differ, then submits one destination job per batch while keeping the
/// number of unfinished jobs under the configured ceiling.
#[derive(Parser, Debug)]
#[command(name = "typemig", version, about)]
pub struct CliArgs {
    /// JSON file with `source` and `destination` type counts.
    #[arg(long, env = "TYPEMIG_INPUT")]
    pub input: PathBuf,

    /// Override MAX_CONCURRENT_DESTINATION_JOBS.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Override MAX_BATCH_SIZE.
    #[arg(long)]
    pub batch_size: Option<u64>,

    /// Override MAX_RETRIES.
    #[arg(long)]
    pub max_retries: Option<usize>,

    /// Simulated milliseconds per unit for the dry-run job runner.
    #[arg(long, env = "TYPEMIG_DRY_RUN_ROW_MS", default_value_t = 1)]
    pub dry_run_row_ms: u64,
}

impl CliArgs {
    /// Apply command-line overrides on top of the env config.
    pub fn apply(&self, config: &mut MigrationConfig) {
        if let Some(n) = self.max_concurrent {
            config.max_concurrent_destination_jobs = n;
        }
        if let Some(n) = self.batch_size {
            config.max_batch_size = n;
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
    }
}
