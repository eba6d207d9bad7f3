//! Caller side of a migration: countdown, then whole-batch reruns until a
//! run comes back clean or the retry budget is spent.

use std::sync::Arc;

use tracing::{error, info, warn};

use typemig_core::{MigrationError, MigrationResult, MigrationRunSummary, PrimaryTypeMetadata, Reporter};

use crate::job::PrimaryTypeMigration;

pub struct MigrationClient {
    migration: Arc<dyn PrimaryTypeMigration>,
    reporter: Reporter,
    max_retries: usize,
}

impl MigrationClient {
    pub fn new(migration: Arc<dyn PrimaryTypeMigration>, reporter: Reporter, max_retries: usize) -> Self {
        Self {
            migration,
            reporter,
            max_retries,
        }
    }

    /// Run the migration, re-running the full batch after each retry signal.
    ///
    /// At most `max_retries + 1` runs are made. There is no backoff between
    /// runs. Fatal errors are returned as soon as they occur.
    pub async fn migrate(&self, types: &[PrimaryTypeMetadata]) -> MigrationResult<MigrationRunSummary> {
        self.reporter.run_countdown_before_start().await?;

        let max_attempts = self.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            info!(attempt, max_attempts, "starting migration run");

            match self.migration.migrate_primary_types(types).await {
                Ok(summary) => {
                    info!(attempt, submitted = summary.submitted, "migration run completed");
                    return Ok(summary);
                }
                Err(MigrationError::RetryNeeded(signal)) => {
                    if attempt >= max_attempts {
                        error!(attempts = attempt, last = %signal, "giving up after repeated retry signals");
                        return Err(MigrationError::RetriesExhausted {
                            attempts: attempt,
                            last: signal,
                        });
                    }
                    warn!(attempt, signal = %signal, "migration run requires another pass");
                }
                Err(e) => {
                    error!(attempt, error = %e, "migration run failed");
                    return Err(e);
                }
            }
        }
    }
}
