//! Bounded-concurrency migration driver.
//!
//! Pulls jobs one at a time from a [`JobSource`], hands each to a
//! [`JobExecutor`] and tracks the returned handles in an active set. Once the
//! set reaches the configured ceiling the driver sleeps on the [`Clock`] and
//! drains terminated handles until it drops back under the cap.
//!
//! Submission happens before the cap check, so the set can hold one handle
//! more than the ceiling right after a submit. Retry signals are deferred to
//! the end of the run (last one wins); fatal outcomes abort immediately and
//! orphan whatever is still running.

mod active;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{error, info, warn};

use typemig_core::{
    Clock, MigrationConfig, MigrationError, MigrationResult, MigrationRunSummary,
    PrimaryTypeMetadata, RetrySignal,
};

use crate::job::{JobExecutor, JobSource, PrimaryTypeMigration};

use self::active::ActiveSet;

/// Fixed wait between drain passes while the active set is full.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

pub struct MigrationDriver<S, E> {
    max_concurrent_jobs: usize,
    source: S,
    executor: E,
    clock: Arc<dyn Clock>,
}

impl<S, E> MigrationDriver<S, E>
where
    S: JobSource,
    E: JobExecutor<S::Job>,
{
    pub fn new(
        max_concurrent_jobs: usize,
        source: S,
        executor: E,
        clock: Arc<dyn Clock>,
    ) -> MigrationResult<Self> {
        if max_concurrent_jobs == 0 {
            return Err(MigrationError::Config(
                "maximum concurrent destination jobs must be positive".into(),
            ));
        }
        Ok(Self {
            max_concurrent_jobs,
            source,
            executor,
            clock,
        })
    }

    pub fn from_config(
        config: &MigrationConfig,
        source: S,
        executor: E,
        clock: Arc<dyn Clock>,
    ) -> MigrationResult<Self> {
        Self::new(config.max_concurrent_destination_jobs, source, executor, clock)
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    /// Submit every job for `types`, keeping the active set under the cap.
    ///
    /// Returns `RetryNeeded` with the last observed signal if any job asked
    /// for another run. Handles still active when the job sequence runs out
    /// are not waited on; they show up as `outstanding` in the summary.
    pub async fn run(&self, types: &[PrimaryTypeMetadata]) -> MigrationResult<MigrationRunSummary> {
        info!(
            types = types.len(),
            max_concurrent = self.max_concurrent_jobs,
            "migration run started"
        );

        let mut summary = MigrationRunSummary::default();
        let mut active = ActiveSet::new();
        let mut pending_retry: Option<RetrySignal> = None;
        let mut jobs = self.source.build_destination_jobs(types);

        while let Some(job) = jobs.next().await {
            let job = match job {
                Ok(job) => job,
                Err(e) => {
                    error!(submitted = summary.submitted, error = %e, "job source failed");
                    return Err(e);
                }
            };
            active.push(self.executor.start_destination_job(job));
            summary.submitted += 1;

            while active.len() >= self.max_concurrent_jobs {
                self.clock.sleep(POLL_INTERVAL).await?;
                summary.poll_cycles += 1;

                let drained = match active.drain_terminated().await {
                    Ok(drained) => drained,
                    Err(e) => {
                        error!(
                            submitted = summary.submitted,
                            abandoned = active.len(),
                            error = %e,
                            "migration run aborted"
                        );
                        return Err(e);
                    }
                };
                summary.succeeded += drained.succeeded;
                summary.retries_observed += drained.retries;
                if let Some(signal) = drained.last_retry {
                    pending_retry = Some(signal);
                }
            }
        }

        summary.outstanding = active.len();

        if let Some(signal) = pending_retry {
            warn!(
                submitted = summary.submitted,
                retries = summary.retries_observed,
                "migration run finished, another run is required"
            );
            return Err(MigrationError::RetryNeeded(signal));
        }

        info!(
            "migration run finished: {} submitted, {} succeeded, {} outstanding",
            summary.submitted, summary.succeeded, summary.outstanding
        );
        Ok(summary)
    }
}

#[async_trait]
impl<S, E> PrimaryTypeMigration for MigrationDriver<S, E>
where
    S: JobSource,
    E: JobExecutor<S::Job>,
{
    async fn migrate_primary_types(
        &self,
        types: &[PrimaryTypeMetadata],
    ) -> MigrationResult<MigrationRunSummary> {
        self.run(types).await
    }
}
