//! Collaborator traits the migration driver is written against.

use async_trait::async_trait;
use futures::stream::BoxStream;

use typemig_core::{MigrationError, MigrationResult, MigrationRunSummary, PrimaryTypeMetadata, RetrySignal};

/// How a destination job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// The job's data reached the destination.
    Success,
    /// The job did not complete correctly; the batch needs another run.
    Retry(RetrySignal),
    /// Anything else. Aborts the run.
    Fatal(MigrationError),
}

/// Eventual result of one submitted job.
///
/// Retrieving the outcome consumes the handle, so a job can only be
/// accounted for once.
#[async_trait]
pub trait JobHandle: Send + Sized {
    /// Non-blocking check. Must be cheap to call repeatedly.
    fn is_terminated(&self) -> bool;

    /// Outcome of a terminated job. Only called after `is_terminated`
    /// returned `true`.
    async fn outcome(self) -> JobOutcome;
}

/// Produces the jobs for a set of primary types.
pub trait JobSource: Send + Sync {
    type Job: Send;

    /// Lazy, single-pass, finite sequence of jobs. Errors are fatal.
    fn build_destination_jobs<'a>(
        &'a self,
        types: &'a [PrimaryTypeMetadata],
    ) -> BoxStream<'a, MigrationResult<Self::Job>>;
}

/// Starts jobs against the destination without waiting for them.
pub trait JobExecutor<J>: Send + Sync {
    type Handle: JobHandle;

    /// Must not block. Submission failures surface later through the handle.
    fn start_destination_job(&self, job: J) -> Self::Handle;
}

/// One full pass over a list of primary types.
#[async_trait]
pub trait PrimaryTypeMigration: Send + Sync {
    async fn migrate_primary_types(
        &self,
        types: &[PrimaryTypeMetadata],
    ) -> MigrationResult<MigrationRunSummary>;
}
