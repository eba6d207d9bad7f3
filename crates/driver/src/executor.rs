//! Tokio-based job executor.
//!
//! Each job runs on its own task. While a job is pending the task logs a
//! progress line every `progress_interval`; a panicking runner is turned into
//! a fatal outcome instead of taking the driver down.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use typemig_core::{Clock, JobStatus, JobTarget, MigrationError, MigrationResult, Reporter};

use crate::job::{JobExecutor, JobHandle, JobOutcome};
use crate::source::DestinationJob;

/// Performs the actual work of one destination job.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, job: DestinationJob) -> JobOutcome;
}

pub struct TokioJobExecutor<R> {
    runner: Arc<R>,
    reporter: Reporter,
    clock: Arc<dyn Clock>,
    progress_interval: Duration,
}

impl<R: JobRunner> TokioJobExecutor<R> {
    pub fn new(
        runner: R,
        reporter: Reporter,
        clock: Arc<dyn Clock>,
        progress_interval: Duration,
    ) -> MigrationResult<Self> {
        if progress_interval.is_zero() {
            return Err(MigrationError::Config("progress interval must be positive".into()));
        }
        Ok(Self {
            runner: Arc::new(runner),
            reporter,
            clock,
            progress_interval,
        })
    }
}

impl<R: JobRunner> JobExecutor<DestinationJob> for TokioJobExecutor<R> {
    type Handle = TokioJobHandle;

    fn start_destination_job(&self, job: DestinationJob) -> TokioJobHandle {
        let label = job.label();
        let status = JobStatus {
            job_id: job.id.to_string(),
            started_on: self.clock.now(),
            request_type: job.type_name.clone(),
        };
        let runner = Arc::clone(&self.runner);
        let reporter = self.reporter.clone();
        let period = self.progress_interval;

        debug!(job = %label, "starting destination job");
        let handle = tokio::spawn(async move {
            let run = runner.run(job);
            tokio::pin!(run);

            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    outcome = &mut run => return outcome,
                    _ = ticker.tick() => {
                        reporter.report_progress(JobTarget::Destination, &status);
                    }
                }
            }
        });

        TokioJobHandle { label, handle }
    }
}

/// Wraps the job task's `JoinHandle`.
pub struct TokioJobHandle {
    label: String,
    handle: JoinHandle<JobOutcome>,
}

#[async_trait]
impl JobHandle for TokioJobHandle {
    fn is_terminated(&self) -> bool {
        self.handle.is_finished()
    }

    async fn outcome(self) -> JobOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job = %self.label, error = %e, "destination job panicked");
                JobOutcome::Fatal(MigrationError::JobPanicked(format!("{}: {}", self.label, e)))
            }
        }
    }
}
