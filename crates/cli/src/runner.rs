//! Dry-run job runner: performs no data copy, only simulates the time a
//! batch would take.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use typemig_driver::{DestinationJob, JobOutcome, JobRunner};

pub struct DryRunRunner {
    per_unit: Duration,
}

impl DryRunRunner {
    pub fn new(per_unit: Duration) -> Self {
        Self { per_unit }
    }

    fn simulated_duration(&self, job: &DestinationJob) -> Duration {
        self.per_unit.saturating_mul(u32::try_from(job.limit).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl JobRunner for DryRunRunner {
    async fn run(&self, job: DestinationJob) -> JobOutcome {
        let took = self.simulated_duration(&job);
        tokio::time::sleep(took).await;
        debug!(job = %job, took_ms = took.as_millis() as u64, "dry-run job finished");
        JobOutcome::Success
    }
}
