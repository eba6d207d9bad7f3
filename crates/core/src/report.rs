//! Human-readable migration reporting: start countdown, count differences
//! and progress lines for jobs that are still running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::clock::Clock;
use crate::error::MigrationResult;
use crate::types::{JobStatus, JobTarget, TypeCounts};

pub const ONE_SECOND: Duration = Duration::from_secs(1);
pub const STARTING_MIGRATION: &str = "Starting migration";

pub fn countdown_message(seconds: u64) -> String {
    format!("Migration will start in {seconds} seconds...")
}

/// Format an elapsed time in milliseconds as `HH:MM:SS.mmm`.
pub fn format_elapse(elapse_ms: u64) -> String {
    let hours = elapse_ms / 3_600_000;
    let minutes = (elapse_ms / 60_000) % 60;
    let seconds = (elapse_ms / 1_000) % 60;
    let millis = elapse_ms % 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

#[derive(Clone)]
pub struct Reporter {
    clock: Arc<dyn Clock>,
    start_delay: Duration,
}

impl Reporter {
    pub fn new(clock: Arc<dyn Clock>, start_delay: Duration) -> Self {
        Self { clock, start_delay }
    }

    /// Count down whole seconds of the start delay, one sleep per second.
    pub async fn run_countdown_before_start(&self) -> MigrationResult<()> {
        let seconds = self.start_delay.as_secs();
        for remaining in (1..=seconds).rev() {
            info!("{}", countdown_message(remaining));
            self.clock.sleep(ONE_SECOND).await?;
        }
        info!("{}", STARTING_MIGRATION);
        Ok(())
    }

    /// Log how destination counts differ from the source.
    ///
    /// Types present on both sides are only reported when the counts
    /// differ; types missing from the source are always reported.
    pub fn report_count_differences(&self, counts: &TypeCounts) -> Vec<String> {
        let source: HashMap<&str, u64> = counts
            .source
            .iter()
            .map(|c| (c.type_name.as_str(), c.count))
            .collect();

        let mut lines = Vec::new();
        for dest in &counts.destination {
            let line = match source.get(dest.type_name.as_str()) {
                Some(&src) if src == dest.count => continue,
                Some(&src) => format!(
                    "\t{}:\t{}\t{}\t{}",
                    dest.type_name,
                    dest.count as i128 - src as i128,
                    src,
                    dest.count
                ),
                None => format!("\t{}\tNA\t{}", dest.type_name, dest.count),
            };
            info!("{}", line);
            lines.push(line);
        }
        lines
    }

    /// Log how long a job has been running.
    pub fn report_progress(&self, target: JobTarget, status: &JobStatus) -> String {
        let elapse_ms = (self.clock.now() - status.started_on)
            .num_milliseconds()
            .max(0) as u64;
        let line = format!(
            "Waiting for jobId {} on {} of type '{}' elapse: {}",
            status.job_id,
            target,
            status.request_type,
            format_elapse(elapse_ms)
        );
        info!("{}", line);
        line
    }
}
