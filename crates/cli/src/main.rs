mod cli;
mod runner;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use typemig_core::{
    load_dotenv, Clock, MigrationConfig, MigrationRunSummary, Reporter, SystemClock, TypeCounts,
};
use typemig_driver::{BatchedJobSource, MigrationClient, MigrationDriver, TokioJobExecutor};

use crate::cli::CliArgs;
use crate::runner::DryRunRunner;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config = MigrationConfig::from_env();
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;
    config.log_summary();

    let counts = TypeCounts::load(&args.input)
        .with_context(|| format!("failed to load counts from {}", args.input.display()))?;

    // Ctrl-C trips every pending and future sleep, which aborts the run.
    let (system_clock, interrupter) = SystemClock::interruptible();
    let clock: Arc<dyn Clock> = Arc::new(system_clock);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping migration");
            interrupter.interrupt();
        }
    });

    let reporter = Reporter::new(Arc::clone(&clock), config.destination_start_delay());
    reporter.report_count_differences(&counts);

    let executor = TokioJobExecutor::new(
        DryRunRunner::new(Duration::from_millis(args.dry_run_row_ms)),
        reporter.clone(),
        Arc::clone(&clock),
        config.progress_interval(),
    )?;
    let source = BatchedJobSource::new(config.max_batch_size)?;
    let driver = MigrationDriver::from_config(&config, source, executor, Arc::clone(&clock))?;
    let client = MigrationClient::new(Arc::new(driver), reporter, config.max_retries);

    let types = counts.primary_types();
    match client.migrate(&types).await {
        Ok(summary) => {
            info!(
                "Migration finished: {} jobs submitted, {} confirmed, {} still running at exit",
                summary.submitted, summary.succeeded, summary.outstanding
            );
            if let Some(message) = abandoned_jobs_warning(&summary) {
                warn!("{}", message);
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Migration failed");
            Err(e).context("migration failed")
        }
    }
}

/// Exiting drops the runtime, which cancels destination jobs still in flight.
fn abandoned_jobs_warning(summary: &MigrationRunSummary) -> Option<String> {
    (summary.outstanding > 0).then(|| {
        format!(
            "Abandoning {} destination job(s) still running at exit",
            summary.outstanding
        )
    })
}
