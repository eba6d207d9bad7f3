use tracing::{debug, warn};

use typemig_core::{MigrationResult, RetrySignal};

use crate::job::{JobHandle, JobOutcome};

/// What one drain pass observed.
#[derive(Debug, Default)]
pub(crate) struct Drained {
    pub succeeded: usize,
    pub retries: usize,
    /// Last retry signal seen in this pass.
    pub last_retry: Option<RetrySignal>,
}

/// Handles whose termination has not been observed, in submission order.
pub(crate) struct ActiveSet<H> {
    handles: Vec<H>,
}

impl<H: JobHandle> ActiveSet<H> {
    pub fn new() -> Self {
        Self { handles: Vec::new() }
    }

    pub fn push(&mut self, handle: H) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Remove every terminated handle and collect its outcome.
    ///
    /// Retry signals don't stop the pass. A fatal outcome returns at once and
    /// leaves the handles after it unchecked.
    pub async fn drain_terminated(&mut self) -> MigrationResult<Drained> {
        let mut drained = Drained::default();
        let mut i = 0;
        while i < self.handles.len() {
            if !self.handles[i].is_terminated() {
                i += 1;
                continue;
            }

            let handle = self.handles.remove(i);
            match handle.outcome().await {
                JobOutcome::Success => drained.succeeded += 1,
                JobOutcome::Retry(signal) => {
                    warn!(job = %signal.job, reason = %signal.reason, "job needs another migration run");
                    drained.retries += 1;
                    drained.last_retry = Some(signal);
                }
                JobOutcome::Fatal(err) => return Err(err),
            }
        }

        debug!(
            "drained {} succeeded, {} retries, {} still active",
            drained.succeeded,
            drained.retries,
            self.handles.len()
        );
        Ok(drained)
    }
}
