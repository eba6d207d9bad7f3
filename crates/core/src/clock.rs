//! Wall-time abstraction.
//!
//! Everything that waits goes through [`Clock`] so tests can count sleeps
//! and fail them on demand instead of burning real time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::{MigrationError, MigrationResult};

#[async_trait]
pub trait Clock: Send + Sync {
    /// Wait for `duration`. Fails with [`MigrationError::Interrupted`] when the
    /// wait is cut short.
    async fn sleep(&self, duration: Duration) -> MigrationResult<()>;

    /// Current wall time.
    fn now(&self) -> DateTime<Utc>;
}

/// Blanket implementation so `Arc<dyn Clock>` can be used directly.
#[async_trait]
impl<T: Clock + ?Sized> Clock for Arc<T> {
    async fn sleep(&self, duration: Duration) -> MigrationResult<()> {
        (**self).sleep(duration).await
    }

    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Tokio-backed clock, optionally wired to an [`Interrupter`].
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    interrupt: Option<watch::Receiver<bool>>,
}

/// Trips every sleep of the paired [`SystemClock`], including future ones.
#[derive(Debug)]
pub struct Interrupter {
    tx: watch::Sender<bool>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.tx.send_replace(true);
    }
}

impl SystemClock {
    /// A clock whose sleeps always run to completion.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock whose sleeps fail once the returned [`Interrupter`] fires.
    pub fn interruptible() -> (Self, Interrupter) {
        let (tx, rx) = watch::channel(false);
        (Self { interrupt: Some(rx) }, Interrupter { tx })
    }
}

/// Resolves to `true` once interrupted, `false` if the interrupter is gone.
async fn wait_for_interrupt(mut rx: watch::Receiver<bool>) -> bool {
    loop {
        if *rx.borrow_and_update() {
            return true;
        }
        if rx.changed().await.is_err() {
            return false;
        }
    }
}

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration) -> MigrationResult<()> {
        let Some(rx) = self.interrupt.clone() else {
            tokio::time::sleep(duration).await;
            return Ok(());
        };

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            true = wait_for_interrupt(rx) => Err(MigrationError::Interrupted(format!(
                "sleep of {}ms interrupted",
                duration.as_millis()
            ))),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
