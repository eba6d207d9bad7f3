//! Bounded-concurrency migration of primary types to a destination store.
//!
//! The [`MigrationDriver`] is written against three collaborators: a
//! [`JobSource`] that turns type metadata into jobs, a [`JobExecutor`] that
//! starts them, and a [`typemig_core::Clock`] to wait on. Default
//! implementations ship alongside: [`BatchedJobSource`] and
//! [`TokioJobExecutor`]. [`MigrationClient`] re-runs the whole batch when a run
//! reports that another pass is needed.

pub mod client;
pub mod driver;
pub mod executor;
pub mod job;
pub mod source;

pub use client::MigrationClient;
pub use driver::{MigrationDriver, POLL_INTERVAL};
pub use executor::{JobRunner, TokioJobExecutor, TokioJobHandle};
pub use job::{JobExecutor, JobHandle, JobOutcome, JobSource, PrimaryTypeMigration};
pub use source::{BatchedJobSource, DestinationJob};
