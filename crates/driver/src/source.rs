//! Default job source: fixed-size batches per primary type.

use std::fmt;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use typemig_core::{MigrationError, MigrationResult, PrimaryTypeMetadata};

use crate::job::JobSource;

/// One batch of units of a single type to copy to the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationJob {
    pub id: Uuid,
    pub type_name: String,
    /// First unit covered by this job.
    pub offset: u64,
    /// Number of units covered.
    pub limit: u64,
}

impl DestinationJob {
    /// Short human label, e.g. `NODE[0..100)`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DestinationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{})", self.type_name, self.offset, self.offset + self.limit)
    }
}

/// Splits every primary type into jobs of at most `batch_size` units.
#[derive(Debug, Clone)]
pub struct BatchedJobSource {
    batch_size: u64,
}

impl BatchedJobSource {
    pub fn new(batch_size: u64) -> MigrationResult<Self> {
        if batch_size == 0 {
            return Err(MigrationError::Config("batch size must be positive".into()));
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }
}

fn batches(meta: &PrimaryTypeMetadata, batch_size: u64) -> impl Iterator<Item = DestinationJob> + '_ {
    let count = meta.count;
    let step = usize::try_from(batch_size).unwrap_or(usize::MAX);
    (0..count)
        .step_by(step)
        .map(move |offset| DestinationJob {
            id: Uuid::new_v4(),
            type_name: meta.type_name.clone(),
            offset,
            limit: batch_size.min(count - offset),
        })
}

impl JobSource for BatchedJobSource {
    type Job = DestinationJob;

    fn build_destination_jobs<'a>(
        &'a self,
        types: &'a [PrimaryTypeMetadata],
    ) -> BoxStream<'a, MigrationResult<DestinationJob>> {
        let batch_size = self.batch_size;
        stream::iter(types.iter().flat_map(move |meta| batches(meta, batch_size)))
            .map(Ok)
            .boxed()
    }
}
