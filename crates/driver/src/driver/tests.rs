use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};

use typemig_core::{
    Clock, MigrationError, MigrationResult, MigrationRunSummary, PrimaryTypeMetadata, RetrySignal,
};

use super::{MigrationDriver, POLL_INTERVAL};
use crate::job::{JobExecutor, JobHandle, JobOutcome, JobSource, PrimaryTypeMigration};

#[derive(Debug, Clone, Copy)]
enum Script {
    Success,
    Retry(&'static str),
    Fatal(&'static str),
}

/// Job that terminates `ready_after` clock sleeps after it was submitted.
#[derive(Debug, Clone)]
struct TestJob {
    id: usize,
    ready_after: usize,
    script: Script,
}

fn job(id: usize, ready_after: usize, script: Script) -> TestJob {
    TestJob { id, ready_after, script }
}

fn ok(id: usize, ready_after: usize) -> TestJob {
    job(id, ready_after, Script::Success)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Submit(usize),
    Sleep,
}

/// Shared observation point for the fake collaborators.
#[derive(Clone, Default)]
struct World {
    ticks: Arc<AtomicUsize>,
    events: Arc<Mutex<Vec<Event>>>,
    outstanding: Arc<AtomicUsize>,
    outstanding_before_submit: Arc<Mutex<Vec<usize>>>,
    outcomes_taken: Arc<Mutex<Vec<usize>>>,
}

impl World {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn submitted(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Submit(id) => Some(id),
                Event::Sleep => None,
            })
            .collect()
    }

    fn sleeps(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

struct FakeClock {
    world: World,
    interrupt_on_sleep: Option<usize>,
}

#[async_trait]
impl Clock for FakeClock {
    async fn sleep(&self, duration: Duration) -> MigrationResult<()> {
        assert_eq!(duration, POLL_INTERVAL);
        let n = self.world.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        self.world.events.lock().unwrap().push(Event::Sleep);
        if self.interrupt_on_sleep == Some(n) {
            return Err(MigrationError::Interrupted(format!("sleep {n}")));
        }
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct ScriptedSource {
    jobs: Vec<MigrationResult<TestJob>>,
}

impl ScriptedSource {
    fn new(jobs: Vec<TestJob>) -> Self {
        Self {
            jobs: jobs.into_iter().map(Ok).collect(),
        }
    }
}

impl JobSource for ScriptedSource {
    type Job = TestJob;

    fn build_destination_jobs<'a>(
        &'a self,
        _types: &'a [PrimaryTypeMetadata],
    ) -> BoxStream<'a, MigrationResult<TestJob>> {
        stream::iter(self.jobs.iter().map(|j| match j {
            Ok(job) => Ok(job.clone()),
            Err(e) => Err(MigrationError::JobSource(e.to_string())),
        }))
        .boxed()
    }
}

struct RecordingExecutor {
    world: World,
}

impl JobExecutor<TestJob> for RecordingExecutor {
    type Handle = TestHandle;

    fn start_destination_job(&self, job: TestJob) -> TestHandle {
        let before = self.world.outstanding.fetch_add(1, Ordering::SeqCst);
        self.world.outstanding_before_submit.lock().unwrap().push(before);
        self.world.events.lock().unwrap().push(Event::Submit(job.id));
        TestHandle {
            start_tick: self.world.ticks.load(Ordering::SeqCst),
            job,
            world: self.world.clone(),
        }
    }
}

struct TestHandle {
    job: TestJob,
    start_tick: usize,
    world: World,
}

#[async_trait]
impl JobHandle for TestHandle {
    fn is_terminated(&self) -> bool {
        self.world.ticks.load(Ordering::SeqCst) >= self.start_tick + self.job.ready_after
    }

    async fn outcome(self) -> JobOutcome {
        self.world.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.world.outcomes_taken.lock().unwrap().push(self.job.id);
        match self.job.script {
            Script::Success => JobOutcome::Success,
            Script::Retry(reason) => {
                JobOutcome::Retry(RetrySignal::new(format!("job-{}", self.job.id), reason))
            }
            Script::Fatal(reason) => JobOutcome::Fatal(MigrationError::JobFailed(reason.into())),
        }
    }
}

fn driver_with(
    max: usize,
    source: ScriptedSource,
    interrupt_on_sleep: Option<usize>,
) -> (MigrationDriver<ScriptedSource, RecordingExecutor>, World) {
    let world = World::default();
    let clock = Arc::new(FakeClock {
        world: world.clone(),
        interrupt_on_sleep,
    });
    let executor = RecordingExecutor { world: world.clone() };
    let driver = MigrationDriver::new(max, source, executor, clock).unwrap();
    (driver, world)
}

fn driver(max: usize, jobs: Vec<TestJob>) -> (MigrationDriver<ScriptedSource, RecordingExecutor>, World) {
    driver_with(max, ScriptedSource::new(jobs), None)
}

fn types() -> Vec<PrimaryTypeMetadata> {
    vec![PrimaryTypeMetadata::new("NODE", 10)]
}

#[tokio::test]
async fn empty_input_is_a_clean_noop() {
    let (driver, world) = driver(3, vec![]);

    let summary = driver.run(&[]).await.unwrap();

    assert_eq!(summary, MigrationRunSummary::default());
    assert!(world.events().is_empty());
    assert_eq!(world.sleeps(), 0);
}

#[tokio::test]
async fn zero_concurrency_is_rejected() {
    let world = World::default();
    let clock = Arc::new(FakeClock {
        world: world.clone(),
        interrupt_on_sleep: None,
    });
    let result = MigrationDriver::new(
        0,
        ScriptedSource::new(vec![]),
        RecordingExecutor { world },
        clock,
    );
    assert!(matches!(result, Err(MigrationError::Config(_))));
}

#[tokio::test]
async fn cap_is_respected() {
    let jobs = (0..10).map(|id| ok(id, id % 3 + 1)).collect();
    let (driver, world) = driver(3, jobs);

    let summary = driver.run(&types()).await.unwrap();

    let before = world.outstanding_before_submit.lock().unwrap().clone();
    assert_eq!(before.len(), 10);
    for (i, n) in before.iter().enumerate() {
        assert!(*n < 3, "submission {i} saw {n} active jobs");
    }
    assert_eq!(summary.submitted, 10);
    assert_eq!(summary.succeeded + summary.outstanding, 10);
    assert!(summary.outstanding < 3);
}

#[tokio::test]
async fn drains_before_admitting_at_cap() {
    let jobs = (0..4).map(|id| ok(id, 1)).collect();
    let (driver, world) = driver(2, jobs);

    let summary = driver.run(&types()).await.unwrap();

    assert_eq!(
        world.events(),
        vec![
            Event::Submit(0),
            Event::Submit(1),
            Event::Sleep,
            Event::Submit(2),
            Event::Submit(3),
            Event::Sleep,
        ]
    );
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.poll_cycles, 2);
    assert_eq!(summary.outstanding, 0);
}

#[tokio::test]
async fn keeps_polling_until_a_slot_frees() {
    let (driver, world) = driver(1, vec![ok(1, 3), ok(2, 0)]);

    let summary = driver.run(&types()).await.unwrap();

    assert_eq!(
        world.events(),
        vec![
            Event::Submit(1),
            Event::Sleep,
            Event::Sleep,
            Event::Sleep,
            Event::Submit(2),
            Event::Sleep,
        ]
    );
    assert_eq!(summary.poll_cycles, 4);
    assert_eq!(summary.succeeded, 2);
}

#[tokio::test]
async fn jobs_under_the_cap_are_left_outstanding() {
    let (driver, world) = driver(5, vec![ok(1, 1), ok(2, 1), ok(3, 1)]);

    let summary = driver.run(&types()).await.unwrap();

    assert_eq!(world.sleeps(), 0);
    assert_eq!(summary.submitted, 3);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.outstanding, 3);
    assert!(world.outcomes_taken.lock().unwrap().is_empty());
}

#[tokio::test]
async fn retry_is_deferred_until_every_job_is_submitted() {
    let jobs = vec![
        ok(1, 0),
        job(2, 0, Script::Retry("row count mismatch")),
        ok(3, 0),
        ok(4, 0),
    ];
    let (driver, world) = driver(1, jobs);

    let err = driver.run(&types()).await.unwrap_err();

    assert_eq!(world.submitted(), vec![1, 2, 3, 4]);
    assert_eq!(*world.outcomes_taken.lock().unwrap(), vec![1, 2, 3, 4]);
    match err {
        MigrationError::RetryNeeded(signal) => {
            assert_eq!(signal.job, "job-2");
            assert_eq!(signal.reason, "row count mismatch");
        }
        other => panic!("expected RetryNeeded, got {other:?}"),
    }
}

#[tokio::test]
async fn last_retry_signal_wins() {
    let jobs = vec![
        job(1, 0, Script::Retry("first")),
        job(2, 0, Script::Retry("second")),
    ];
    let (driver, _world) = driver(1, jobs);

    let err = driver.run(&types()).await.unwrap_err();

    match err {
        MigrationError::RetryNeeded(signal) => {
            assert_eq!(signal, RetrySignal::new("job-2", "second"));
        }
        other => panic!("expected RetryNeeded, got {other:?}"),
    }
}

#[tokio::test]
async fn fatal_aborts_without_submitting_more() {
    let jobs = vec![ok(1, 0), job(2, 0, Script::Fatal("destination rejected batch")), ok(3, 0)];
    let (driver, world) = driver(1, jobs);

    let err = driver.run(&types()).await.unwrap_err();

    assert!(matches!(err, MigrationError::JobFailed(ref msg) if msg == "destination rejected batch"));
    assert_eq!(world.submitted(), vec![1, 2]);
}

#[tokio::test]
async fn fatal_abandons_outstanding_jobs() {
    let jobs = vec![ok(1, 100), job(2, 1, Script::Fatal("boom")), ok(3, 0)];
    let (driver, world) = driver(2, jobs);

    let err = driver.run(&types()).await.unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(world.submitted(), vec![1, 2]);
    // Job 1 was never waited on.
    assert_eq!(*world.outcomes_taken.lock().unwrap(), vec![2]);
    assert_eq!(world.outstanding.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fatal_after_retry_is_still_fatal() {
    let jobs = vec![job(1, 0, Script::Retry("later")), job(2, 0, Script::Fatal("now")), ok(3, 0)];
    let (driver, world) = driver(1, jobs);

    let err = driver.run(&types()).await.unwrap_err();

    assert!(matches!(err, MigrationError::JobFailed(_)));
    assert_eq!(world.submitted(), vec![1, 2]);
}

#[tokio::test]
async fn interrupted_sleep_is_fatal() {
    let jobs = vec![ok(1, 5), ok(2, 0), ok(3, 0)];
    let (driver, world) = driver_with(1, ScriptedSource::new(jobs), Some(2));

    let err = driver.run(&types()).await.unwrap_err();

    assert!(matches!(err, MigrationError::Interrupted(_)));
    assert_eq!(world.submitted(), vec![1]);
    assert_eq!(world.sleeps(), 2);
}

#[tokio::test]
async fn job_source_error_is_fatal() {
    let source = ScriptedSource {
        jobs: vec![
            Ok(ok(1, 0)),
            Err(MigrationError::JobSource("count query failed".into())),
            Ok(ok(3, 0)),
        ],
    };
    let (driver, world) = driver_with(5, source, None);

    let err = driver.run(&types()).await.unwrap_err();

    assert!(matches!(err, MigrationError::JobSource(_)));
    assert_eq!(world.submitted(), vec![1]);
}

#[tokio::test]
async fn every_handle_is_accounted_for_once() {
    let jobs = (0..8).map(|id| ok(id, (id * 7) % 4)).collect();
    let (driver, world) = driver(2, jobs);

    let summary = driver.run(&types()).await.unwrap();

    let mut taken = world.outcomes_taken.lock().unwrap().clone();
    let count = taken.len();
    taken.sort_unstable();
    taken.dedup();
    assert_eq!(taken.len(), count, "an outcome was retrieved twice");
    assert_eq!(summary.succeeded, count);
    assert_eq!(summary.succeeded + summary.outstanding, 8);
}

#[tokio::test]
async fn usable_through_the_migration_trait() {
    let (driver, world) = driver(1, vec![ok(1, 0), ok(2, 0)]);
    let migration: Arc<dyn PrimaryTypeMigration> = Arc::new(driver);

    let summary = migration.migrate_primary_types(&types()).await.unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(world.submitted(), vec![1, 2]);
}
