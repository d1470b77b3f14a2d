//! Running the background jobs on their cadences.
//!
//! Every scheduled job gets its own timer task. When the timer fires a fresh run is spawned, so a
//! slow run never delays the next one and runs of different jobs never wait on each other. Runs
//! carry no state between them; each one re-derives what it needs from the runtime. Finished runs
//! publish a [`JobReport`] on a broadcast channel.

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use serde::Serialize;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{GarbageCollector, GcReport, ImagePrefetcher, PrefetchReport};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const REPORT_CHANNEL_CAPACITY: usize = 64;

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A job the scheduler knows how to run.
#[derive(Clone)]
pub enum Job {
    /// Delete boxes older than their TTL.
    CollectGarbage(GarbageCollector),

    /// Pull every catalog image.
    PrefetchImages(ImagePrefetcher),
}

/// The outcome of one job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobReport {
    /// A garbage collection run finished.
    CollectGarbage(GcReport),

    /// An image prefetch run finished.
    PrefetchImages(PrefetchReport),
}

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// At a fixed interval, starting one interval after the scheduler starts.
    Every(Duration),

    /// Once a day at the given local time.
    DailyAt(NaiveTime),
}

/// Recurring job runner. Configure it with [`Scheduler::schedule`], then [`Scheduler::start`] it.
pub struct Scheduler {
    entries: Vec<ScheduledJob>,
    reports: broadcast::Sender<JobReport>,
}

/// A running scheduler.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    timers: Vec<JoinHandle<()>>,
    runs: TaskTracker,
    reports: broadcast::Sender<JobReport>,
}

struct ScheduledJob {
    job: Arc<Job>,
    cadence: Cadence,
    run_on_start: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Job {
    /// A short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Job::CollectGarbage(_) => "collect-garbage",
            Job::PrefetchImages(_) => "prefetch-images",
        }
    }

    /// Runs the job once.
    pub async fn run(&self) -> JobReport {
        match self {
            Job::CollectGarbage(gc) => JobReport::CollectGarbage(gc.run().await),
            Job::PrefetchImages(prefetcher) => JobReport::PrefetchImages(prefetcher.run().await),
        }
    }
}

impl Cadence {
    /// How long to wait from `now` until the next firing.
    pub fn delay_from<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        match self {
            Cadence::Every(interval) => *interval,
            Cadence::DailyAt(at) => {
                let tz = now.timezone();
                now.naive_local()
                    .date()
                    .iter_days()
                    .take(3)
                    .flat_map(|date| local_instants(&tz, date.and_time(*at)))
                    .find(|next| next > now)
                    .and_then(|next| (next - now.clone()).to_std().ok())
                    .unwrap_or(ONE_DAY)
            }
        }
    }
}

impl Scheduler {
    /// Creates a scheduler without jobs.
    pub fn new() -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            entries: Vec::new(),
            reports,
        }
    }

    /// Adds a job that fires on `cadence`.
    pub fn schedule(self, cadence: Cadence, job: Job) -> Self {
        self.add(cadence, job, false)
    }

    /// Adds a job that runs once right away and then fires on `cadence`.
    pub fn schedule_and_run(self, cadence: Cadence, job: Job) -> Self {
        self.add(cadence, job, true)
    }

    /// Subscribes to the reports of every run started after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobReport> {
        self.reports.subscribe()
    }

    /// Starts a timer task per job. The jobs stop firing when `cancel` is cancelled.
    pub fn start(self, cancel: CancellationToken) -> SchedulerHandle {
        let runs = TaskTracker::new();
        let timers = self
            .entries
            .into_iter()
            .map(|entry| {
                tokio::spawn(drive(
                    entry,
                    runs.clone(),
                    self.reports.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        SchedulerHandle {
            cancel,
            timers,
            runs,
            reports: self.reports,
        }
    }

    fn add(mut self, cadence: Cadence, job: Job, run_on_start: bool) -> Self {
        self.entries.push(ScheduledJob {
            job: Arc::new(job),
            cadence,
            run_on_start,
        });
        self
    }
}

impl SchedulerHandle {
    /// Subscribes to the reports of every run that finishes after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobReport> {
        self.reports.subscribe()
    }

    /// Stops all timers and waits for runs already in flight.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for timer in self.timers {
            if let Err(e) = timer.await {
                tracing::error!("scheduler timer task failed: {}", e);
            }
        }

        self.runs.close();
        self.runs.wait().await;
        tracing::info!("scheduler stopped");
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Every(interval) => write!(f, "every {}s", interval.as_secs()),
            Cadence::DailyAt(at) => write!(f, "daily at {}", at.format("%H:%M")),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

async fn drive(
    entry: ScheduledJob,
    runs: TaskTracker,
    reports: broadcast::Sender<JobReport>,
    cancel: CancellationToken,
) {
    let name = entry.job.name();
    tracing::info!("scheduled job {} to run {}", name, entry.cadence);

    if entry.run_on_start {
        spawn_run(&entry.job, &runs, &reports);
    }

    loop {
        let delay = entry.cadence.delay_from(&Local::now());
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => spawn_run(&entry.job, &runs, &reports),
        }
    }

    tracing::debug!("stopped scheduling job {}", name);
}

/// The instants a wall-clock time maps to. A time repeated by a DST fall-back maps to both
/// occurrences; a time skipped by a DST gap maps to the same time an hour later.
fn local_instants<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Vec<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(instant) => vec![instant],
        LocalResult::Ambiguous(first, second) => vec![first, second],
        LocalResult::None => tz
            .from_local_datetime(&(local + chrono::Duration::hours(1)))
            .earliest()
            .into_iter()
            .collect(),
    }
}

fn spawn_run(job: &Arc<Job>, runs: &TaskTracker, reports: &broadcast::Sender<JobReport>) {
    let job = Arc::clone(job);
    let reports = reports.clone();
    runs.spawn(async move {
        tracing::debug!("running job {}", job.name());
        let report = job.run().await;
        // Nobody listening is fine.
        let _ = reports.send(report);
    });
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ImageCatalog, ImageSpec, DEFAULT_PULL_TIMEOUT},
        management::GcPolicy,
        runtime::InMemoryRuntime,
    };
    use chrono::{Duration as TimeDelta, FixedOffset, NaiveDate, Utc};

    fn gc_job(runtime: &Arc<InMemoryRuntime>) -> Job {
        Job::CollectGarbage(GarbageCollector::new(runtime.clone(), GcPolicy::default()))
    }

    fn prefetch_job(runtime: &Arc<InMemoryRuntime>) -> Job {
        let catalog = ImageCatalog::new(vec![ImageSpec::new("alpine", ["3.10", "3.11"])]).unwrap();
        Job::PrefetchImages(ImagePrefetcher::new(
            runtime.clone(),
            Arc::new(catalog),
            DEFAULT_PULL_TIMEOUT,
        ))
    }

    #[test]
    fn test_cadence_every_is_constant() {
        let cadence = Cadence::Every(Duration::from_secs(60));
        assert_eq!(cadence.delay_from(&Utc::now()), Duration::from_secs(60));
        assert_eq!(cadence.to_string(), "every 60s");
    }

    #[test]
    fn test_cadence_daily_waits_until_next_occurrence() {
        let midnight = Cadence::DailyAt(NaiveTime::MIN);
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 22, 30, 0).unwrap();
        assert_eq!(midnight.delay_from(&now), Duration::from_secs(90 * 60));

        let at_midnight = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(
            midnight.delay_from(&at_midnight),
            Duration::from_secs(24 * 60 * 60)
        );

        let morning = Cadence::DailyAt(NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        let early = Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap();
        assert_eq!(morning.delay_from(&early), Duration::from_secs(60 * 60));
        assert_eq!(midnight.to_string(), "daily at 00:00");
    }

    #[test]
    fn test_cadence_daily_inside_repeated_hour_never_fires_immediately() {
        let at = Cadence::DailyAt(NaiveTime::from_hms_opt(1, 30, 0).unwrap());

        // 01:15 EDT, before the first 01:30.
        let first = fall_back_at(5, 15);
        assert_eq!(at.delay_from(&first), Duration::from_secs(15 * 60));

        // 01:15 EST, after the first 01:30 but before the second one.
        let second = fall_back_at(6, 15);
        assert_eq!(second.naive_local(), first.naive_local());
        assert_eq!(at.delay_from(&second), Duration::from_secs(15 * 60));

        // 01:45 EST, both occurrences are past.
        let after = fall_back_at(6, 45);
        assert_eq!(
            at.delay_from(&after),
            Duration::from_secs((23 * 60 + 45) * 60)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_gc_on_interval() {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.insert_pod("p1", "termbox", Utc::now() - TimeDelta::hours(7));
        runtime.insert_pod("p2", "termbox", Utc::now());

        let scheduler =
            Scheduler::new().schedule(Cadence::Every(Duration::from_secs(60)), gc_job(&runtime));
        let mut reports = scheduler.subscribe();
        let handle = scheduler.start(CancellationToken::new());

        let started = tokio::time::Instant::now();
        let first = reports.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(60));
        match first {
            JobReport::CollectGarbage(report) => {
                assert_eq!(report.deleted, vec!["p1"]);
                assert_eq!(report.kept, vec!["p2"]);
            }
            other => panic!("unexpected report {:?}", other),
        }

        let second = reports.recv().await.unwrap();
        match second {
            JobReport::CollectGarbage(report) => {
                assert!(report.deleted.is_empty());
                assert_eq!(report.kept, vec!["p2"]);
            }
            other => panic!("unexpected report {:?}", other),
        }

        handle.shutdown().await;
        assert_eq!(runtime.delete_calls(), vec!["p1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_startup_job_immediately() {
        let runtime = Arc::new(InMemoryRuntime::new());
        let scheduler = Scheduler::new().schedule_and_run(
            Cadence::DailyAt(NaiveTime::MIN),
            prefetch_job(&runtime),
        );
        let mut reports = scheduler.subscribe();
        let handle = scheduler.start(CancellationToken::new());

        let report = reports.recv().await.unwrap();
        assert_eq!(
            report,
            JobReport::PrefetchImages(PrefetchReport {
                pulled: vec!["alpine:3.10".to_string(), "alpine:3.11".to_string()],
                failed: vec![],
            })
        );

        handle.shutdown().await;
        assert_eq!(runtime.pull_calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_jobs_fire_independently() {
        let runtime = Arc::new(InMemoryRuntime::new());
        let scheduler = Scheduler::new()
            .schedule(Cadence::Every(Duration::from_secs(60)), gc_job(&runtime))
            .schedule(Cadence::Every(Duration::from_secs(150)), prefetch_job(&runtime));
        let mut reports = scheduler.subscribe();
        let handle = scheduler.start(CancellationToken::new());

        let mut kinds = Vec::new();
        for _ in 0..3 {
            match reports.recv().await.unwrap() {
                JobReport::CollectGarbage(_) => kinds.push("gc"),
                JobReport::PrefetchImages(_) => kinds.push("prefetch"),
            }
        }

        // GC fires at 60s and 120s, prefetch first at 150s.
        assert_eq!(kinds, vec!["gc", "gc", "prefetch"]);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_stops_after_shutdown() {
        let runtime = Arc::new(InMemoryRuntime::new());
        let cancel = CancellationToken::new();
        let scheduler =
            Scheduler::new().schedule(Cadence::Every(Duration::from_secs(60)), gc_job(&runtime));
        let handle = scheduler.start(cancel.clone());

        handle.shutdown().await;
        assert!(cancel.is_cancelled());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(runtime.calls().is_empty());
    }

    /// A zone observing US Eastern time around the 2024-11-03 fall-back, where 01:00 to 02:00
    /// local time happens twice.
    #[derive(Debug, Clone, Copy)]
    struct FallBack;

    impl FallBack {
        fn transition() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 11, 3)
                .unwrap()
                .and_hms_opt(6, 0, 0)
                .unwrap()
        }

        fn edt() -> FixedOffset {
            FixedOffset::west_opt(4 * 60 * 60).unwrap()
        }

        fn est() -> FixedOffset {
            FixedOffset::west_opt(5 * 60 * 60).unwrap()
        }
    }

    impl TimeZone for FallBack {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            FallBack
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let as_edt = *local + chrono::Duration::hours(4) < Self::transition();
            let as_est = *local + chrono::Duration::hours(5) >= Self::transition();
            match (as_edt, as_est) {
                (true, true) => LocalResult::Ambiguous(Self::edt(), Self::est()),
                (true, false) => LocalResult::Single(Self::edt()),
                (false, true) => LocalResult::Single(Self::est()),
                (false, false) => LocalResult::None,
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc < Self::transition() {
                Self::edt()
            } else {
                Self::est()
            }
        }
    }

    fn fall_back_at(utc_hour: u32, utc_minute: u32) -> DateTime<FallBack> {
        FallBack.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 11, 3)
                .unwrap()
                .and_hms_opt(utc_hour, utc_minute, 0)
                .unwrap(),
        )
    }
}
