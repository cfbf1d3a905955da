//! Implements the background scheduler that runs the due-transaction
//! processor and the report jobs on their configured timetables.

use std::{
    collections::HashMap,
    fmt::Display,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::Serialize;
use serde_json::json;
use time::{Duration, OffsetDateTime, Time, Weekday};
use tokio::task::JoinHandle;

use crate::{
    Error,
    clock::Clock,
    notify::{NotificationKind, Notifier},
    processor::{DueTransactionProcessor, ProcessingSummary},
    schedule,
    stores::{LedgerStore, RecurringTransactionStore},
    timezone,
};

/// The background jobs the scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobName {
    /// Materializes due recurring transactions.
    DueTransactions,
    /// Emits the daily budget alert notification.
    BudgetAlerts,
    /// Emits the weekly report notification.
    WeeklyReports,
    /// Emits the monthly report notification.
    MonthlyReports,
}

impl JobName {
    /// Every job the scheduler knows about.
    pub const ALL: [JobName; 4] = [
        JobName::DueTransactions,
        JobName::BudgetAlerts,
        JobName::WeeklyReports,
        JobName::MonthlyReports,
    ];

    /// The stable string tag used in logs and notification payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            JobName::DueTransactions => "due_transactions",
            JobName::BudgetAlerts => "budget_alerts",
            JobName::WeeklyReports => "weekly_reports",
            JobName::MonthlyReports => "monthly_reports",
        }
    }
}

impl Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// When a job fires, expressed in the scheduler's configured timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Every day at the given local time.
    Daily(Time),
    /// Every week on the given weekday at the given local time.
    Weekly(Weekday, Time),
    /// Every month on the given day (1-31, clamped to the month's length) at
    /// the given local time.
    Monthly(u8, Time),
}

impl JobSchedule {
    /// The first instant strictly after `now_local` at which the schedule
    /// fires.
    ///
    /// `now_local` must carry the offset of the scheduler's timezone; the
    /// result carries the same offset.
    pub fn next_fire(&self, now_local: OffsetDateTime) -> OffsetDateTime {
        match *self {
            JobSchedule::Daily(time) => {
                let candidate = now_local.replace_time(time);

                if candidate > now_local {
                    candidate
                } else {
                    candidate + Duration::days(1)
                }
            }
            JobSchedule::Weekly(weekday, time) => {
                let days_until = (weekday.number_days_from_sunday() + 7
                    - now_local.weekday().number_days_from_sunday())
                    % 7;
                let candidate =
                    now_local.replace_time(time) + Duration::days(i64::from(days_until));

                if candidate > now_local {
                    candidate
                } else {
                    candidate + Duration::days(7)
                }
            }
            JobSchedule::Monthly(day, time) => {
                let this_month =
                    schedule::clamped_date(now_local.year(), now_local.month(), day);
                let candidate = this_month
                    .with_time(time)
                    .assume_offset(now_local.offset());

                if candidate > now_local {
                    candidate
                } else {
                    schedule::months_after(this_month, 1, Some(day))
                        .with_time(time)
                        .assume_offset(now_local.offset())
                }
            }
        }
    }
}

/// When each job fires, and in which timezone the fire times are read.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// The canonical timezone (e.g. `"Pacific/Auckland"`) job times are
    /// expressed in.
    pub timezone: String,
    /// When the due-transaction job fires.
    pub due_transactions: JobSchedule,
    /// When the budget alert job fires.
    pub budget_alerts: JobSchedule,
    /// When the weekly report job fires.
    pub weekly_reports: JobSchedule,
    /// When the monthly report job fires.
    pub monthly_reports: JobSchedule,
}

impl Default for SchedulerConfig {
    /// Due transactions shortly after midnight, budget alerts at 09:00,
    /// weekly reports on Monday at 08:00, and monthly reports on the 1st at
    /// 08:00, all in UTC.
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            due_transactions: JobSchedule::Daily(Time::MIDNIGHT + Duration::minutes(5)),
            budget_alerts: JobSchedule::Daily(Time::MIDNIGHT + Duration::hours(9)),
            weekly_reports: JobSchedule::Weekly(
                Weekday::Monday,
                Time::MIDNIGHT + Duration::hours(8),
            ),
            monthly_reports: JobSchedule::Monthly(1, Time::MIDNIGHT + Duration::hours(8)),
        }
    }
}

impl SchedulerConfig {
    /// The schedule configured for `job`.
    pub fn schedule_for(&self, job: JobName) -> JobSchedule {
        match job {
            JobName::DueTransactions => self.due_transactions,
            JobName::BudgetAlerts => self.budget_alerts,
            JobName::WeeklyReports => self.weekly_reports,
            JobName::MonthlyReports => self.monthly_reports,
        }
    }
}

/// The observable state of one scheduled job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    /// Which job this status describes.
    pub name: JobName,
    /// Whether a timer for the job is armed.
    pub scheduled: bool,
    /// Whether the job is executing right now.
    pub running: bool,
}

/// The observable state of the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    /// Whether the scheduler has been started.
    pub is_running: bool,
    /// Per-job state, in [JobName::ALL] order.
    pub jobs: Vec<JobStatus>,
}

struct TimerHandle {
    task: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

/// Runs the due-transaction processor and the report jobs on their
/// configured timetables.
///
/// Jobs fire at local wall-clock times in the configured timezone. Each
/// job's failures are contained to that run; the timer stays armed.
pub struct Scheduler<R, L, N, C> {
    runner: Arc<JobRunner<R, L, N, C>>,
    config: SchedulerConfig,
    timers: Mutex<HashMap<JobName, TimerHandle>>,
}

impl<R, L, N, C> Scheduler<R, L, N, C>
where
    R: RecurringTransactionStore + Send + 'static,
    L: LedgerStore + Send + 'static,
    N: Notifier + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Create a scheduler that runs `processor` for the due-transaction job
    /// and emits report notifications through `notifier`.
    ///
    /// # Errors
    /// This function will return an [Error::InvalidTimezone] if the config's
    /// timezone is not a known timezone name.
    pub fn new(
        processor: DueTransactionProcessor<R, L, N, C>,
        notifier: N,
        clock: C,
        config: SchedulerConfig,
    ) -> Result<Self, Error> {
        // Surface a bad timezone at startup rather than on the first fire.
        timezone::local_offset(&config.timezone, clock.now())?;

        Ok(Self {
            runner: Arc::new(JobRunner {
                processor: Mutex::new(processor),
                notifier,
                clock,
                timezone: config.timezone.clone(),
            }),
            config,
            timers: Mutex::new(HashMap::new()),
        })
    }

    /// Arm a timer for every job. Jobs that already have a timer are left
    /// alone, so calling this twice is harmless.
    pub fn start(&self) {
        let mut timers = self.timers.lock().unwrap();

        if !timers.is_empty() {
            tracing::info!("scheduler is already running");
            return;
        }

        tracing::info!(timezone = %self.config.timezone, "starting scheduler");

        for job in JobName::ALL {
            let runner = Arc::clone(&self.runner);
            let job_schedule = self.config.schedule_for(job);
            let running = Arc::new(AtomicBool::new(false));
            let running_flag = Arc::clone(&running);

            let task = tokio::spawn(async move {
                loop {
                    let delay = runner.duration_until_fire(job_schedule);
                    tracing::debug!(job = %job, delay_secs = delay.as_secs(), "job timer armed");

                    tokio::time::sleep(delay).await;

                    running_flag.store(true, Ordering::SeqCst);
                    runner.run(job);
                    running_flag.store(false, Ordering::SeqCst);
                }
            });

            timers.insert(job, TimerHandle { task, running });
        }
    }

    /// Disarm every job timer. Jobs already disarmed are left alone, so
    /// calling this twice is harmless.
    pub fn stop(&self) {
        let mut timers = self.timers.lock().unwrap();

        if timers.is_empty() {
            tracing::info!("scheduler is already stopped");
            return;
        }

        tracing::info!("stopping scheduler");

        for (_, handle) in timers.drain() {
            handle.task.abort();
        }
    }

    /// The scheduler's current state.
    pub fn status(&self) -> SchedulerStatus {
        let timers = self.timers.lock().unwrap();

        let jobs = JobName::ALL
            .into_iter()
            .map(|name| JobStatus {
                name,
                scheduled: timers.contains_key(&name),
                running: timers
                    .get(&name)
                    .is_some_and(|handle| handle.running.load(Ordering::SeqCst)),
            })
            .collect();

        SchedulerStatus {
            is_running: !timers.is_empty(),
            jobs,
        }
    }

    /// Run `job` immediately, without touching its timer.
    pub fn trigger(&self, job: JobName) {
        tracing::info!(job = %job, "job triggered manually");

        self.runner.run(job);
    }

    /// Run the due-transaction processor immediately and return its summary.
    ///
    /// Unlike [Scheduler::trigger], errors are returned to the caller
    /// instead of only being logged.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if the due rows could
    /// not be listed.
    pub fn process_due_transactions_now(
        &self,
        as_of: Option<OffsetDateTime>,
    ) -> Result<ProcessingSummary, Error> {
        self.runner
            .processor
            .lock()
            .unwrap()
            .process_due_transactions(as_of)
    }
}

impl<R, L, N, C> Drop for Scheduler<R, L, N, C> {
    fn drop(&mut self) {
        for (_, handle) in self.timers.lock().unwrap().drain() {
            handle.task.abort();
        }
    }
}

/// The state shared with the spawned job timers.
struct JobRunner<R, L, N, C> {
    processor: Mutex<DueTransactionProcessor<R, L, N, C>>,
    notifier: N,
    clock: C,
    timezone: String,
}

impl<R, L, N, C> JobRunner<R, L, N, C>
where
    R: RecurringTransactionStore,
    L: LedgerStore,
    N: Notifier,
    C: Clock,
{
    fn run(&self, job: JobName) {
        match job {
            JobName::DueTransactions => self.run_due_transactions(),
            JobName::BudgetAlerts => self.run_report(job, NotificationKind::BudgetAlert),
            JobName::WeeklyReports => self.run_report(job, NotificationKind::WeeklyReport),
            JobName::MonthlyReports => self.run_report(job, NotificationKind::MonthlyReport),
        }
    }

    fn run_due_transactions(&self) {
        match self
            .processor
            .lock()
            .unwrap()
            .process_due_transactions(None)
        {
            Ok(summary) => tracing::info!(
                processed = summary.processed_count(),
                "due-transaction run finished"
            ),
            Err(error) => tracing::error!("due-transaction run failed: {error}"),
        }
    }

    fn run_report(&self, job: JobName, kind: NotificationKind) {
        let payload = json!({
            "job": job.as_str(),
            "triggered_at": self.clock.now().to_string(),
        });

        if let Err(error) = self.notifier.notify(kind, payload) {
            tracing::warn!(job = %job, "could not deliver report notification: {error}");
        }
    }

    /// How long to sleep until `job_schedule` next fires in the configured
    /// timezone.
    fn duration_until_fire(&self, job_schedule: JobSchedule) -> std::time::Duration {
        let now_utc = self.clock.now();
        let now_local = match timezone::local_offset(&self.timezone, now_utc) {
            Ok(offset) => now_utc.to_offset(offset),
            // The timezone was validated at construction; fall back to a
            // retry delay rather than panic in the timer task.
            Err(error) => {
                tracing::error!("could not resolve scheduler timezone: {error}");
                return std::time::Duration::from_secs(60);
            }
        };

        let fire_at = job_schedule.next_fire(now_local);

        std::time::Duration::try_from(fire_at - now_local)
            .unwrap_or(std::time::Duration::from_secs(60))
    }
}
