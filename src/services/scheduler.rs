//! Cron-driven background jobs.
//!
//! Each registered job gets its own driver task that sleeps until the
//! next cron firing, runs the job, and repeats until shutdown. Jobs
//! guard against overlapping runs of themselves; different jobs run
//! independently.

use chrono::{DateTime, Utc};
use cron::Schedule;
use futures::future::BoxFuture;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::services::{EventService, PromotionService, TransactionService};

type JobFn = Arc<dyn Fn() -> BoxFuture<'static, Result<u64, AppError>> + Send + Sync>;

/// One recurring job: a cron schedule plus the work to run on each
/// firing. The work reports how many items it processed.
pub struct Job {
    name: &'static str,
    schedule: Schedule,
    run: JobFn,
    running: AtomicBool,
    runs: AtomicU64,
    failures: AtomicU64,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

/// Snapshot of one job's counters.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobStatus {
    pub name: String,
    pub runs: u64,
    pub failures: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new<F, Fut>(
        name: &'static str,
        expression: &str,
        run: F,
    ) -> Result<Self, cron::error::Error>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<u64, AppError>> + Send + 'static,
    {
        let schedule = Schedule::from_str(expression)?;
        let run: JobFn = Arc::new(move || {
            let fut: BoxFuture<'static, Result<u64, AppError>> = Box::pin(run());
            fut
        });

        Ok(Self {
            name,
            schedule,
            run,
            running: AtomicBool::new(false),
            runs: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_run: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Next scheduled firing strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Runs the job once. A tick that finds the previous run still in
    /// flight is skipped, not queued.
    pub async fn run_once(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Job {} still running, skipping this tick", self.name);
            return;
        }

        let started = Utc::now();
        match (self.run)().await {
            Ok(0) => {
                self.runs.fetch_add(1, Ordering::SeqCst);
                debug!("Job {} found nothing to process", self.name);
            }
            Ok(count) => {
                self.runs.fetch_add(1, Ordering::SeqCst);
                info!("Job {} processed {} item(s)", self.name, count);
            }
            Err(e) => {
                self.runs.fetch_add(1, Ordering::SeqCst);
                self.failures.fetch_add(1, Ordering::SeqCst);
                error!("Job {} failed: {}", self.name, e);
            }
        }

        if let Ok(mut last) = self.last_run.lock() {
            *last = Some(started);
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            name: self.name.to_string(),
            runs: self.runs.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
            last_run: self.last_run.lock().ok().and_then(|last| *last),
            next_run: self.next_after(Utc::now()),
        }
    }
}

/// Owns the registered jobs and their driver tasks.
pub struct JobScheduler {
    jobs: Vec<Arc<Job>>,
    shutdown: watch::Sender<bool>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown,
        }
    }

    pub fn register(&mut self, job: Job) {
        self.jobs.push(Arc::new(job));
    }

    pub fn status(&self) -> Vec<JobStatus> {
        self.jobs.iter().map(|job| job.status()).collect()
    }

    /// Spawns one driver task per registered job. Drivers stop on
    /// `shutdown` (or when the scheduler is dropped).
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.jobs
            .iter()
            .map(|job| {
                let job = job.clone();
                let mut shutdown = self.shutdown.subscribe();
                tokio::spawn(async move {
                    info!("Job {} scheduled", job.name());
                    loop {
                        let Some(next) = job.next_after(Utc::now()) else {
                            warn!("Job {} has no future firing, stopping", job.name());
                            return;
                        };
                        let wait = (next - Utc::now()).to_std().unwrap_or_default();
                        tokio::select! {
                            _ = sleep(wait) => job.run_once().await,
                            _ = shutdown.changed() => {
                                info!("Job {} driver stopped", job.name());
                                return;
                            }
                        }
                    }
                })
            })
            .collect()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the four recurring sweeps from the configured cron
/// expressions.
pub fn sweep_jobs(
    config: &Config,
    transactions: Arc<TransactionService>,
    events: Arc<EventService>,
    promotions: Arc<PromotionService>,
) -> Result<Vec<Job>, cron::error::Error> {
    let events_job = Job::new("event-status-sync", &config.event_sync_schedule, move || {
        let events = events.clone();
        async move {
            let report = events.sync_statuses(Utc::now()).await?;
            Ok(report.activated + report.ended)
        }
    })?;

    let txs = transactions.clone();
    let payment_sweep = Job::new(
        "expired-payment-sweep",
        &config.payment_sweep_schedule,
        move || {
            let txs = txs.clone();
            async move { txs.sweep_expired_payments(Utc::now()).await }
        },
    )?;

    let txs = transactions;
    let confirmation_sweep = Job::new(
        "expired-confirmation-sweep",
        &config.confirmation_sweep_schedule,
        move || {
            let txs = txs.clone();
            async move { txs.sweep_expired_confirmations(Utc::now()).await }
        },
    )?;

    let promotion_sweep = Job::new(
        "promotion-expiry-sweep",
        &config.promotion_sweep_schedule,
        move || {
            let promotions = promotions.clone();
            async move { promotions.deactivate_expired(Utc::now()).await }
        },
    )?;

    Ok(vec![
        events_job,
        payment_sweep,
        confirmation_sweep,
        promotion_sweep,
    ])
}
