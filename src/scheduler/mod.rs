//! Recurring maintenance jobs.
//!
//! Each registered job gets its own `tokio::time::interval` loop. A job
//! run that fails is logged and the job stays scheduled for its next
//! interval; stopping the scheduler aborts the tickers without waiting for
//! in-flight runs. Every job is independently idempotent, so an
//! interrupted run is re-done on the next start.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::collector::Collector;
use crate::core::config::settings::SchedulerSettings;
use crate::core::errors::ApiError;
use crate::ingest::Indexer;
use crate::store::VectorStore;

type JobFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), ApiError>> + Send + Sync>;

#[derive(Clone)]
struct RegisteredJob {
    id: String,
    name: String,
    interval_secs: u64,
    next_run: Arc<RwLock<Option<DateTime<Utc>>>>,
    job: JobFn,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: String,
    pub name: String,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub timezone: String,
    pub jobs: Vec<JobStatus>,
}

pub struct Scheduler {
    enabled: bool,
    timezone: String,
    jobs: Mutex<Vec<RegisteredJob>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    running: RwLock<bool>,
}

impl Scheduler {
    pub fn new(cfg: &SchedulerSettings) -> Self {
        Self {
            enabled: cfg.enabled,
            timezone: cfg.timezone.clone(),
            jobs: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            running: RwLock::new(false),
        }
    }

    /// Register a recurring job. Re-registering an id replaces the
    /// previous definition.
    pub async fn register<F>(&self, id: &str, name: &str, interval_secs: u64, job: F)
    where
        F: Fn() -> BoxFuture<'static, Result<(), ApiError>> + Send + Sync + 'static,
    {
        let mut jobs = self.jobs.lock().await;
        jobs.retain(|j| j.id != id);
        jobs.push(RegisteredJob {
            id: id.to_string(),
            name: name.to_string(),
            interval_secs: interval_secs.max(1),
            next_run: Arc::new(RwLock::new(None)),
            job: Arc::new(job),
        });
    }

    /// Spawn one ticker per registered job. A no-op when already running
    /// or globally disabled.
    pub async fn start(&self) {
        if !self.enabled {
            tracing::info!("scheduler is disabled in settings");
            return;
        }

        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!("scheduler is already running");
                return;
            }
            *running = true;
        }

        let jobs = self.jobs.lock().await.clone();
        let mut handles = self.handles.lock().await;

        for job in jobs {
            handles.push(tokio::spawn(run_job_loop(job)));
        }

        tracing::info!(jobs = handles.len(), "scheduler started");
    }

    /// Abort all tickers. Does not wait for in-flight runs.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                tracing::warn!("scheduler is not running");
                return;
            }
            *running = false;
        }

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            handle.abort();
        }

        for job in self.jobs.lock().await.iter() {
            *job.next_run.write().await = None;
        }

        tracing::info!("scheduler stopped");
    }

    /// Pure read of scheduler state; safe alongside job execution.
    pub async fn get_status(&self) -> SchedulerStatus {
        let is_running = *self.running.read().await;
        let jobs = self.jobs.lock().await;

        let mut statuses = Vec::with_capacity(jobs.len());
        for job in jobs.iter() {
            statuses.push(JobStatus {
                id: job.id.clone(),
                name: job.name.clone(),
                next_run: *job.next_run.read().await,
            });
        }

        SchedulerStatus {
            is_running,
            timezone: self.timezone.clone(),
            jobs: statuses,
        }
    }
}

async fn run_job_loop(job: RegisteredJob) {
    let mut ticker =
        tokio::time::interval(std::time::Duration::from_secs(job.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick of a tokio interval fires immediately; consume it so
    // the first run happens one full interval after start
    ticker.tick().await;

    loop {
        *job.next_run.write().await =
            Some(Utc::now() + chrono::Duration::seconds(job.interval_secs as i64));

        ticker.tick().await;

        tracing::info!(job = %job.id, "scheduled job triggered");
        if let Err(e) = (job.job)().await {
            tracing::error!(job = %job.id, "scheduled job failed: {}", e);
        }
    }
}

/// Wire up the standard maintenance jobs: per-source refreshes, periodic
/// discovery of new entities, and index housekeeping.
pub async fn register_default_jobs(
    scheduler: &Scheduler,
    collector: Arc<Collector>,
    indexer: Arc<Indexer>,
    store: VectorStore,
    cfg: &SchedulerSettings,
) {
    let refreshes = [
        ("update_exchanges", "Update Crypto Exchanges", "exchanges", cfg.update_exchanges_interval),
        ("update_banks", "Update Banking Institutions", "banks", cfg.update_banks_interval),
        ("update_venezuela", "Update Venezuela Panel", "venezuela", cfg.update_venezuela_interval),
    ];

    let known: Vec<String> = collector.source_ids();

    for (job_id, job_name, source_id, interval) in refreshes {
        if !known.iter().any(|id| id == source_id) {
            continue;
        }

        let collector = collector.clone();
        let indexer = indexer.clone();
        let source = source_id.to_string();

        scheduler
            .register(job_id, job_name, interval, move || {
                let collector = collector.clone();
                let indexer = indexer.clone();
                let source = source.clone();
                let fut: BoxFuture<'static, Result<(), ApiError>> = Box::pin(async move {
                    let entities = match collector.collect_source(&source).await {
                        Ok(entities) => entities,
                        Err(e) => {
                            // source failure is isolated and already
                            // recorded in the per-source status
                            tracing::warn!(source = %source, "refresh skipped: {}", e);
                            return Ok(());
                        }
                    };

                    if entities.is_empty() {
                        tracing::warn!(source = %source, "no data collected");
                        return Ok(());
                    }

                    let report = indexer.index_batch(entities).await?;
                    tracing::info!(
                        source = %source,
                        indexed = report.indexed,
                        dropped = report.dropped,
                        "refresh finished"
                    );
                    Ok(())
                });
                fut
            })
            .await;
    }

    {
        let collector = collector.clone();
        let indexer = indexer.clone();
        scheduler
            .register(
                "discover_entities",
                "Discover New Entities",
                cfg.discovery_interval,
                move || {
                    let collector = collector.clone();
                    let indexer = indexer.clone();
                    let fut: BoxFuture<'static, Result<(), ApiError>> = Box::pin(async move {
                        let entities = collector.collect_all().await;
                        if entities.is_empty() {
                            tracing::warn!("discovery collected nothing");
                            return Ok(());
                        }

                        let report = indexer.index_new_only(entities).await?;
                        tracing::info!(added = report.indexed, "discovery finished");
                        Ok(())
                    });
                    fut
                },
            )
            .await;
    }

    scheduler
        .register(
            "index_maintenance",
            "Index Maintenance",
            cfg.maintenance_interval,
            move || {
                let store = store.clone();
                let fut: BoxFuture<'static, Result<(), ApiError>> = Box::pin(async move {
                    let stats = store.stats().await;
                    tracing::info!(
                        collection = %stats.name,
                        count = stats.count,
                        "index maintenance pass"
                    );
                    Ok(())
                });
                fut
            },
        )
        .await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn test_settings(enabled: bool) -> SchedulerSettings {
        SchedulerSettings {
            enabled,
            ..SchedulerSettings::default()
        }
    }

    fn counting_job(counter: Arc<AtomicUsize>) -> impl Fn() -> BoxFuture<'static, Result<(), ApiError>> {
        move || {
            let counter = counter.clone();
            let fut: BoxFuture<'static, Result<(), ApiError>> = Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            fut
        }
    }

    #[tokio::test]
    async fn registration_by_id_is_idempotent() {
        let scheduler = Scheduler::new(&test_settings(true));
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .register("job", "First", 60, counting_job(counter.clone()))
            .await;
        scheduler
            .register("job", "Second", 120, counting_job(counter))
            .await;

        let status = scheduler.get_status().await;
        assert_eq!(status.jobs.len(), 1);
        assert_eq!(status.jobs[0].name, "Second");
        assert!(status.jobs[0].next_run.is_none());
    }

    #[tokio::test]
    async fn start_and_stop_toggle_state_and_next_runs() {
        let scheduler = Scheduler::new(&test_settings(true));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("job", "Job", 3600, counting_job(counter))
            .await;

        assert!(!scheduler.get_status().await.is_running);

        scheduler.start().await;
        let status = scheduler.get_status().await;
        assert!(status.is_running);

        // second start is a no-op, not a duplicate spawn
        scheduler.start().await;
        assert_eq!(scheduler.handles.lock().await.len(), 1);

        // the ticker publishes its next-run time on first poll
        tokio::task::yield_now().await;
        let status = scheduler.get_status().await;
        assert!(status.jobs[0].next_run.is_some());

        scheduler.stop().await;
        let status = scheduler.get_status().await;
        assert!(!status.is_running);
        assert!(status.jobs[0].next_run.is_none());

        // stopping again is harmless
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn disabled_scheduler_never_starts() {
        let scheduler = Scheduler::new(&test_settings(false));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("job", "Job", 1, counting_job(counter))
            .await;

        scheduler.start().await;
        assert!(!scheduler.get_status().await.is_running);
        assert!(scheduler.handles.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_fire_on_their_interval_and_survive_failures() {
        let scheduler = Scheduler::new(&test_settings(true));
        let counter = Arc::new(AtomicUsize::new(0));

        let failing_then_counting = {
            let counter = counter.clone();
            move || {
                let counter = counter.clone();
                Box::pin(async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Err(ApiError::Internal("transient".to_string()))
                    } else {
                        Ok(())
                    }
                }) as BoxFuture<'static, Result<(), ApiError>>
            }
        };

        scheduler.register("job", "Job", 10, failing_then_counting).await;
        scheduler.start().await;

        // paused clock: sleeping auto-advances time through the job ticks
        tokio::time::sleep(std::time::Duration::from_secs(35)).await;

        // first run failed, but the job stayed scheduled and ran again
        assert!(counter.load(Ordering::SeqCst) >= 2);

        scheduler.stop().await;
    }
}
