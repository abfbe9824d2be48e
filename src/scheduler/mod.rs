//! Recurring execution of pipeline phases
//!
//! The scheduler maps declarative job configs (cron or interval schedules)
//! onto orchestrator phase-runners. Per job it enforces a single running
//! instance: a trigger that fires while the previous run is still active is
//! coalesced (counted and dropped, never queued). Timeouts apply at job
//! granularity; there is no finer-grained cancellation inside a run.
//!
//! Cron jobs ride on `tokio-cron-scheduler`; interval jobs use its repeated
//! job support. Manual triggers run the same guarded path, outside the
//! schedule.

pub mod error;
pub mod schedule;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::models::ProcessingStatus;
use crate::orchestrator::{Orchestrator, PipelineParams};
use crate::utils::retry::{with_retry, RetryConfig};
use error::SchedulerError;
use schedule::{JobConfig, JobPhase, ScheduleConfig, ScheduleSpec};

/// Observable state of one job
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub name: String,
    pub phase: JobPhase,
    pub schedule: String,
    pub running: bool,
    pub runs_started: u64,
    pub runs_coalesced: u64,
    pub next_run: Option<DateTime<Utc>>,
}

/// One job plus its runtime guard state
struct ScheduledJob {
    config: JobConfig,
    running: AtomicBool,
    runs_started: AtomicU64,
    runs_coalesced: AtomicU64,
}

impl ScheduledJob {
    fn new(config: JobConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
            runs_started: AtomicU64::new(0),
            runs_coalesced: AtomicU64::new(0),
        }
    }
}

/// Drives orchestrator phases on their configured schedules
pub struct PipelineScheduler {
    orchestrator: Arc<Orchestrator>,
    jobs: Vec<Arc<ScheduledJob>>,
    runtime: Option<JobScheduler>,
    cron_ids: HashMap<String, uuid::Uuid>,
}

impl PipelineScheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, config: ScheduleConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            orchestrator,
            jobs: config.jobs.into_iter().map(|c| Arc::new(ScheduledJob::new(c))).collect(),
            runtime: None,
            cron_ids: HashMap::new(),
        })
    }

    /// Register every job with the cron runtime and start ticking.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        let sched = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Runtime(e.to_string()))?;

        for job in &self.jobs {
            let spec = job.config.schedule_spec()?;
            let cron_job = build_runtime_job(&spec, self.orchestrator.clone(), job.clone())?;
            let id = sched
                .add(cron_job)
                .await
                .map_err(|e| SchedulerError::Runtime(e.to_string()))?;
            self.cron_ids.insert(job.config.name.clone(), id);
            tracing::info!(
                job = %job.config.name,
                schedule = %job.config.schedule,
                phase = job.config.phase.as_str(),
                "Job registered"
            );
        }

        sched
            .start()
            .await
            .map_err(|e| SchedulerError::Runtime(e.to_string()))?;
        self.runtime = Some(sched);

        tracing::info!(jobs = self.jobs.len(), "Scheduler started");
        Ok(())
    }

    /// Run one job immediately, outside its schedule.
    ///
    /// Respects the single-instance guard: an active run makes the trigger
    /// fail instead of queuing.
    pub async fn trigger(&self, name: &str) -> Result<(), SchedulerError> {
        let job = self
            .jobs
            .iter()
            .find(|j| j.config.name == name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;

        if job.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning(name.to_string()));
        }

        execute_job(self.orchestrator.clone(), job.clone()).await;
        Ok(())
    }

    /// Current state of every configured job
    pub async fn status(&self) -> Vec<JobStatus> {
        let mut statuses = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let next_run = match (&self.runtime, self.cron_ids.get(&job.config.name)) {
                (Some(sched), Some(id)) => {
                    // The runtime handle is a cheap clone; next_tick wants
                    // exclusive access.
                    let mut sched = sched.clone();
                    sched.next_tick_for_job(*id).await.ok().flatten()
                }
                _ => None,
            };
            statuses.push(JobStatus {
                name: job.config.name.clone(),
                phase: job.config.phase,
                schedule: job.config.schedule.clone(),
                running: job.running.load(Ordering::SeqCst),
                runs_started: job.runs_started.load(Ordering::SeqCst),
                runs_coalesced: job.runs_coalesced.load(Ordering::SeqCst),
                next_run,
            });
        }
        statuses
    }

    /// Stop the cron runtime. Running jobs finish on their own; no new
    /// triggers fire.
    pub async fn shutdown(&mut self) {
        if let Some(mut sched) = self.runtime.take() {
            if let Err(e) = sched.shutdown().await {
                tracing::warn!(error = %e, "Scheduler shutdown reported an error");
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

/// Build the tokio-cron-scheduler job for one spec
fn build_runtime_job(
    spec: &ScheduleSpec,
    orchestrator: Arc<Orchestrator>,
    job: Arc<ScheduledJob>,
) -> Result<Job, SchedulerError> {
    let runner = move |_uuid, _lock| {
        let orchestrator = orchestrator.clone();
        let job = job.clone();
        Box::pin(async move {
            execute_job(orchestrator, job).await;
        }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
    };

    let built = match spec {
        ScheduleSpec::Cron(expr) => Job::new_async(expr.as_str(), runner),
        ScheduleSpec::Interval(period) => Job::new_repeated_async(*period, runner),
    };

    built.map_err(|e| SchedulerError::Runtime(e.to_string()))
}

/// Guarded execution of one job: coalesce if active, then run the phase
/// under the job timeout with the configured retry budget.
async fn execute_job(orchestrator: Arc<Orchestrator>, job: Arc<ScheduledJob>) {
    if job.running.swap(true, Ordering::SeqCst) {
        job.runs_coalesced.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            job = %job.config.name,
            "Previous run still active, coalescing trigger"
        );
        return;
    }

    job.runs_started.fetch_add(1, Ordering::SeqCst);
    let timeout = job.config.timeout();
    let retry_config = RetryConfig::new(job.config.max_retries);

    let result = with_retry(&retry_config, || async {
        match tokio::time::timeout(timeout, run_phase(&orchestrator, &job.config)).await {
            Ok(Ok(status)) if status == ProcessingStatus::Failed => {
                anyhow::bail!("phase finished as failed")
            }
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => Err(e),
            Err(_) => anyhow::bail!("job timed out after {}s", timeout.as_secs()),
        }
    })
    .await;

    match result {
        Ok(status) => {
            tracing::info!(job = %job.config.name, status = %status, "Job finished");
        }
        Err(e) => {
            tracing::error!(job = %job.config.name, error = %e, "Job failed");
        }
    }

    job.running.store(false, Ordering::SeqCst);
}

/// Dispatch to the phase-runner the job config resolves to
async fn run_phase(
    orchestrator: &Orchestrator,
    config: &JobConfig,
) -> anyhow::Result<ProcessingStatus> {
    let params = PipelineParams {
        query: config.parameters.query.clone(),
        country: config.parameters.country.clone(),
        start_page: config.parameters.start_page,
        num_pages: config.parameters.num_pages,
    };

    match config.phase {
        JobPhase::Full => Ok(orchestrator.run_full_pipeline(&params).await.overall),
        JobPhase::Collection => Ok(orchestrator.run_collection_phase(&params).await.status),
        JobPhase::Processing => Ok(orchestrator.run_processing_phase().await.status),
        JobPhase::Loading => Ok(orchestrator.run_loading_phase().await.status),
        JobPhase::Maintenance => orchestrator
            .run_maintenance_tasks()
            .await
            .map(|_| ProcessingStatus::Completed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_job(name: &str) -> Arc<ScheduledJob> {
        let mut config = ScheduleConfig::builtin_defaults().jobs.remove(0);
        config.name = name.to_string();
        Arc::new(ScheduledJob::new(config))
    }

    #[test]
    fn test_single_instance_guard() {
        let job = dummy_job("guarded");
        assert!(!job.running.swap(true, Ordering::SeqCst));
        // Second entry sees the guard held
        assert!(job.running.swap(true, Ordering::SeqCst));
        job.running.store(false, Ordering::SeqCst);
        assert!(!job.running.swap(true, Ordering::SeqCst));
    }

    #[test]
    fn test_builtin_jobs_resolve_specs() {
        for job in ScheduleConfig::builtin_defaults().jobs {
            assert!(job.schedule_spec().is_ok(), "{} must parse", job.name);
        }
    }
}
