//! Pipeline orchestration: collection, processing, loading
//!
//! Phases run strictly in sequence. Collection gates the pipeline (its
//! failure aborts the run) while processing and loading failures downgrade
//! the overall status to partial without blocking the next phase: the design
//! favors forward progress over strict phase gating.
//!
//! Processing is the only phase with intra-phase fan-out: pending
//! collections are processed concurrently under a semaphore; one
//! collection's failure is tallied, never propagated to its siblings.

pub mod health;

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::collector::Collector;
use crate::loader::Loader;
use crate::metrics;
use crate::models::{OperationLog, OperationType, ProcessingStatus};
use crate::processor::Processor;
use crate::storage::{PipelineStatistics, SqliteStore};
use health::HealthAssessment;

/// Parameters for one full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub query: String,
    pub country: Option<String>,
    pub start_page: u32,
    pub num_pages: u32,
}

/// Outcome of one phase
#[derive(Debug, Clone)]
pub struct PhaseResult {
    pub operation: OperationType,
    pub status: ProcessingStatus,
    pub detail: String,
}

/// Outcome of one full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub overall: ProcessingStatus,
    pub phases: Vec<PhaseResult>,
}

/// Outcome of the maintenance tasks
#[derive(Debug, Clone)]
pub struct MaintenanceReport {
    pub links_deleted: usize,
    pub statistics: PipelineStatistics,
    pub health: HealthAssessment,
}

/// Sequences the pipeline phases over the shared storage handle
pub struct Orchestrator {
    store: Arc<SqliteStore>,
    collector: Collector,
    processor: Arc<Processor>,
    loader: Loader,
    max_concurrent: usize,
    cleanup_after_days: i64,
}

impl Orchestrator {
    pub fn new(
        store: Arc<SqliteStore>,
        collector: Collector,
        processor: Processor,
        loader: Loader,
        max_concurrent: usize,
        cleanup_after_days: i64,
    ) -> Self {
        Self {
            store,
            collector,
            processor: Arc::new(processor),
            loader,
            max_concurrent: max_concurrent.max(1),
            cleanup_after_days,
        }
    }

    /// Run collection, processing and loading in sequence.
    ///
    /// Aggregation: a collection failure short-circuits the run as `Failed`;
    /// any later non-completed phase downgrades the overall status to
    /// `Partial`.
    pub async fn run_full_pipeline(&self, params: &PipelineParams) -> PipelineResult {
        let mut phases = Vec::with_capacity(3);

        // Phase 1: collection gates data existence.
        let collection_phase = self.run_collection_phase(params).await;
        let collection_failed = collection_phase.status == ProcessingStatus::Failed;
        phases.push(collection_phase);

        if collection_failed {
            let result = PipelineResult {
                overall: ProcessingStatus::Failed,
                phases,
            };
            metrics::record_pipeline_run(result.overall.as_str());
            return result;
        }

        // Phase 2: processing fans out under the semaphore.
        phases.push(self.run_processing_phase().await);

        // Phase 3: loading runs regardless of processing degradation.
        phases.push(self.run_loading_phase().await);

        let overall = aggregate_statuses(&phases.iter().map(|p| p.status).collect::<Vec<_>>());
        metrics::record_pipeline_run(overall.as_str());

        tracing::info!(overall = %overall, "Pipeline run finished");
        PipelineResult { overall, phases }
    }

    /// Run the collection phase alone (also used by scheduler jobs)
    pub async fn run_collection_phase(&self, params: &PipelineParams) -> PhaseResult {
        let started = Instant::now();
        let result = self
            .collector
            .collect(
                &params.query,
                params.country.as_deref(),
                params.start_page,
                params.num_pages,
            )
            .await;
        metrics::observe_phase_duration("collection", started.elapsed().as_secs_f64());

        match result {
            Ok(ids) => PhaseResult {
                operation: OperationType::Collection,
                status: ProcessingStatus::Completed,
                detail: format!("collected {} pages", ids.len()),
            },
            Err(e) => {
                tracing::error!(error = %e, "Collection phase failed, aborting pipeline");
                PhaseResult {
                    operation: OperationType::Collection,
                    status: ProcessingStatus::Failed,
                    detail: e.to_string(),
                }
            }
        }
    }

    /// Run the processing phase alone (also used by scheduler jobs)
    pub async fn run_processing_phase(&self) -> PhaseResult {
        let started = Instant::now();

        let pending = match self.store.pending_collections() {
            Ok(pending) => pending,
            Err(e) => {
                return PhaseResult {
                    operation: OperationType::Processing,
                    status: ProcessingStatus::Failed,
                    detail: e.to_string(),
                }
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let handles: Vec<_> = pending
            .iter()
            .map(|collection| {
                let semaphore = semaphore.clone();
                let processor = self.processor.clone();
                let id = collection.id;
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("processing semaphore closed");
                    processor.process(id).await.map(|log_id| (id, log_id))
                })
            })
            .collect();

        let mut statuses = Vec::with_capacity(handles.len());
        for outcome in join_all(handles).await {
            // A panicking or erroring task is tallied as a failed unit; its
            // siblings keep running.
            let status = match outcome {
                Ok(Ok((_, log_id))) => self
                    .store
                    .get_operation_log(log_id)
                    .ok()
                    .flatten()
                    .map(|log| log.status)
                    .unwrap_or(ProcessingStatus::Failed),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Collection processing failed");
                    ProcessingStatus::Failed
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Processing task panicked");
                    ProcessingStatus::Failed
                }
            };
            statuses.push(status);
        }

        metrics::observe_phase_duration("processing", started.elapsed().as_secs_f64());

        PhaseResult {
            operation: OperationType::Processing,
            status: phase_status(&statuses),
            detail: format!("processed {} collections", statuses.len()),
        }
    }

    /// Run the loading phase alone (also used by scheduler jobs)
    pub async fn run_loading_phase(&self) -> PhaseResult {
        let started = Instant::now();

        let batches = match self.store.collections_with_pending_jobs() {
            Ok(batches) => batches,
            Err(e) => {
                return PhaseResult {
                    operation: OperationType::Loading,
                    status: ProcessingStatus::Failed,
                    detail: e.to_string(),
                }
            }
        };

        let mut statuses = Vec::with_capacity(batches.len());
        for batch in &batches {
            let status = match self.loader.load_batch(*batch).await {
                Ok(log_id) => self
                    .store
                    .get_operation_log(log_id)
                    .ok()
                    .flatten()
                    .map(|log| log.status)
                    .unwrap_or(ProcessingStatus::Failed),
                Err(e) => {
                    tracing::warn!(batch = %batch, error = %e, "Batch load failed");
                    ProcessingStatus::Failed
                }
            };
            statuses.push(status);
        }

        metrics::observe_phase_duration("loading", started.elapsed().as_secs_f64());

        PhaseResult {
            operation: OperationType::Loading,
            status: phase_status(&statuses),
            detail: format!("loaded {} batches", statuses.len()),
        }
    }

    /// Run duplicate cleanup, statistics aggregation and a health check.
    pub async fn run_maintenance_tasks(&self) -> anyhow::Result<MaintenanceReport> {
        let mut log = OperationLog::begin(OperationType::Maintenance, "maintenance sweep");
        self.store.insert_operation_log(&log)?;

        let outcome = self.maintenance_inner();
        match outcome {
            Ok(report) => {
                log.complete(
                    ProcessingStatus::Completed,
                    format!(
                        "deleted {} links; {} canonical jobs; health {}",
                        report.links_deleted,
                        report.statistics.canonical_jobs,
                        report.health.state.as_str()
                    ),
                    None,
                );
                self.store.complete_operation_log(&log)?;
                Ok(report)
            }
            Err(e) => {
                log.complete(ProcessingStatus::Failed, "maintenance failed", Some(e.to_string()));
                self.store.complete_operation_log(&log)?;
                Err(e)
            }
        }
    }

    fn maintenance_inner(&self) -> anyhow::Result<MaintenanceReport> {
        let links_deleted = self.loader.cleanup_old_duplicates(self.cleanup_after_days)?;
        let statistics = self.store.statistics()?;
        let health = health::assess(&self.store)?;

        tracing::info!(
            links_deleted,
            canonical_jobs = statistics.canonical_jobs,
            health = health.state.as_str(),
            "Maintenance finished"
        );

        Ok(MaintenanceReport {
            links_deleted,
            statistics,
            health,
        })
    }
}

/// Terminal status of one phase from its unit statuses
fn phase_status(unit_statuses: &[ProcessingStatus]) -> ProcessingStatus {
    if unit_statuses.is_empty() {
        return ProcessingStatus::Completed;
    }
    if unit_statuses
        .iter()
        .all(|s| *s == ProcessingStatus::Completed)
    {
        return ProcessingStatus::Completed;
    }
    if unit_statuses.iter().all(|s| *s == ProcessingStatus::Failed) {
        return ProcessingStatus::Failed;
    }
    ProcessingStatus::Partial
}

/// Overall pipeline status from the phase statuses, collection first.
pub fn aggregate_statuses(phase_statuses: &[ProcessingStatus]) -> ProcessingStatus {
    match phase_statuses.first() {
        Some(ProcessingStatus::Failed) => ProcessingStatus::Failed,
        _ => {
            if phase_statuses
                .iter()
                .all(|s| *s == ProcessingStatus::Completed)
            {
                ProcessingStatus::Completed
            } else {
                ProcessingStatus::Partial
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ProcessingStatus::{Completed, Failed, Partial};

    #[test]
    fn test_aggregate_all_completed() {
        assert_eq!(aggregate_statuses(&[Completed, Completed, Completed]), Completed);
    }

    #[test]
    fn test_aggregate_partial_middle_phase() {
        assert_eq!(aggregate_statuses(&[Completed, Partial, Completed]), Partial);
    }

    #[test]
    fn test_aggregate_collection_failure_dominates() {
        assert_eq!(aggregate_statuses(&[Failed, Completed, Completed]), Failed);
    }

    #[test]
    fn test_aggregate_later_failure_downgrades_only() {
        assert_eq!(aggregate_statuses(&[Completed, Failed, Completed]), Partial);
    }

    #[test]
    fn test_phase_status() {
        assert_eq!(phase_status(&[]), Completed);
        assert_eq!(phase_status(&[Completed, Completed]), Completed);
        assert_eq!(phase_status(&[Completed, Failed]), Partial);
        assert_eq!(phase_status(&[Failed, Failed]), Failed);
        assert_eq!(phase_status(&[Completed, Partial]), Partial);
    }
}
