//! Prometheus metrics for the ingestion pipeline
//!
//! Call `init_metrics()` once at application startup to register all metric
//! families. If initialization fails (or was never attempted), every
//! recording function silently becomes a no-op; metrics must never take the
//! pipeline down.

use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

/// Container for all pipeline metrics
struct PipelineMetrics {
    pages_collected: Counter,
    page_errors: Counter,
    rate_limit_retries: Counter,
    entries_processed: CounterVec,
    duplicates_detected: CounterVec,
    jobs_loaded: CounterVec,
    pipeline_runs: CounterVec,
    phase_duration: HistogramVec,
}

static METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

/// Initialize all Prometheus metrics.
///
/// Should be called once at startup; a second call is a no-op. If any
/// registration fails the error is returned and all recording functions stay
/// no-ops.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = PipelineMetrics {
        pages_collected: register_counter!(
            "gleaner_pages_collected_total",
            "Total raw pages stored by the collector"
        )?,
        page_errors: register_counter!(
            "gleaner_page_errors_total",
            "Total pages that failed collection (excluding 429 retries)"
        )?,
        rate_limit_retries: register_counter!(
            "gleaner_rate_limit_retries_total",
            "Total same-page retries triggered by HTTP 429"
        )?,
        entries_processed: register_counter_vec!(
            "gleaner_entries_processed_total",
            "Total job entries processed, by outcome",
            &["outcome"]
        )?,
        duplicates_detected: register_counter_vec!(
            "gleaner_duplicates_detected_total",
            "Total duplicates detected, by matching tier",
            &["tier"]
        )?,
        jobs_loaded: register_counter_vec!(
            "gleaner_jobs_loaded_total",
            "Total normalized records loaded, by outcome",
            &["outcome"]
        )?,
        pipeline_runs: register_counter_vec!(
            "gleaner_pipeline_runs_total",
            "Total full pipeline runs, by overall status",
            &["status"]
        )?,
        phase_duration: register_histogram_vec!(
            "gleaner_phase_duration_seconds",
            "Phase execution duration in seconds",
            &["phase"],
            vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0]
        )?,
    };

    METRICS
        .set(metrics)
        .map_err(|_| "Pipeline metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    METRICS.get().is_some()
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_page_collected() {
    if let Some(m) = METRICS.get() {
        m.pages_collected.inc();
    }
}

pub fn record_page_error() {
    if let Some(m) = METRICS.get() {
        m.page_errors.inc();
    }
}

pub fn record_rate_limit_retry() {
    if let Some(m) = METRICS.get() {
        m.rate_limit_retries.inc();
    }
}

/// Outcome is "normalized" or "skipped"
pub fn record_entry_processed(outcome: &str) {
    if let Some(m) = METRICS.get() {
        m.entries_processed.with_label_values(&[outcome]).inc();
    }
}

/// Tier is "url" or "similarity"
pub fn record_duplicate_detected(tier: &str) {
    if let Some(m) = METRICS.get() {
        m.duplicates_detected.with_label_values(&[tier]).inc();
    }
}

/// Outcome is "canonical", "duplicate" or "failed"
pub fn record_job_loaded(outcome: &str) {
    if let Some(m) = METRICS.get() {
        m.jobs_loaded.with_label_values(&[outcome]).inc();
    }
}

pub fn record_pipeline_run(status: &str) {
    if let Some(m) = METRICS.get() {
        m.pipeline_runs.with_label_values(&[status]).inc();
    }
}

pub fn observe_phase_duration(phase: &str, seconds: f64) {
    if let Some(m) = METRICS.get() {
        m.phase_duration.with_label_values(&[phase]).observe(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_init_is_noop() {
        // Must not panic even when init_metrics was never called
        record_page_collected();
        record_entry_processed("normalized");
        record_duplicate_detected("url");
        observe_phase_duration("collection", 1.0);
    }

    #[test]
    fn test_init_and_encode() {
        // Init may race with other tests; both outcomes are fine as long as
        // encoding works afterwards.
        let _ = init_metrics();
        if metrics_initialized() {
            record_page_collected();
            let text = encode_metrics().unwrap();
            assert!(text.contains("gleaner_pages_collected_total"));
        }
    }
}
