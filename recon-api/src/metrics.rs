// Prometheus metrics for the reconciliation service

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Encoder, Histogram, HistogramOpts, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};

pub static METRICS: Lazy<Metrics> =
    Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));

pub struct Metrics {
    pub registry: Registry,

    // Batch lifecycle
    pub batches_created_total: IntCounter,
    pub batches_completed_total: IntCounter,
    pub batches_failed_total: IntCounter,
    pub batch_processing_duration_seconds: Histogram,

    // Row-level matching
    pub rows_processed_total: IntCounter,
    pub match_outcomes_total: IntCounterVec,

    // Admin actions
    pub admin_actions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let batches_created_total = register_int_counter_with_registry!(
            Opts::new("recon_batches_created_total", "Reconciliation batches created"),
            registry
        )?;

        let batches_completed_total = register_int_counter_with_registry!(
            Opts::new(
                "recon_batches_completed_total",
                "Reconciliation batches completed"
            ),
            registry
        )?;

        let batches_failed_total = register_int_counter_with_registry!(
            Opts::new("recon_batches_failed_total", "Reconciliation batches failed"),
            registry
        )?;

        let batch_processing_duration_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "recon_batch_processing_duration_seconds",
                "End-to-end batch processing duration in seconds"
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            registry
        )?;

        let rows_processed_total = register_int_counter_with_registry!(
            Opts::new("recon_rows_processed_total", "CSV rows processed by the worker"),
            registry
        )?;

        let match_outcomes_total = register_int_counter_vec_with_registry!(
            Opts::new("recon_match_outcomes_total", "Match outcomes by classification"),
            &["outcome"],
            registry
        )?;

        let admin_actions_total = register_int_counter_vec_with_registry!(
            Opts::new("recon_admin_actions_total", "Admin state-machine actions applied"),
            &["action"],
            registry
        )?;

        Ok(Metrics {
            registry,
            batches_created_total,
            batches_completed_total,
            batches_failed_total,
            batch_processing_duration_seconds,
            rows_processed_total,
            match_outcomes_total,
            admin_actions_total,
        })
    }

    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry_builds_and_exports() {
        let metrics = Metrics::new().unwrap();
        metrics.batches_created_total.inc();
        metrics
            .match_outcomes_total
            .with_label_values(&["auto_matched"])
            .inc();

        let exported = metrics.export().unwrap();
        assert!(exported.contains("recon_batches_created_total"));
        assert!(exported.contains("recon_match_outcomes_total"));
    }
}
