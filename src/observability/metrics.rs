//! Metrics for the discovery pipeline.
//!
//! Counters and histograms are recorded through the `metrics` facade. Without an installed
//! recorder every call is a no-op, which is what unit tests rely on.

use std::sync::OnceLock;
use tracing::info;

/// All metric names used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RegistryPagesFetched,
    RegistryPagesFailed,
    RegistryRecordsReceived,
    RegistryRequestDuration,
    RegistryRetries,
    PlansFinished,
    NormalizeRecords,
    MergeRecordsCreated,
    MergeRecordsMerged,
    ScoringScore,
    ScoringTier,
    StorageInserted,
    StorageSkipped,
    StorageFailed,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RegistryPagesFetched => "provider_scout_registry_pages_fetched_total",
            MetricName::RegistryPagesFailed => "provider_scout_registry_pages_failed_total",
            MetricName::RegistryRecordsReceived => "provider_scout_registry_records_received_total",
            MetricName::RegistryRequestDuration => "provider_scout_registry_request_duration_seconds",
            MetricName::RegistryRetries => "provider_scout_registry_retries_total",
            MetricName::PlansFinished => "provider_scout_plans_finished_total",
            MetricName::NormalizeRecords => "provider_scout_normalize_records_total",
            MetricName::MergeRecordsCreated => "provider_scout_merge_records_created_total",
            MetricName::MergeRecordsMerged => "provider_scout_merge_records_merged_total",
            MetricName::ScoringScore => "provider_scout_scoring_score",
            MetricName::ScoringTier => "provider_scout_scoring_tier_total",
            MetricName::StorageInserted => "provider_scout_storage_inserted_total",
            MetricName::StorageSkipped => "provider_scout_storage_skipped_total",
            MetricName::StorageFailed => "provider_scout_storage_failed_total",
        }
    }
}

static METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder for this process
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text rendering of everything recorded so far
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod registry {
    use super::MetricName;

    pub fn page_fetched(source: &'static str) {
        ::metrics::counter!(MetricName::RegistryPagesFetched.as_str(), "source" => source).increment(1);
    }

    pub fn page_failed(source: &'static str) {
        ::metrics::counter!(MetricName::RegistryPagesFailed.as_str(), "source" => source).increment(1);
    }

    pub fn records_received(count: usize) {
        ::metrics::counter!(MetricName::RegistryRecordsReceived.as_str()).increment(count as u64);
    }

    pub fn request_duration(secs: f64) {
        ::metrics::histogram!(MetricName::RegistryRequestDuration.as_str()).record(secs);
    }

    pub fn retry() {
        ::metrics::counter!(MetricName::RegistryRetries.as_str()).increment(1);
    }

    pub fn plan_finished(outcome: &'static str) {
        ::metrics::counter!(MetricName::PlansFinished.as_str(), "outcome" => outcome).increment(1);
    }
}

pub mod normalize {
    use super::MetricName;

    pub fn record_normalized(source: &'static str) {
        ::metrics::counter!(MetricName::NormalizeRecords.as_str(), "source" => source).increment(1);
    }
}

pub mod merge {
    use super::MetricName;

    pub fn record_created() {
        ::metrics::counter!(MetricName::MergeRecordsCreated.as_str()).increment(1);
    }

    pub fn record_merged() {
        ::metrics::counter!(MetricName::MergeRecordsMerged.as_str()).increment(1);
    }
}

pub mod scoring {
    use super::MetricName;

    pub fn score_recorded(score: i32, tier: &'static str) {
        ::metrics::histogram!(MetricName::ScoringScore.as_str()).record(score as f64);
        ::metrics::counter!(MetricName::ScoringTier.as_str(), "tier" => tier).increment(1);
    }
}

pub mod storage {
    use super::MetricName;

    pub fn inserted() {
        ::metrics::counter!(MetricName::StorageInserted.as_str()).increment(1);
    }

    pub fn skipped() {
        ::metrics::counter!(MetricName::StorageSkipped.as_str()).increment(1);
    }

    pub fn failed() {
        ::metrics::counter!(MetricName::StorageFailed.as_str()).increment(1);
    }
}
