//! Observability infrastructure for the advisor
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes per task, slow inferences, loaded models, weather lookups)
//! - Structured JSON logging with tracing

use crate::encoding::EncodingError;
use crate::models::Task;
use prometheus::{
    register_gauge_vec, register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, register_int_gauge, GaugeVec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, IntGauge,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Buckets for outbound weather calls, bounded by the 10s client timeout
const WEATHER_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AdvisorMetricsInner> = OnceLock::new();

struct AdvisorMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions_served: IntCounterVec,
    prediction_errors: IntCounterVec,
    slow_inferences: IntCounterVec,
    models_loaded: IntGauge,
    model_version_info: GaugeVec,
    weather_latency_seconds: Histogram,
    weather_errors: IntCounter,
}

impl AdvisorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "farm_advisor_prediction_latency_seconds",
                "Time spent normalizing, running and formatting a prediction",
                &["task"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_served: register_int_counter_vec!(
                "farm_advisor_predictions_served_total",
                "Predictions that produced a result",
                &["task"]
            )
            .expect("Failed to register predictions_served"),

            prediction_errors: register_int_counter_vec!(
                "farm_advisor_prediction_errors_total",
                "Prediction requests that ended in an error message",
                &["task", "kind"]
            )
            .expect("Failed to register prediction_errors"),

            slow_inferences: register_int_counter_vec!(
                "farm_advisor_slow_inferences_total",
                "Model invocations that exceeded the 50ms inference target",
                &["task"]
            )
            .expect("Failed to register slow_inferences"),

            models_loaded: register_int_gauge!(
                "farm_advisor_models_loaded",
                "Number of task models loaded at startup"
            )
            .expect("Failed to register models_loaded"),

            model_version_info: register_gauge_vec!(
                "farm_advisor_model_version_info",
                "Checksum prefix of each loaded model",
                &["task", "version"]
            )
            .expect("Failed to register model_version_info"),

            weather_latency_seconds: register_histogram!(
                "farm_advisor_weather_latency_seconds",
                "Time spent waiting on the weather provider",
                WEATHER_BUCKETS.to_vec()
            )
            .expect("Failed to register weather_latency_seconds"),

            weather_errors: register_int_counter!(
                "farm_advisor_weather_errors_total",
                "Weather lookups that failed"
            )
            .expect("Failed to register weather_errors"),
        }
    }
}

/// Advisor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Debug, Clone)]
pub struct AdvisorMetrics {
    _private: (),
}

impl Default for AdvisorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AdvisorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AdvisorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, task: Task, duration_secs: f64) {
        self.inner()
            .prediction_latency_seconds
            .with_label_values(&[task.as_str()])
            .observe(duration_secs);
    }

    pub fn inc_predictions_served(&self, task: Task) {
        self.inner()
            .predictions_served
            .with_label_values(&[task.as_str()])
            .inc();
    }

    pub fn inc_prediction_errors(&self, task: Task, kind: &str) {
        self.inner()
            .prediction_errors
            .with_label_values(&[task.as_str(), kind])
            .inc();
    }

    pub fn inc_slow_inferences(&self, task: Task) {
        self.inner()
            .slow_inferences
            .with_label_values(&[task.as_str()])
            .inc();
    }

    pub fn set_models_loaded(&self, count: i64) {
        self.inner().models_loaded.set(count);
    }

    pub fn set_model_version(&self, task: Task, version: &str) {
        self.inner()
            .model_version_info
            .with_label_values(&[task.as_str(), version])
            .set(1.0);
    }

    pub fn observe_weather_latency(&self, duration_secs: f64) {
        self.inner().weather_latency_seconds.observe(duration_secs);
    }

    pub fn inc_weather_errors(&self) {
        self.inner().weather_errors.inc();
    }
}

/// Structured logger for advisor events
///
/// Provides consistent JSON-formatted logging for model loading,
/// predictions, and other significant events.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, tables_version: &str) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            tables_version = %tables_version,
            "Farm advisor started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Farm advisor shutting down"
        );
    }

    pub fn log_model_loaded(&self, task: Task, path: &Path, version: &str) {
        info!(
            event = "model_loaded",
            service = %self.service,
            task = %task,
            path = %path.display(),
            model_version = %version,
            "Model loaded"
        );
    }

    /// The task keeps serving its "not loaded" message until restart
    pub fn log_model_load_failed(&self, task: Task, path: &Path, reason: &str) {
        warn!(
            event = "model_load_failed",
            service = %self.service,
            task = %task,
            path = %path.display(),
            reason = %reason,
            "Model failed to load, task will run in degraded mode"
        );
    }

    /// Log a completed prediction request
    pub fn log_prediction(&self, task: Task, outcome: &str, elapsed_us: u64) {
        info!(
            event = "prediction_served",
            service = %self.service,
            task = %task,
            outcome = %outcome,
            elapsed_us = elapsed_us,
            "Prediction request completed"
        );
    }

    /// A model produced a code outside its label table: artifact and tables have drifted
    pub fn log_encoding_mismatch(&self, task: Task, err: &EncodingError) {
        error!(
            event = "encoding_mismatch",
            service = %self.service,
            task = %task,
            table = %err.table,
            code = err.code,
            table_len = err.len,
            "Model output does not match encoding table"
        );
    }

    pub fn log_weather_failure(&self, city: &str, status: u16, message: &str) {
        warn!(
            event = "weather_lookup_failed",
            service = %self.service,
            city = %city,
            status = status,
            message = %message,
            "Weather lookup failed"
        );
    }
}
