//! Request dispatch
//!
//! Wires normalizer, invoker and formatter for each task. Every path ends in
//! a display string; no error escapes to the caller.

use super::{FeatureNormalizer, ModelInvoker, OutputFormatter};
use crate::encoding::{EncodingTables, TABLES};
use crate::error::PredictionError;
use crate::models::{RawFields, Task};
use crate::observability::{AdvisorMetrics, StructuredLogger};
use serde::Serialize;
use std::time::Instant;

/// Result of a prediction request, always renderable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum PredictionOutcome {
    Success(String),
    Error(String),
}

impl PredictionOutcome {
    pub fn text(&self) -> &str {
        match self {
            PredictionOutcome::Success(t) | PredictionOutcome::Error(t) => t,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            PredictionOutcome::Success(t) | PredictionOutcome::Error(t) => t,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PredictionOutcome::Success(_))
    }
}

/// Message shown when a task's model failed to load
pub fn unavailable_message(task: Task) -> &'static str {
    match task {
        Task::Yield => "Yield prediction model not loaded.",
        Task::Crop => "Crop recommendation model not loaded.",
        Task::Fertilizer => "Fertilizer recommendation model not loaded.",
    }
}

fn error_prefix(task: Task) -> &'static str {
    match task {
        Task::Yield => "Error in yield prediction",
        Task::Crop => "Error in crop recommendation",
        Task::Fertilizer => "Error in fertilizer recommendation",
    }
}

/// Runs prediction requests end to end
#[derive(Debug, Clone)]
pub struct Dispatcher {
    normalizer: FeatureNormalizer,
    invoker: ModelInvoker,
    formatter: OutputFormatter,
    metrics: AdvisorMetrics,
    logger: StructuredLogger,
}

impl Dispatcher {
    pub fn new(invoker: ModelInvoker, logger: StructuredLogger) -> Self {
        Self::with_tables(invoker, &TABLES, logger)
    }

    pub fn with_tables(
        invoker: ModelInvoker,
        tables: &'static EncodingTables,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            normalizer: FeatureNormalizer::new(tables),
            invoker,
            formatter: OutputFormatter::new(tables),
            metrics: AdvisorMetrics::new(),
            logger,
        }
    }

    pub fn invoker(&self) -> &ModelInvoker {
        &self.invoker
    }

    pub fn run_yield_prediction(&self, fields: &RawFields) -> String {
        self.run(Task::Yield, fields).into_text()
    }

    pub fn run_crop_recommendation(&self, fields: &RawFields) -> String {
        self.run(Task::Crop, fields).into_text()
    }

    pub fn run_fertilizer_recommendation(&self, fields: &RawFields) -> String {
        self.run(Task::Fertilizer, fields).into_text()
    }

    /// Normalize, invoke and format one request
    pub fn run(&self, task: Task, fields: &RawFields) -> PredictionOutcome {
        let start = Instant::now();

        let result = self
            .normalizer
            .normalize(task, fields)
            .and_then(|record| self.invoker.predict(task, &record))
            .and_then(|raw| self.formatter.format(task, raw));

        let (outcome, kind) = match result {
            Ok(text) => {
                self.metrics.inc_predictions_served(task);
                (PredictionOutcome::Success(text), "success")
            }
            Err(err) => {
                self.metrics.inc_prediction_errors(task, err.kind());
                if let PredictionError::EncodingMismatch(e) = &err {
                    self.logger.log_encoding_mismatch(task, e);
                }
                (PredictionOutcome::Error(render_error(task, &err)), err.kind())
            }
        };

        let elapsed = start.elapsed();
        self.metrics
            .observe_prediction_latency(task, elapsed.as_secs_f64());
        self.logger
            .log_prediction(task, kind, elapsed.as_micros() as u64);

        outcome
    }
}

fn render_error(task: Task, err: &PredictionError) -> String {
    match err {
        PredictionError::ModelUnavailable(_) => unavailable_message(task).to_string(),
        other => format!("{}: {}", error_prefix(task), other),
    }
}
