//! Advisor library for farm predictions
//!
//! This crate provides the core functionality for:
//! - Categorical encoding tables shared by every model
//! - Feature normalization, model invocation and result formatting
//! - Fail-soft dispatch of yield, crop and fertilizer requests
//! - Current-weather passthrough
//! - Health checks and observability

pub mod encoding;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod weather;

pub use encoding::{EncodingError, EncodingTable, EncodingTables, TABLES, UNKNOWN_LABEL_CODE};
pub use error::PredictionError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AdvisorMetrics, StructuredLogger};
