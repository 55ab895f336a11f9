//! ML prediction engine

mod dispatcher;
mod features;
mod inference;
mod invoker;
mod output;

pub use dispatcher::{Dispatcher, PredictionOutcome};
pub use features::FeatureNormalizer;
pub use inference::{ChecksumMismatch, OnnxPredictor};
pub use invoker::{LoadStatus, ModelInvoker, ModelSource};
pub use output::{OutputFormatter, CROP_INDEX_OFFSET, YIELD_UNIT};

use crate::models::{FeatureRecord, RawOutput};
use anyhow::Result;

/// Trait for prediction implementations
pub trait Predictor: Send + Sync {
    /// Run the model on a schema-validated record
    fn predict(&self, record: &FeatureRecord) -> Result<RawOutput>;

    /// Short identifier of the loaded artifact
    fn model_version(&self) -> &str;
}
