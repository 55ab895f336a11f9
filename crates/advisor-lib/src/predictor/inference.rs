//! ONNX inference using tract
//!
//! Loads the exported estimators and runs single-row inference. Packed
//! models take one `[1, n]` f32 tensor; per-column models (the usual export
//! of a column-transformer pipeline) take one `[1, 1]` tensor per column.

use super::Predictor;
use crate::models::{FeatureKind, FeatureRecord, FeatureSchema, FeatureValue, InputLayout, RawOutput};
use crate::observability::AdvisorMetrics;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 50;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// An artifact whose digest differs from the configured one
#[derive(Debug, Error)]
#[error("checksum mismatch: expected {expected}, got {actual}")]
pub struct ChecksumMismatch {
    pub expected: String,
    pub actual: String,
}

/// ONNX-based predictor using tract for lightweight inference
pub struct OnnxPredictor {
    model: TractModel,
    schema: &'static FeatureSchema,
    checksum: String,
    metrics: AdvisorMetrics,
}

impl std::fmt::Debug for OnnxPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPredictor")
            .field("task", &self.schema.task)
            .field("checksum", &self.checksum)
            .finish()
    }
}

impl OnnxPredictor {
    /// Read a model artifact from disk.
    ///
    /// When `expected_sha256` is given the artifact is rejected with
    /// [`ChecksumMismatch`] unless its digest matches.
    pub fn from_path(
        path: &Path,
        schema: &'static FeatureSchema,
        expected_sha256: Option<&str>,
    ) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read model file {:?}", path))?;

        Self::from_bytes(&bytes, schema, expected_sha256)
            .with_context(|| format!("Failed to load model {:?}", path))
    }

    /// Create a predictor from model bytes
    pub fn from_bytes(
        model_bytes: &[u8],
        schema: &'static FeatureSchema,
        expected_sha256: Option<&str>,
    ) -> Result<Self> {
        let checksum = sha256_hex(model_bytes);
        if let Some(expected) = expected_sha256 {
            if !expected.eq_ignore_ascii_case(&checksum) {
                return Err(ChecksumMismatch {
                    expected: expected.to_string(),
                    actual: checksum,
                }
                .into());
            }
        }

        let model = Self::load_model(model_bytes, schema)?;
        Ok(Self {
            model,
            schema,
            checksum,
            metrics: AdvisorMetrics::new(),
        })
    }

    /// Load and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8], schema: &FeatureSchema) -> Result<TractModel> {
        let mut model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?;

        match schema.layout {
            InputLayout::Packed => {
                model = model
                    .with_input_fact(0, f32::fact([1, schema.len()]).into())
                    .context("Failed to set input shape")?;
            }
            InputLayout::PerColumn => {
                for (idx, slot) in schema.slots.iter().enumerate() {
                    let fact = match slot.kind {
                        FeatureKind::Text => String::fact([1, 1]),
                        FeatureKind::Int => i64::fact([1, 1]),
                        FeatureKind::Float => f32::fact([1, 1]),
                    };
                    model = model
                        .with_input_fact(idx, fact.into())
                        .with_context(|| format!("Failed to set input fact for '{}'", slot.name))?;
                }
            }
        }

        let model = model
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    /// Convert a feature record to model inputs
    fn record_to_inputs(&self, record: &FeatureRecord) -> Result<TVec<TValue>> {
        match self.schema.layout {
            InputLayout::Packed => {
                let data: Vec<f32> = record
                    .numeric_values()
                    .context("Packed model received a text feature")?
                    .into_iter()
                    .map(|v| v as f32)
                    .collect();
                let tensor: Tensor =
                    tract_ndarray::Array2::from_shape_vec((1, data.len()), data)?.into();
                Ok(tvec!(tensor.into()))
            }
            InputLayout::PerColumn => record
                .values()
                .map(|value| -> Result<TValue> {
                    let tensor: Tensor = match value {
                        FeatureValue::Text(s) => {
                            tract_ndarray::Array2::from_shape_vec((1, 1), vec![s.clone()])?.into()
                        }
                        FeatureValue::Int(v) => {
                            tract_ndarray::Array2::from_shape_vec((1, 1), vec![*v])?.into()
                        }
                        FeatureValue::Float(v) => {
                            tract_ndarray::Array2::from_shape_vec((1, 1), vec![*v as f32])?.into()
                        }
                    };
                    Ok(tensor.into())
                })
                .collect(),
        }
    }
}

impl Predictor for OnnxPredictor {
    fn predict(&self, record: &FeatureRecord) -> Result<RawOutput> {
        let start = Instant::now();

        let inputs = self.record_to_inputs(record)?;
        let result = self.model.run(inputs)?;
        let output = result.get(0).context("No output from model")?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.metrics.inc_slow_inferences(self.schema.task);
            warn!(task = %self.schema.task, elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(task = %self.schema.task, elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        tensor_to_output(output)
    }

    fn model_version(&self) -> &str {
        &self.checksum[..12.min(self.checksum.len())]
    }
}

/// Read the first element of the model's label/score output
fn tensor_to_output(output: &Tensor) -> Result<RawOutput> {
    let raw = match output.datum_type() {
        DatumType::I64 => RawOutput::Class(first(output.to_array_view::<i64>()?.iter().copied())?),
        DatumType::I32 => {
            RawOutput::Class(first(output.to_array_view::<i32>()?.iter().copied())? as i64)
        }
        DatumType::F32 => {
            RawOutput::Score(first(output.to_array_view::<f32>()?.iter().copied())? as f64)
        }
        DatumType::F64 => RawOutput::Score(first(output.to_array_view::<f64>()?.iter().copied())?),
        other => anyhow::bail!("Unsupported model output type {:?}", other),
    };
    Ok(raw)
}

fn first<T>(mut values: impl Iterator<Item = T>) -> Result<T> {
    values.next().context("Model output is empty")
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
