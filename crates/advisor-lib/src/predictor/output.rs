//! Prediction output formatting
//!
//! Converts raw model outputs into the display strings shown to users.

use crate::encoding::{EncodingTables, TABLES};
use crate::error::{PredictionError, PredictionResult};
use crate::models::{RawOutput, Task};

/// Unit appended to yield predictions
pub const YIELD_UNIT: &str = "tonnes/hectare";

/// Offset added to the crop classifier's index before the species lookup.
///
/// The classifier was trained on labels encoded with the same positional
/// table, so the raw index is used as-is.
pub const CROP_INDEX_OFFSET: i64 = 0;

/// Formats raw model outputs into display strings
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    tables: &'static EncodingTables,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(&TABLES)
    }
}

impl OutputFormatter {
    pub fn new(tables: &'static EncodingTables) -> Self {
        Self { tables }
    }

    pub fn format(&self, task: Task, output: RawOutput) -> PredictionResult<String> {
        match task {
            Task::Yield => self.format_yield(output),
            Task::Crop => self.format_crop(output),
            Task::Fertilizer => self.format_fertilizer(output),
        }
    }

    pub fn format_yield(&self, output: RawOutput) -> PredictionResult<String> {
        let value = match output {
            RawOutput::Score(v) => v,
            // A regressor exported with integer output is still a score
            RawOutput::Class(v) => v as f64,
        };
        Ok(format!("Predicted Yield: {:.2} {}", value, YIELD_UNIT))
    }

    pub fn format_crop(&self, output: RawOutput) -> PredictionResult<String> {
        let idx = class_index(output)?;
        let label = self.tables.crop_species.label_of(idx + CROP_INDEX_OFFSET)?;
        Ok(format!("Recommended Crop: {}", label))
    }

    pub fn format_fertilizer(&self, output: RawOutput) -> PredictionResult<String> {
        let idx = class_index(output)?;
        let label = self.tables.fertilizer_classes.label_of(idx)?;
        Ok(format!("Recommended Fertilizer: {}", label))
    }
}

fn class_index(output: RawOutput) -> PredictionResult<i64> {
    match output {
        RawOutput::Class(idx) => Ok(idx),
        RawOutput::Score(v) if v.fract() == 0.0 && v.is_finite() => Ok(v as i64),
        RawOutput::Score(v) => Err(PredictionError::InferenceFailure(format!(
            "classifier returned non-integral label {}",
            v
        ))),
    }
}
