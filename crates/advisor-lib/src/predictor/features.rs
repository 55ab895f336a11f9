//! Feature normalization for ML inference
//!
//! Turns loosely-typed request fields into ordered, typed feature records
//! for each task schema. Categorical fertilizer inputs are encoded through
//! the shared encoding tables. No range checks are applied.

use crate::encoding::{EncodingTables, TABLES};
use crate::error::{PredictionError, PredictionResult};
use crate::models::{FeatureRecord, FeatureValue, RawFields, Task};

/// Builds feature records from raw request fields
#[derive(Debug, Clone, Copy)]
pub struct FeatureNormalizer {
    tables: &'static EncodingTables,
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self::new(&TABLES)
    }
}

impl FeatureNormalizer {
    pub fn new(tables: &'static EncodingTables) -> Self {
        Self { tables }
    }

    pub fn normalize(&self, task: Task, fields: &RawFields) -> PredictionResult<FeatureRecord> {
        match task {
            Task::Yield => self.yield_record(fields),
            Task::Crop => self.crop_record(fields),
            Task::Fertilizer => self.fertilizer_record(fields),
        }
    }

    pub fn yield_record(&self, fields: &RawFields) -> PredictionResult<FeatureRecord> {
        let mut record = FeatureRecord::new(Task::Yield);
        record.push("State", text(fields, "State")?);
        record.push("District", text(fields, "District")?);
        record.push("Crop", text(fields, "Crop")?);
        record.push("Crop_Year", int(fields, "Crop_Year")?);
        record.push("Season", text(fields, "Season")?);
        record.push("Area", float(fields, "Area")?);
        record.push("Production", float(fields, "Production")?);
        Ok(record)
    }

    pub fn crop_record(&self, fields: &RawFields) -> PredictionResult<FeatureRecord> {
        let mut record = FeatureRecord::new(Task::Crop);
        record.push("Nitrogen", float(fields, "N")?);
        record.push("Phosphorous", float(fields, "P")?);
        record.push("Potassium", float(fields, "K")?);
        record.push("temperature", float(fields, "temperature")?);
        record.push("humidity", float(fields, "humidity")?);
        record.push("ph", float(fields, "ph")?);
        record.push("rainfall", float(fields, "rainfall")?);
        Ok(record)
    }

    pub fn fertilizer_record(&self, fields: &RawFields) -> PredictionResult<FeatureRecord> {
        let temperature = float(fields, "temperature")?;
        let humidity = float(fields, "humidity")?;
        let moisture = float(fields, "moisture")?;
        let nitrogen = float(fields, "N")?;
        let potassium = float(fields, "K")?;
        let phosphorous = float(fields, "P")?;

        // Unknown labels encode to UNKNOWN_LABEL_CODE rather than failing
        let soil = required(fields, "soil")?;
        let crop = required(fields, "crop")?;
        let soil_code = self.tables.soil_types.code_of(soil);
        let crop_code = self.tables.crop_types.code_of(crop);
        if !self.tables.soil_types.contains(soil) || !self.tables.crop_types.contains(crop) {
            tracing::debug!(soil = %soil, crop = %crop, "Unrecognised category label, using default code");
        }

        let mut record = FeatureRecord::new(Task::Fertilizer);
        record.push("Temperature", temperature);
        record.push("Humidity", humidity);
        record.push("Moisture", moisture);
        record.push("Nitrogen", nitrogen);
        record.push("Potassium", potassium);
        record.push("Phosphorous", phosphorous);
        record.push("Soil_Type", FeatureValue::Int(soil_code as i64));
        record.push("Crop_Type", FeatureValue::Int(crop_code as i64));
        Ok(record)
    }
}

fn required<'a>(fields: &'a RawFields, name: &str) -> PredictionResult<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| PredictionError::missing_field(name))
}

fn text(fields: &RawFields, name: &str) -> PredictionResult<FeatureValue> {
    required(fields, name).map(|v| FeatureValue::Text(v.to_string()))
}

fn int(fields: &RawFields, name: &str) -> PredictionResult<FeatureValue> {
    let raw = required(fields, name)?;
    raw.trim()
        .parse::<i64>()
        .map(FeatureValue::Int)
        .map_err(|_| PredictionError::not_a_number(name, raw, "an integer"))
}

fn float(fields: &RawFields, name: &str) -> PredictionResult<FeatureValue> {
    let raw = required(fields, name)?;
    raw.trim()
        .parse::<f64>()
        .map(FeatureValue::Float)
        .map_err(|_| PredictionError::not_a_number(name, raw, "a number"))
}
