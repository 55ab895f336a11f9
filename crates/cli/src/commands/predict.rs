//! Prediction CLI commands

use anyhow::Result;
use std::collections::BTreeMap;

use crate::client::{ApiClient, PredictionResponse};
use crate::output::{print_json, print_success, OutputFormat};

/// Inputs for a yield prediction
pub struct YieldInput {
    pub state: String,
    pub district: String,
    pub crop: String,
    pub year: i64,
    pub season: String,
    pub area: f64,
    pub production: f64,
}

impl YieldInput {
    fn fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("State", self.state.clone()),
            ("District", self.district.clone()),
            ("Crop", self.crop.clone()),
            ("Crop_Year", self.year.to_string()),
            ("Season", self.season.clone()),
            ("Area", self.area.to_string()),
            ("Production", self.production.to_string()),
        ])
    }
}

/// Soil and climate readings for a crop recommendation
pub struct CropInput {
    pub nitrogen: f64,
    pub phosphorous: f64,
    pub potassium: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
}

impl CropInput {
    fn fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("N", self.nitrogen.to_string()),
            ("P", self.phosphorous.to_string()),
            ("K", self.potassium.to_string()),
            ("temperature", self.temperature.to_string()),
            ("humidity", self.humidity.to_string()),
            ("ph", self.ph.to_string()),
            ("rainfall", self.rainfall.to_string()),
        ])
    }
}

/// Field conditions for a fertilizer recommendation
pub struct FertilizerInput {
    pub temperature: f64,
    pub humidity: f64,
    pub moisture: f64,
    pub nitrogen: f64,
    pub potassium: f64,
    pub phosphorous: f64,
    pub soil: String,
    pub crop: String,
}

impl FertilizerInput {
    fn fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("temperature", self.temperature.to_string()),
            ("humidity", self.humidity.to_string()),
            ("moisture", self.moisture.to_string()),
            ("N", self.nitrogen.to_string()),
            ("K", self.potassium.to_string()),
            ("P", self.phosphorous.to_string()),
            ("soil", self.soil.clone()),
            ("crop", self.crop.clone()),
        ])
    }
}

pub async fn predict_yield(client: &ApiClient, input: &YieldInput, format: OutputFormat) -> Result<()> {
    let response = client.post_form("yield-predict", &input.fields()).await?;
    report(response, format)
}

pub async fn recommend_crop(client: &ApiClient, input: &CropInput, format: OutputFormat) -> Result<()> {
    let response = client.post_form("crop-recommend", &input.fields()).await?;
    report(response, format)
}

pub async fn recommend_fertilizer(
    client: &ApiClient,
    input: &FertilizerInput,
    format: OutputFormat,
) -> Result<()> {
    let response = client
        .post_form("fertilizer-recommend", &input.fields())
        .await?;
    report(response, format)
}

/// The service answers 200 for every outcome; an unsuccessful text becomes the command error
fn report(response: PredictionResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table if response.success => print_success(&response.prediction_text),
        OutputFormat::Table => {}
    }

    if !response.success {
        anyhow::bail!(response.prediction_text);
    }
    Ok(())
}
