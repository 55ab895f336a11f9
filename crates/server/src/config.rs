//! Service configuration

use advisor_lib::predictor::ModelSource;
use advisor_lib::weather::{DEFAULT_WEATHER_TIMEOUT, DEFAULT_WEATHER_URL};
use advisor_lib::Task;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Service configuration, read from `ADVISOR_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorConfig {
    /// Name reported in structured logs
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the model artifacts
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_yield_model_file")]
    pub yield_model_file: String,

    #[serde(default = "default_crop_model_file")]
    pub crop_model_file: String,

    #[serde(default = "default_fertilizer_model_file")]
    pub fertilizer_model_file: String,

    /// Expected SHA-256 of each artifact; a mismatch leaves the model unloaded
    #[serde(default)]
    pub yield_model_sha256: Option<String>,

    #[serde(default)]
    pub crop_model_sha256: Option<String>,

    #[serde(default)]
    pub fertilizer_model_sha256: Option<String>,

    /// OpenWeatherMap key; falls back to `WEATHER_API_KEY`
    #[serde(default = "default_weather_api_key")]
    pub weather_api_key: Option<String>,

    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,

    #[serde(default = "default_weather_timeout")]
    pub weather_timeout_secs: u64,
}

fn default_service_name() -> String {
    "farm-advisor".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models").join("ML_models")
}

fn default_yield_model_file() -> String {
    "yield_predictor.onnx".to_string()
}

fn default_crop_model_file() -> String {
    "Crop_recommendation.onnx".to_string()
}

fn default_fertilizer_model_file() -> String {
    "fertilizer.onnx".to_string()
}

fn default_weather_api_key() -> Option<String> {
    std::env::var("WEATHER_API_KEY").ok()
}

fn default_weather_base_url() -> String {
    DEFAULT_WEATHER_URL.to_string()
}

fn default_weather_timeout() -> u64 {
    DEFAULT_WEATHER_TIMEOUT.as_secs()
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            port: default_port(),
            model_dir: default_model_dir(),
            yield_model_file: default_yield_model_file(),
            crop_model_file: default_crop_model_file(),
            fertilizer_model_file: default_fertilizer_model_file(),
            yield_model_sha256: None,
            crop_model_sha256: None,
            fertilizer_model_sha256: None,
            weather_api_key: default_weather_api_key(),
            weather_base_url: default_weather_base_url(),
            weather_timeout_secs: default_weather_timeout(),
        }
    }
}

impl AdvisorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ADVISOR").try_parsing(true))
            .build()?;

        config
            .try_deserialize()
            .context("Invalid ADVISOR_* configuration")
    }

    /// Artifact location for every task
    pub fn model_sources(&self) -> Vec<ModelSource> {
        Task::ALL
            .into_iter()
            .map(|task| {
                let (file, sha) = match task {
                    Task::Yield => (&self.yield_model_file, &self.yield_model_sha256),
                    Task::Crop => (&self.crop_model_file, &self.crop_model_sha256),
                    Task::Fertilizer => {
                        (&self.fertilizer_model_file, &self.fertilizer_model_sha256)
                    }
                };
                let source = ModelSource::new(task, self.model_dir.join(file));
                match sha {
                    Some(sha) => source.with_checksum(sha.clone()),
                    None => source,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_model_dir() {
        let config = AdvisorConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.weather_timeout_secs, 10);

        let sources = config.model_sources();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].task, Task::Yield);
        assert!(sources[0].path.ends_with("models/ML_models/yield_predictor.onnx"));
        assert!(sources[2].path.ends_with("fertilizer.onnx"));
        assert!(sources.iter().all(|s| s.expected_sha256.is_none()));
    }

    #[test]
    fn test_checksum_attached_to_source() {
        let config = AdvisorConfig {
            crop_model_sha256: Some("abc".to_string()),
            ..AdvisorConfig::default()
        };
        let sources = config.model_sources();
        assert_eq!(sources[1].task, Task::Crop);
        assert_eq!(sources[1].expected_sha256.as_deref(), Some("abc"));
    }
}
