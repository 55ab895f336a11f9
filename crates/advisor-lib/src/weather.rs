//! Current-weather passthrough
//!
//! Fetches current conditions for a city from OpenWeatherMap and trims the
//! upstream payload down to the fields the front end displays.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default OpenWeatherMap current-weather endpoint
pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Upper bound on a single upstream call
pub const DEFAULT_WEATHER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("City name is required")]
    MissingCity,

    #[error("Weather API key not configured on server")]
    NotConfigured,

    /// The provider answered with a non-success status
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Decode(String),
}

impl WeatherError {
    /// HTTP status to report to the caller
    pub fn status_code(&self) -> u16 {
        match self {
            WeatherError::MissingCity => 400,
            WeatherError::NotConfigured => 500,
            WeatherError::Upstream { status, .. } => *status,
            WeatherError::Transport(_) | WeatherError::Decode(_) => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReading {
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: Option<f64>,
    pub deg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

/// Trimmed current-weather report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub name: Option<String>,
    pub main: MainReading,
    pub wind: Wind,
    /// First entry of the upstream `weather` list, `{}` if absent
    pub weather: Value,
    pub sys: SunTimes,
    pub rain: Option<Value>,
}

impl WeatherReport {
    /// Keep only the displayed fields of an upstream payload; absent fields become null
    pub fn from_upstream(payload: &Value) -> Self {
        let field = |section: &str, key: &str| payload.get(section).and_then(|s| s.get(key)).cloned();
        let f64_at = |section: &str, key: &str| field(section, key).and_then(|v| v.as_f64());
        let i64_at = |section: &str, key: &str| field(section, key).and_then(|v| v.as_i64());

        Self {
            name: payload.get("name").and_then(Value::as_str).map(str::to_string),
            main: MainReading {
                temp: f64_at("main", "temp"),
                humidity: f64_at("main", "humidity"),
                pressure: f64_at("main", "pressure"),
            },
            wind: Wind {
                speed: f64_at("wind", "speed"),
                deg: f64_at("wind", "deg"),
            },
            weather: payload
                .get("weather")
                .and_then(|w| w.get(0))
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
            sys: SunTimes {
                sunrise: i64_at("sys", "sunrise"),
                sunset: i64_at("sys", "sunset"),
            },
            rain: payload.get("rain").filter(|r| !r.is_null()).cloned(),
        }
    }
}

/// Source of current-weather reports
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError>;

    /// Whether the provider can serve requests at all
    fn is_configured(&self) -> bool;
}

/// OpenWeatherMap client
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl OpenWeatherClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = Url::parse(base_url).context("Invalid weather API URL")?;
        let api_key = api_key.filter(|k| !k.trim().is_empty());

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn request_url(&self, city: &str, api_key: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("q", city)
            .append_pair("appid", api_key)
            .append_pair("units", "metric");
        url
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(WeatherError::MissingCity);
        }
        let api_key = self.api_key.as_deref().ok_or(WeatherError::NotConfigured)?;

        let response = self
            .client
            .get(self.request_url(city, api_key))
            .send()
            .await
            .map_err(|e| WeatherError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::Transport(e.to_string()))?;
        let payload: Option<Value> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = payload
                .as_ref()
                .and_then(|p| p.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Failed to fetch weather data")
                .to_string();
            return Err(WeatherError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let payload = payload.ok_or_else(|| {
            WeatherError::Decode("Weather provider returned invalid JSON".to_string())
        })?;
        Ok(WeatherReport::from_upstream(&payload))
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
