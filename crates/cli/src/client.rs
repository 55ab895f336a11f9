//! API client for the farm advisor service

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the farm advisor service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    /// Make a POST request with a form-encoded body
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        fields: &BTreeMap<&str, String>,
    ) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction_text: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FertilizerOptions {
    pub soil_types: Vec<String>,
    pub crop_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingTable {
    pub name: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingTables {
    pub version: String,
    pub soil_types: EncodingTable,
    pub crop_types: EncodingTable,
    pub crop_species: EncodingTable,
    pub fertilizer_classes: EncodingTable,
}

impl EncodingTables {
    pub fn all(&self) -> [&EncodingTable; 4] {
        [
            &self.soil_types,
            &self.crop_types,
            &self.crop_species,
            &self.fertilizer_classes,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherRequest {
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainReading {
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wind {
    pub speed: Option<f64>,
    pub deg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub name: Option<String>,
    pub main: MainReading,
    pub wind: Wind,
    pub weather: serde_json::Value,
    pub sys: SunTimes,
    pub rain: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task: String,
    pub loaded: bool,
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub tables_version: String,
    pub tasks: Vec<TaskStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_post_form_sends_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/crop-recommend")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("N".into(), "90".into()),
                Matcher::UrlEncoded("ph".into(), "6.5".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"prediction_text":"Recommended Crop: rice","success":true}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("N", "90".to_string());
        fields.insert("ph", "6.5".to_string());

        let response: PredictionResponse = client.post_form("crop-recommend", &fields).await.unwrap();
        mock.assert_async().await;
        assert!(response.success);
        assert_eq!(response.prediction_text, "Recommended Crop: rice");
    }

    #[tokio::test]
    async fn test_error_body_message_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/weather-data")
            .with_status(400)
            .with_body(r#"{"error":"City name is required"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .post::<WeatherReport, _>(
                "weather-data",
                &WeatherRequest {
                    city: String::new(),
                },
            )
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("400"), "{}", message);
        assert!(message.contains("City name is required"), "{}", message);
    }

    #[tokio::test]
    async fn test_get_tables() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "version": "2024.1",
            "soil_types": {"name": "soil_types", "labels": ["Black", "Sandy"]},
            "crop_types": {"name": "crop_types", "labels": ["Maize"]},
            "crop_species": {"name": "crop_species", "labels": ["rice"]},
            "fertilizer_classes": {"name": "fertilizer_classes", "labels": ["DAP", "Urea"]}
        });
        let _mock = server
            .mock("GET", "/tables")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let tables: EncodingTables = client.get("tables").await.unwrap();
        assert_eq!(tables.version, "2024.1");
        assert_eq!(tables.all()[3].labels, vec!["DAP", "Urea"]);
    }
}
