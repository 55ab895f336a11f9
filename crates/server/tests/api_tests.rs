//! Integration tests for the advisor API endpoints

use advisor_lib::{
    health::{components, HealthRegistry},
    observability::{AdvisorMetrics, StructuredLogger},
    predictor::{Dispatcher, ModelInvoker, ModelSource, Predictor},
    weather::{MainReading, SunTimes, WeatherError, WeatherProvider, WeatherReport, Wind},
    FeatureRecord, RawOutput, Task,
};
use advisor_server::api::{create_router, AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct FixedPredictor(RawOutput);

impl Predictor for FixedPredictor {
    fn predict(&self, _record: &FeatureRecord) -> anyhow::Result<RawOutput> {
        Ok(self.0)
    }

    fn model_version(&self) -> &str {
        "0123456789ab"
    }
}

/// Answers from a canned table instead of calling out
struct StubWeather {
    configured: bool,
}

#[async_trait]
impl WeatherProvider for StubWeather {
    async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError> {
        if city.trim().is_empty() {
            return Err(WeatherError::MissingCity);
        }
        if !self.configured {
            return Err(WeatherError::NotConfigured);
        }
        if city == "Atlantis" {
            return Err(WeatherError::Upstream {
                status: 404,
                message: "city not found".to_string(),
            });
        }
        Ok(WeatherReport {
            name: Some(city.to_string()),
            main: MainReading {
                temp: Some(24.5),
                humidity: Some(70.0),
                pressure: Some(1012.0),
            },
            wind: Wind {
                speed: Some(2.5),
                deg: Some(180.0),
            },
            weather: json!({"main": "Clouds", "description": "scattered clouds"}),
            sys: SunTimes {
                sunrise: Some(1717460000),
                sunset: Some(1717507000),
            },
            rain: None,
        })
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

async fn setup_app(invoker: ModelInvoker, weather_configured: bool) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    for task in Task::ALL {
        health_registry.register(components::for_task(task)).await;
        health_registry
            .set_model_status(task, &invoker.load_status(task))
            .await;
    }
    health_registry.register(components::WEATHER).await;

    let logger = StructuredLogger::new("test");
    let state = Arc::new(AppState::new(
        Dispatcher::new(invoker, logger.clone()),
        Arc::new(StubWeather {
            configured: weather_configured,
        }),
        health_registry,
        AdvisorMetrics::new(),
        logger,
    ));
    (create_router(state.clone()), state)
}

fn all_models() -> ModelInvoker {
    ModelInvoker::new()
        .with_predictor(Task::Yield, Arc::new(FixedPredictor(RawOutput::Score(3.27))))
        .with_predictor(Task::Crop, Arc::new(FixedPredictor(RawOutput::Class(20))))
        .with_predictor(Task::Fertilizer, Arc::new(FixedPredictor(RawOutput::Class(6))))
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

const CROP_FORM: &str = "N=90&P=42&K=43&temperature=20.8&humidity=82&ph=6.5&rainfall=202.9";

#[tokio::test]
async fn test_crop_recommend_from_form() {
    let (app, _state) = setup_app(all_models(), true).await;

    let response = app.oneshot(form_post("/crop-recommend", CROP_FORM)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["prediction_text"], "Recommended Crop: rice");
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_yield_predict_from_json() {
    let (app, _state) = setup_app(all_models(), true).await;

    let request = json_post(
        "/yield-predict",
        json!({
            "State": "Punjab",
            "District": "LUDHIANA",
            "Crop": "Wheat",
            "Crop_Year": 2018,
            "Season": "Rabi",
            "Area": 2500.0,
            "Production": 12000
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["prediction_text"], "Predicted Yield: 3.27 tonnes/hectare");
}

#[tokio::test]
async fn test_fertilizer_recommend_from_form() {
    let (app, _state) = setup_app(all_models(), true).await;

    let form = "temperature=26&humidity=52&moisture=38&N=37&K=0&P=0&soil=Sandy&crop=Maize";
    let response = app
        .oneshot(form_post("/fertilizer-recommend", form))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["prediction_text"], "Recommended Fertilizer: Urea");
}

#[tokio::test]
async fn test_missing_field_reported_in_text() {
    let (app, _state) = setup_app(all_models(), true).await;

    let response = app
        .oneshot(form_post("/crop-recommend", "P=42&K=43"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body["prediction_text"],
        "Error in crop recommendation: missing field 'N'"
    );
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unreadable_json_treated_as_empty() {
    let (app, _state) = setup_app(all_models(), true).await;

    let request = Request::builder()
        .method("POST")
        .uri("/crop-recommend")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body["prediction_text"],
        "Error in crop recommendation: missing field 'N'"
    );
}

fn multipart_post(uri: &str, parts: &[(&str, &str)]) -> Request<Body> {
    const BOUNDARY: &str = "farm-advisor-boundary";
    let mut body = String::new();
    for (name, value) in parts {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_crop_recommend_from_multipart_form() {
    let (app, _state) = setup_app(all_models(), true).await;

    let request = multipart_post(
        "/crop-recommend",
        &[
            ("N", "90"),
            ("P", "42"),
            ("K", "43"),
            ("temperature", "20.8"),
            ("humidity", "82"),
            ("ph", "6.5"),
            ("rainfall", "202.9"),
        ],
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["prediction_text"], "Recommended Crop: rice");
}

#[tokio::test]
async fn test_multipart_missing_field_reported_in_text() {
    let (app, _state) = setup_app(all_models(), true).await;

    let request = multipart_post("/crop-recommend", &[("P", "42"), ("K", "43")]);
    let response = app.oneshot(request).await.unwrap();

    let body = body_json(response).await;
    assert_eq!(
        body["prediction_text"],
        "Error in crop recommendation: missing field 'N'"
    );
}

#[tokio::test]
async fn test_malformed_multipart_treated_as_empty() {
    let (app, _state) = setup_app(all_models(), true).await;

    let request = Request::builder()
        .method("POST")
        .uri("/crop-recommend")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
        .body(Body::from("no parts here"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body["prediction_text"],
        "Error in crop recommendation: missing field 'N'"
    );
}

#[tokio::test]
async fn test_not_loaded_message_when_model_absent() {
    let (app, _state) = setup_app(ModelInvoker::new(), true).await;

    let response = app.oneshot(form_post("/crop-recommend", CROP_FORM)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["prediction_text"], "Crop recommendation model not loaded.");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_fertilizer_options_lists_tables() {
    let (app, _state) = setup_app(all_models(), true).await;

    let response = app.oneshot(get("/fertilizer-recommend")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body["soil_types"],
        json!(["Black", "Clayey", "Loamy", "Red", "Sandy"])
    );
    assert_eq!(body["crop_types"].as_array().unwrap().len(), 11);
    assert_eq!(body["crop_types"][3], "Maize");
}

#[tokio::test]
async fn test_tables_endpoint() {
    let (app, _state) = setup_app(all_models(), true).await;

    let response = app.oneshot(get("/tables")).await.unwrap();
    let body = body_json(response).await;

    assert_eq!(body["version"], "2024.1");
    assert_eq!(body["crop_species"]["labels"][20], "rice");
    assert_eq!(body["fertilizer_classes"]["labels"][5], "DAP");
}

#[tokio::test]
async fn test_index_reports_loaded_tasks() {
    let invoker = ModelInvoker::new()
        .with_predictor(Task::Crop, Arc::new(FixedPredictor(RawOutput::Class(0))));
    let (app, _state) = setup_app(invoker, true).await;

    let response = app.oneshot(get("/")).await.unwrap();
    let body = body_json(response).await;

    assert_eq!(body["service"], "test");
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0]["task"], "yield");
    assert_eq!(tasks[0]["loaded"], false);
    assert_eq!(tasks[1]["loaded"], true);
    assert_eq!(tasks[1]["model_version"], "0123456789ab");
}

#[tokio::test]
async fn test_weather_returns_report() {
    let (app, _state) = setup_app(all_models(), true).await;

    let response = app
        .oneshot(json_post("/weather-data", json!({"city": "Pune"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "Pune");
    assert_eq!(body["main"]["temp"], 24.5);
    assert_eq!(body["weather"]["description"], "scattered clouds");
    assert!(body["rain"].is_null());
}

#[tokio::test]
async fn test_weather_requires_city() {
    let (app, _state) = setup_app(all_models(), true).await;

    let response = app
        .clone()
        .oneshot(json_post("/weather-data", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "City name is required");

    // No body at all is treated the same way
    let request = Request::builder()
        .method("POST")
        .uri("/weather-data")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_weather_without_key_returns_500() {
    let (app, _state) = setup_app(all_models(), false).await;

    let response = app
        .oneshot(json_post("/weather-data", json!({"city": "Pune"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Weather API key not configured on server"
    );
}

#[tokio::test]
async fn test_weather_upstream_status_passed_through() {
    let (app, _state) = setup_app(all_models(), true).await;

    let response = app
        .oneshot(json_post("/weather-data", json!({"city": "Atlantis"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "city not found");
}

#[tokio::test]
async fn test_healthz_ok_when_all_models_loaded() {
    let (app, _state) = setup_app(all_models(), true).await;

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["yield_model"].is_object());
    assert!(health["components"]["weather"].is_object());
}

#[tokio::test]
async fn test_healthz_degraded_when_model_missing() {
    let invoker = ModelInvoker::new()
        .with_predictor(Task::Crop, Arc::new(FixedPredictor(RawOutput::Class(0))));
    let (app, _state) = setup_app(invoker, true).await;

    let response = app.oneshot(get("/healthz")).await.unwrap();

    // Degraded still returns 200 (operational)
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["yield_model"]["message"],
        "yield model not loaded"
    );
    assert_eq!(health["components"]["crop_model"]["status"], "healthy");
}

#[tokio::test]
async fn test_checksum_rejected_model_makes_service_unhealthy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crop.onnx");
    std::fs::write(&path, b"tampered artifact").unwrap();
    let invoker = ModelInvoker::load(
        &[ModelSource::new(Task::Crop, &path).with_checksum("00ff")],
        &StructuredLogger::new("test"),
    );

    let (app, state) = setup_app(invoker, true).await;
    state.health_registry.set_ready(true).await;

    let response = app.clone().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let health = body_json(response).await;
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(health["components"]["crop_model"]["status"], "unhealthy");
    assert_eq!(health["components"]["yield_model"]["status"], "degraded");

    let response = app.clone().oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body_json(response).await["reason"],
        "Unhealthy components: crop_model"
    );

    let response = app.oneshot(form_post("/crop-recommend", CROP_FORM)).await.unwrap();
    assert_eq!(
        body_json(response).await["prediction_text"],
        "Crop recommendation model not loaded."
    );
}

#[tokio::test]
async fn test_readyz_follows_ready_flag() {
    let (app, state) = setup_app(all_models(), true).await;

    let response = app.clone().oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["ready"], false);

    state.health_registry.set_ready(true).await;

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_app(all_models(), true).await;

    // Serve one prediction so the labelled series exist
    let response = app
        .clone()
        .oneshot(form_post("/crop-recommend", CROP_FORM))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("farm_advisor_prediction_latency_seconds_bucket"));
    assert!(metrics_text.contains("farm_advisor_predictions_served_total"));
}
