//! HTTP API: prediction routes, weather passthrough, health and Prometheus metrics

use advisor_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::{AdvisorMetrics, StructuredLogger},
    predictor::Dispatcher,
    weather::{WeatherError, WeatherProvider},
    RawFields, Task, TABLES,
};
use axum::{
    async_trait,
    extract::{multipart::MultipartError, FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub weather: Arc<dyn WeatherProvider>,
    pub health_registry: HealthRegistry,
    pub metrics: AdvisorMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        dispatcher: Dispatcher,
        weather: Arc<dyn WeatherProvider>,
        health_registry: HealthRegistry,
        metrics: AdvisorMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            dispatcher,
            weather,
            health_registry,
            metrics,
            logger,
        }
    }
}

/// Request fields from a urlencoded or multipart form post, or a JSON object
///
/// An unreadable body yields no fields, so the dispatcher reports the first
/// missing field instead of the request failing outright.
pub struct InputFields(pub RawFields);

#[async_trait]
impl<S> FromRequest<S> for InputFields
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let fields = if content_type.starts_with("application/json") {
            match Json::<HashMap<String, Value>>::from_request(req, state).await {
                Ok(Json(body)) => json_to_fields(body),
                Err(e) => {
                    debug!(error = %e, "Unreadable JSON body");
                    RawFields::new()
                }
            }
        } else if content_type.starts_with("multipart/form-data") {
            let parsed = match Multipart::from_request(req, state).await {
                Ok(multipart) => multipart_fields(multipart).await,
                Err(e) => {
                    debug!(error = %e, "Unreadable multipart body");
                    Ok(RawFields::new())
                }
            };
            parsed.unwrap_or_else(|e| {
                debug!(error = %e, "Malformed multipart body");
                RawFields::new()
            })
        } else {
            match Form::<RawFields>::from_request(req, state).await {
                Ok(Form(body)) => body,
                Err(e) => {
                    debug!(error = %e, "Unreadable form body");
                    RawFields::new()
                }
            }
        };

        Ok(InputFields(fields))
    }
}

/// Named text parts; file uploads are skipped
async fn multipart_fields(mut multipart: Multipart) -> Result<RawFields, MultipartError> {
    let mut fields = RawFields::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            continue;
        }
        fields.insert(name, field.text().await?);
    }
    Ok(fields)
}

/// JSON scalars become their textual form; nulls count as missing
fn json_to_fields(body: HashMap<String, Value>) -> RawFields {
    body.into_iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) => Some((k, s)),
            other => Some((k, other.to_string())),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub prediction_text: String,
    pub success: bool,
}

fn run_task(state: &AppState, task: Task, fields: RawFields) -> Json<PredictionResponse> {
    let outcome = state.dispatcher.run(task, &fields);
    Json(PredictionResponse {
        success: outcome.is_success(),
        prediction_text: outcome.into_text(),
    })
}

async fn yield_predict(
    State(state): State<Arc<AppState>>,
    InputFields(fields): InputFields,
) -> impl IntoResponse {
    run_task(&state, Task::Yield, fields)
}

async fn crop_recommend(
    State(state): State<Arc<AppState>>,
    InputFields(fields): InputFields,
) -> impl IntoResponse {
    run_task(&state, Task::Crop, fields)
}

async fn fertilizer_recommend(
    State(state): State<Arc<AppState>>,
    InputFields(fields): InputFields,
) -> impl IntoResponse {
    run_task(&state, Task::Fertilizer, fields)
}

/// Dropdown choices for the fertilizer form
async fn fertilizer_options() -> impl IntoResponse {
    Json(json!({
        "soil_types": TABLES.soil_types.labels,
        "crop_types": TABLES.crop_types.labels,
    }))
}

async fn tables() -> impl IntoResponse {
    Json(&TABLES)
}

/// Service index: version and which tasks have a model behind them
async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let invoker = state.dispatcher.invoker();
    let tasks: Vec<Value> = Task::ALL
        .into_iter()
        .map(|task| {
            json!({
                "task": task,
                "loaded": invoker.is_loaded(task),
                "model_version": invoker.model_version(task),
            })
        })
        .collect();

    Json(json!({
        "service": state.logger.service(),
        "version": env!("CARGO_PKG_VERSION"),
        "tables_version": TABLES.version,
        "tasks": tasks,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WeatherRequest {
    pub city: Option<String>,
}

async fn weather_data(
    State(state): State<Arc<AppState>>,
    body: Option<Json<WeatherRequest>>,
) -> Response {
    let city = body.and_then(|Json(b)| b.city).unwrap_or_default();

    let start = Instant::now();
    let result = state.weather.current(&city).await;
    state
        .metrics
        .observe_weather_latency(start.elapsed().as_secs_f64());

    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => {
            let status = StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if !matches!(err, WeatherError::MissingCity) {
                state.metrics.inc_weather_errors();
                state
                    .logger
                    .log_weather_failure(&city, status.as_u16(), &err.to_string());
            }
            (status, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

/// Health check response - 200 while operational, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/yield-predict", post(yield_predict))
        .route("/crop-recommend", post(crop_recommend))
        .route(
            "/fertilizer-recommend",
            get(fertilizer_options).post(fertilizer_recommend),
        )
        .route("/tables", get(tables))
        .route("/weather-data", post(weather_data))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
