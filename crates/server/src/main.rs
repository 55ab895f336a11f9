//! Farm Advisor - prediction service
//!
//! Loads the task models once at startup and serves predictions until
//! interrupted. Tasks whose model failed to load answer with a
//! "not loaded" message instead of failing.

use advisor_lib::{
    health::{components, HealthRegistry},
    observability::{AdvisorMetrics, StructuredLogger},
    predictor::{Dispatcher, ModelInvoker},
    weather::{OpenWeatherClient, WeatherProvider},
    Task, TABLES,
};
use advisor_server::{api, config};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting farm-advisor");

    let config = config::AdvisorConfig::load()?;
    info!(port = config.port, model_dir = %config.model_dir.display(), "Service configured");

    let logger = StructuredLogger::new(&config.service_name);
    let metrics = AdvisorMetrics::new();

    let health_registry = HealthRegistry::new();
    for task in Task::ALL {
        health_registry.register(components::for_task(task)).await;
    }
    health_registry.register(components::WEATHER).await;

    // Models are loaded exactly once; a failed load leaves that task unavailable
    let invoker = ModelInvoker::load(&config.model_sources(), &logger);
    for task in Task::ALL {
        health_registry
            .set_model_status(task, &invoker.load_status(task))
            .await;
        if let Some(version) = invoker.model_version(task) {
            metrics.set_model_version(task, version);
        }
    }
    metrics.set_models_loaded(invoker.loaded_tasks().len() as i64);

    let weather = OpenWeatherClient::new(
        &config.weather_base_url,
        config.weather_api_key.clone(),
        Duration::from_secs(config.weather_timeout_secs),
    )?;
    if !weather.is_configured() {
        health_registry
            .set_degraded(components::WEATHER, "Weather API key not configured")
            .await;
    }

    logger.log_startup(SERVICE_VERSION, TABLES.version);

    let dispatcher = Dispatcher::new(invoker, logger.clone());
    let app_state = Arc::new(api::AppState::new(
        dispatcher,
        Arc::new(weather),
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));

    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.port, app_state));

    tokio::select! {
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server exited"),
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "API server task panicked");
                    return Err(e.into());
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
