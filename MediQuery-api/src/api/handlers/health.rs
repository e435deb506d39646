use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{http::StatusCode, response::IntoResponse, Extension, Json};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use mediquery_domain::health::{ComponentStatus, HealthServiceTrait, SystemStatus};

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Current service status ("ok", "degraded", or "error")
    pub status: String,
    /// Current application version from Cargo manifest
    pub version: String,
    /// Timestamp of when the response was generated
    pub timestamp: u64,
    /// Uptime of the service in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
    /// Status per component, currently `database` and `llm`
    pub components: HashMap<String, ComponentHealthStatus>,
    /// Environment information
    pub environment: String,
}

/// Health status for an individual component
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealthStatus {
    /// Status of the component ("ok", "degraded", or "error")
    pub status: String,
    /// Optional message with more details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// Track the time when the server started
static SERVER_START_TIME: OnceCell<u64> = OnceCell::new();
static INIT: Once = Once::new();

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Record the server start time for uptime reporting
pub fn initialize_server_start_time() {
    INIT.call_once(|| {
        let _ = SERVER_START_TIME.set(unix_now());
    });
}

/// Health check endpoint to verify the API is running
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API is healthy", body = HealthResponse),
        (status = 500, description = "API is not healthy", body = HealthResponse),
        (status = 503, description = "API is degraded", body = HealthResponse)
    ),
    tag = "health"
)]
#[instrument(skip(health_service))]
pub async fn health_check(
    Extension(health_service): Extension<Arc<dyn HealthServiceTrait>>,
) -> impl IntoResponse {
    info!("Health check requested");

    let now = unix_now();
    let uptime = SERVER_START_TIME
        .get()
        .map(|&start_time| now.saturating_sub(start_time));

    let system_health = health_service.get_system_health().await;

    let (status_code, overall_status) = match system_health.status {
        SystemStatus::Healthy => (StatusCode::OK, "ok"),
        SystemStatus::Degraded => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
        SystemStatus::Unhealthy => (StatusCode::INTERNAL_SERVER_ERROR, "error"),
    };

    let components = system_health
        .components
        .into_iter()
        .map(|(name, component)| {
            (
                name,
                ComponentHealthStatus {
                    status: map_component_status(component.status).to_string(),
                    message: component.details,
                },
            )
        })
        .collect();

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now,
        uptime,
        components,
        environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
    };

    (status_code, Json(response))
}

/// Map domain component status to API status string
fn map_component_status(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Healthy => "ok",
        ComponentStatus::Degraded => "degraded",
        ComponentStatus::Unhealthy => "error",
    }
}
