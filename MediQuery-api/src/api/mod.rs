pub mod handlers;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tracing::info;

use handlers::AppState;
use mediquery_data::database::{initialize_database_pool, DatabaseConfig};
use mediquery_domain::health::HealthService;
use mediquery_domain::llm::{HuggingFaceClient, LlmConfig};
use mediquery_domain::services::{ChatSession, QueryService, QueryServiceConfig};

/// Build the services from environment configuration
pub fn create_application_state() -> anyhow::Result<AppState> {
    let db_config = DatabaseConfig::from_env();
    let pool = initialize_database_pool(&db_config)?;
    info!("Database pool initialized at {}", pool.path().display());

    let llm_config = LlmConfig::from_env();
    let llm = Arc::new(HuggingFaceClient::new(llm_config.clone())?);

    let query_service = QueryService::new(pool, llm.clone(), QueryServiceConfig::from_env())?;

    Ok(AppState {
        query_service: Arc::new(query_service),
        chat_service: Arc::new(ChatSession::new(llm)),
        health_service: Arc::new(HealthService::from_global(&llm_config)),
    })
}

/// Create the application router
pub fn create_application() -> anyhow::Result<Router> {
    Ok(routes::create_app(create_application_state()?))
}
