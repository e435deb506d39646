use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use crate::api::handlers::{chat, health, query, AppState};
use crate::openapi::configure_swagger_routes;

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    debug!("Creating application router");

    let api_routes = Router::new()
        .route("/schema", get(query::get_schema))
        .route("/query", post(query::ask_question))
        .route("/sql", post(query::run_sql))
        .route("/chat", post(chat::chat));

    debug!("API routes configured");

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .layer(Extension(state.health_service.clone()));

    let app = Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .with_state(state);

    let app = add_swagger_ui(app);
    debug!("Swagger UI merged");

    health::initialize_server_start_time();

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Add Swagger UI to the router
pub fn add_swagger_ui(app: Router) -> Router {
    app.merge(configure_swagger_routes())
}
