mod query_test;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use super::AppState;
use crate::api::routes::create_app;
use mediquery_data::{DatabaseConfig, DatabasePool};
use mediquery_domain::health::HealthService;
use mediquery_domain::llm::LlmConfig;
use mediquery_domain::services::{ChatSession, QueryService, QueryServiceConfig};
use mediquery_domain::testing::{create_fixture_database, ScriptedLlmClient};

fn fixture_pool(dir: &TempDir) -> DatabasePool {
    let path = dir.path().join("hospital.db");
    create_fixture_database(&path).unwrap();
    DatabasePool::open(&DatabaseConfig {
        sqlite_path: path,
        ..DatabaseConfig::default()
    })
    .unwrap()
}

/// Application over the fixture database with a scripted model
pub(super) fn test_app(dir: &TempDir, replies: &[&str]) -> Router {
    let pool = fixture_pool(dir);
    let llm = Arc::new(ScriptedLlmClient::new(replies.iter().copied()));
    let query_service =
        QueryService::new(pool.clone(), llm.clone(), QueryServiceConfig::default()).unwrap();
    let llm_config = LlmConfig {
        api_key: Some("hf_test".to_string()),
        ..LlmConfig::default()
    };

    create_app(AppState {
        query_service: Arc::new(query_service),
        chat_service: Arc::new(ChatSession::new(llm)),
        health_service: Arc::new(HealthService::new(Some(pool), &llm_config)),
    })
}

pub(super) fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(super) fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Send a request and decode the JSON body
pub(super) async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}
