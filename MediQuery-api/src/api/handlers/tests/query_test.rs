use axum::http::StatusCode;
use serde_json::json;
use tempfile::TempDir;

use super::{get, post_json, send, test_app};

#[tokio::test]
async fn test_ask_question() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir, &["SQL: SELECT name FROM doctor ORDER BY name;"]);

    let (status, body) = send(
        app,
        post_json("/api/v1/query", json!({ "question": "List all doctors" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sql"], "SELECT name FROM doctor ORDER BY name");
    assert_eq!(body["model"], "scripted-model");
    assert_eq!(
        body["result"]["rows"],
        json!([["Dr. Grey"], ["Dr. House"], ["Dr. Yang"]])
    );
    assert_eq!(body["attempts"], json!([]));
}

#[tokio::test]
async fn test_ask_question_with_correction() {
    let dir = TempDir::new().unwrap();
    let app = test_app(
        &dir,
        &[
            "SELECT COUNT(*) FROM doctors",
            "SELECT COUNT(*) AS doctors FROM doctor",
        ],
    );

    let (status, body) = send(
        app,
        post_json("/api/v1/query", json!({ "question": "How many doctors?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["rows"], json!([[3]]));
    assert_eq!(body["attempts"][0]["sql"], "SELECT COUNT(*) FROM doctors");
}

#[tokio::test]
async fn test_ask_question_unanswerable() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir, &["I don't know", "Sorry", "No idea"]);

    let (status, body) = send(
        app,
        post_json("/api/v1/query", json!({ "question": "What is the meaning of life?" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unanswerable");
    assert_eq!(body["details"]["attempts"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_ask_question_validation() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir, &[]);

    let (status, body) = send(
        app,
        post_json("/api/v1/query", json!({ "question": "", "max_rows": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["details"].get("question").is_some());
    assert!(body["details"].get("max_rows").is_some());
}

#[tokio::test]
async fn test_ask_question_llm_unavailable() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir, &[]);

    let (status, body) = send(
        app,
        post_json("/api/v1/query", json!({ "question": "How many patients?" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "llm_error");
}

#[tokio::test]
async fn test_run_sql() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir, &[]);

    let (status, body) = send(
        app,
        post_json(
            "/api/v1/sql",
            json!({ "sql": "SELECT name FROM patient ORDER BY patient_id", "max_rows": 3 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["columns"], json!(["name"]));
    assert_eq!(body["row_count"], 3);
    assert_eq!(body["truncated"], true);
}

#[tokio::test]
async fn test_run_sql_rejects_writes() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir, &[]);

    let (status, body) = send(
        app,
        post_json("/api/v1/sql", json!({ "sql": "DELETE FROM patient" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "rejected_query");
}

#[tokio::test]
async fn test_run_sql_execution_error() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir, &[]);

    let (status, body) = send(
        app,
        post_json("/api/v1/sql", json!({ "sql": "SELECT ward FROM patient" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "execution_error");
    assert!(body["message"].as_str().unwrap().contains("ward"));
}

#[tokio::test]
async fn test_get_schema() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir, &[]);

    let (status, body) = send(app, get("/api/v1/schema")).await;

    assert_eq!(status, StatusCode::OK);
    let tables = body["tables"].as_array().unwrap();
    assert_eq!(tables.len(), 3);
    assert_eq!(tables[2]["name"], "patient");
    assert_eq!(tables[2]["row_count"], 4);
    assert_eq!(tables[2]["foreign_keys"][0]["references_table"], "doctor");
    assert!(body["prompt_context"]
        .as_str()
        .unwrap()
        .contains("-- patient.doctor_id references doctor.doctor_id"));
}
