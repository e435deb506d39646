use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, instrument, warn};
use validator::Validate;

use super::{map_query_error, validation_response, AppState};
use crate::entities::{
    AskQuestionRequest, ErrorResponse, QueryAnswerResponse, QueryResultResponse, SchemaResponse,
    SqlRequest,
};

/// Answer a natural-language question with generated SQL
#[utoipa::path(
    post,
    path = "/api/v1/query",
    request_body = AskQuestionRequest,
    responses(
        (status = 200, description = "Question answered", body = QueryAnswerResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 422, description = "No working query could be generated", body = ErrorResponse),
        (status = 502, description = "Language model unavailable", body = ErrorResponse)
    ),
    tag = "query"
)]
#[instrument(skip(state, request))]
pub async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<AskQuestionRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    info!("Question received");

    if let Err(errors) = request.validate() {
        warn!("Rejected invalid question request");
        return Err(validation_response(&errors));
    }

    let answer = state
        .query_service
        .ask(request.into())
        .await
        .map_err(map_query_error)?;

    info!(
        "Answered with {} rows after {} failed attempts",
        answer.result.row_count,
        answer.attempts.len()
    );
    Ok((StatusCode::OK, Json(QueryAnswerResponse::from(answer))))
}

/// Run a caller-supplied read-only SQL query
#[utoipa::path(
    post,
    path = "/api/v1/sql",
    request_body = SqlRequest,
    responses(
        (status = 200, description = "Query executed", body = QueryResultResponse),
        (status = 400, description = "Invalid or rejected SQL", body = ErrorResponse)
    ),
    tag = "query"
)]
#[instrument(skip(state, request))]
pub async fn run_sql(
    State(state): State<AppState>,
    Json(request): Json<SqlRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    if let Err(errors) = request.validate() {
        return Err(validation_response(&errors));
    }

    let result = state
        .query_service
        .run_sql(&request.sql, request.max_rows)
        .await
        .map_err(map_query_error)?;

    Ok((StatusCode::OK, Json(QueryResultResponse::from(result))))
}

/// Describe the hospital database schema
#[utoipa::path(
    get,
    path = "/api/v1/schema",
    responses(
        (status = 200, description = "Database schema", body = SchemaResponse)
    ),
    tag = "query"
)]
#[instrument(skip(state))]
pub async fn get_schema(State(state): State<AppState>) -> Json<SchemaResponse> {
    Json(SchemaResponse::from(state.query_service.schema()))
}
