use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use tracing::{error, instrument};
use validator::Validate;

use super::{validation_response, AppState};
use crate::entities::{ChatRequest, ChatResponse, ErrorResponse};

/// Send a free-form prompt to the language model
#[utoipa::path(
    post,
    path = "/api/v1/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Model reply", body = ChatResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "Language model unavailable", body = ErrorResponse)
    ),
    tag = "chat"
)]
#[instrument(skip(state, request))]
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    if let Err(errors) = request.validate() {
        return Err(validation_response(&errors));
    }

    match state.chat_service.send(&request.prompt).await {
        Ok(reply) => Ok(Json(ChatResponse::from(reply))),
        Err(e) => {
            error!("Chat request failed: {}", e);
            Err(ErrorResponse::llm_error(&e.to_string()))
        }
    }
}
