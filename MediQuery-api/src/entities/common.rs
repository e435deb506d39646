use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error response format for API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code - machine-readable identifier
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details,
        }
    }

    /// Create a validation error response
    pub fn validation_error(message: &str, details: Option<serde_json::Value>) -> Self {
        Self::new("validation_error", message, details)
    }

    /// Generated or supplied SQL was refused by the guard
    pub fn rejected_query(message: &str, details: Option<serde_json::Value>) -> Self {
        Self::new("rejected_query", message, details)
    }

    /// The correction loop ran out of attempts
    pub fn unanswerable(message: &str, details: Option<serde_json::Value>) -> Self {
        Self::new("unanswerable", message, details)
    }

    pub fn llm_error(message: &str) -> Self {
        Self::new("llm_error", message, None)
    }

    pub fn execution_error(message: &str) -> Self {
        Self::new("execution_error", message, None)
    }

    /// Create an internal error response
    pub fn internal_error() -> Self {
        Self::new("internal_error", "An unexpected error occurred", None)
    }

    pub fn status_code(&self) -> StatusCode {
        match self.error.as_str() {
            "validation_error" | "rejected_query" | "execution_error" => StatusCode::BAD_REQUEST,
            "unanswerable" => StatusCode::UNPROCESSABLE_ENTITY,
            "llm_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ErrorResponse::validation_error("bad", None).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorResponse::rejected_query("no", None).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorResponse::unanswerable("gave up", None).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ErrorResponse::llm_error("down").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ErrorResponse::internal_error().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_details_omitted_when_absent() {
        let json = serde_json::to_value(ErrorResponse::llm_error("down")).unwrap();
        assert!(json.get("details").is_none());
        assert_eq!(json["error"], "llm_error");
    }
}
