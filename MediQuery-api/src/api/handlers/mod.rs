pub mod chat;
pub mod health;
pub mod query;

// Tests module
#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde_json::json;
use tracing::error;
use validator::ValidationErrors;

use crate::entities::ErrorResponse;
use mediquery_domain::health::HealthServiceTrait;
use mediquery_domain::services::query::validation_message;
use mediquery_domain::services::{ChatServiceTrait, QueryServiceError, QueryServiceTrait};

// Re-export handlers for easier imports
pub use chat::chat;
pub use health::health_check;
pub use query::{ask_question, get_schema, run_sql};

/// Services shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub query_service: Arc<dyn QueryServiceTrait>,
    pub chat_service: Arc<dyn ChatServiceTrait>,
    pub health_service: Arc<dyn HealthServiceTrait>,
}

/// Turn validator errors into a 400 response with per-field details
pub fn validation_response(errors: &ValidationErrors) -> ErrorResponse {
    let details = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .filter_map(|err| err.message.as_ref().map(|m| m.to_string()))
                .collect();
            (field.to_string(), json!(messages))
        })
        .collect::<serde_json::Map<String, serde_json::Value>>();

    ErrorResponse::validation_error(&validation_message(errors), Some(details.into()))
}

/// Map service errors to API error responses
pub fn map_query_error(err: QueryServiceError) -> ErrorResponse {
    let message = err.to_string();
    match err {
        QueryServiceError::Validation(msg) => ErrorResponse::validation_error(&msg, None),
        QueryServiceError::Rejected(_) => ErrorResponse::rejected_query(&message, None),
        QueryServiceError::UnknownTables { tables, available } => ErrorResponse::rejected_query(
            &message,
            Some(json!({ "unknown_tables": tables, "available_tables": available })),
        ),
        QueryServiceError::Unanswerable { attempts } => {
            ErrorResponse::unanswerable(&message, Some(json!({ "attempts": attempts })))
        }
        QueryServiceError::Llm(_) => ErrorResponse::llm_error(&message),
        QueryServiceError::Execution(_) => ErrorResponse::execution_error(&message),
        QueryServiceError::Database(_) => {
            error!("Database error: {}", message);
            ErrorResponse::internal_error()
        }
    }
}
