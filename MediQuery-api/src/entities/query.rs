use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use mediquery_data::QueryResult;
use mediquery_domain::entities::{AskRequest, Attempt, ChatReply, QueryAnswer};

/// Request payload for asking a question in natural language
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AskQuestionRequest {
    /// Question about the hospital database
    #[validate(length(min = 1, max = 2000, message = "Question must be between 1 and 2000 characters"))]
    #[schema(example = "How many patients does each doctor treat?")]
    pub question: String,

    /// Maximum number of rows to return (1-1000)
    #[validate(range(min = 1, max = 1000, message = "max_rows must be between 1 and 1000"))]
    pub max_rows: Option<usize>,
}

impl From<AskQuestionRequest> for AskRequest {
    fn from(request: AskQuestionRequest) -> Self {
        AskRequest {
            question: request.question,
            max_rows: request.max_rows,
        }
    }
}

/// Request payload for running a read-only SQL query directly
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SqlRequest {
    /// A single SELECT statement
    #[validate(length(min = 1, max = 10000, message = "SQL must be between 1 and 10000 characters"))]
    #[schema(example = "SELECT name FROM doctor ORDER BY name")]
    pub sql: String,

    /// Maximum number of rows to return (1-1000)
    #[validate(range(min = 1, max = 1000, message = "max_rows must be between 1 and 1000"))]
    pub max_rows: Option<usize>,
}

/// Rows returned by a query
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryResultResponse {
    pub columns: Vec<String>,

    /// One array of values per row, in column order
    #[schema(value_type = Vec<Vec<Object>>)]
    pub rows: Vec<Vec<serde_json::Value>>,

    pub row_count: usize,

    /// True when the row limit cut the result short
    pub truncated: bool,
}

impl From<QueryResult> for QueryResultResponse {
    fn from(result: QueryResult) -> Self {
        Self {
            columns: result.columns,
            rows: result.rows,
            row_count: result.row_count,
            truncated: result.truncated,
        }
    }
}

/// A failed round of the correction loop
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Attempt> for AttemptResponse {
    fn from(attempt: Attempt) -> Self {
        Self {
            sql: attempt.sql,
            error: attempt.error,
        }
    }
}

/// Answer to a natural-language question
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryAnswerResponse {
    pub id: Uuid,
    pub question: String,

    /// SQL that produced the result
    pub sql: String,

    pub result: QueryResultResponse,

    /// Failed attempts before the answer, oldest first
    pub attempts: Vec<AttemptResponse>,

    /// Model that generated the SQL
    pub model: String,

    pub generated_at: DateTime<Utc>,
}

impl From<QueryAnswer> for QueryAnswerResponse {
    fn from(answer: QueryAnswer) -> Self {
        Self {
            id: answer.id,
            question: answer.question,
            sql: answer.sql,
            result: answer.result.into(),
            attempts: answer.attempts.into_iter().map(AttemptResponse::from).collect(),
            model: answer.model,
            generated_at: answer.generated_at,
        }
    }
}

/// Request payload for a free-form prompt
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000, message = "Prompt must be between 1 and 4000 characters"))]
    #[schema(example = "What is a normal resting heart rate?")]
    pub prompt: String,
}

/// Model reply to a free-form prompt
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub reply: String,
    pub model: String,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            reply: reply.reply,
            model: reply.model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_answer_conversion() {
        let answer = QueryAnswer {
            id: Uuid::new_v4(),
            question: "How many doctors?".to_string(),
            sql: "SELECT COUNT(*) FROM doctor".to_string(),
            result: QueryResult {
                columns: vec!["COUNT(*)".to_string()],
                rows: vec![vec![json!(3)]],
                row_count: 1,
                truncated: false,
            },
            attempts: vec![Attempt {
                sql: None,
                error: Some("No SQL statement found in the model response".to_string()),
            }],
            model: "test-model".to_string(),
            generated_at: Utc::now(),
        };

        let response = QueryAnswerResponse::from(answer);
        assert_eq!(response.result.rows, vec![vec![json!(3)]]);
        assert_eq!(response.attempts.len(), 1);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["attempts"][0].get("sql").is_none());
    }

    #[test]
    fn test_sql_request_validation() {
        let empty = SqlRequest {
            sql: String::new(),
            max_rows: None,
        };
        assert!(empty.validate().is_err());

        let limited = SqlRequest {
            sql: "SELECT 1".to_string(),
            max_rows: Some(1001),
        };
        assert!(limited.validate().is_err());
    }
}
