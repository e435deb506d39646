use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use mediquery_data::QueryResult;

/// A natural-language question about the hospital database
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AskRequest {
    /// The question to answer
    #[validate(length(min = 1, max = 2000, message = "Question must be between 1 and 2000 characters"))]
    pub question: String,

    /// Maximum rows to return. Defaults to the service limit.
    #[validate(range(min = 1, max = 1000, message = "max_rows must be between 1 and 1000"))]
    pub max_rows: Option<usize>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            max_rows: None,
        }
    }
}

/// One round of the correction loop that did not produce an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// SQL extracted from the model reply, if any
    pub sql: Option<String>,
    /// Why the attempt was rejected or failed
    pub error: Option<String>,
}

/// An answered question
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub id: Uuid,
    pub question: String,
    /// The SQL that produced `result`
    pub sql: String,
    pub result: QueryResult,
    /// Failed attempts that preceded the successful one
    pub attempts: Vec<Attempt>,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

/// Reply to a free-form chat prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub model: String,
}
