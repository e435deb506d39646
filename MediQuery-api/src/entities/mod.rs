// Public API entities
// These types define the request and response bodies exposed over HTTP

pub mod common;
pub mod query;
pub mod schema;

pub use common::ErrorResponse;
pub use query::{
    AskQuestionRequest, AttemptResponse, ChatRequest, ChatResponse, QueryAnswerResponse,
    QueryResultResponse, SqlRequest,
};
pub use schema::{ColumnResponse, ForeignKeyResponse, SchemaResponse, TableResponse};
