use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::entities::query::{AskRequest, Attempt, QueryAnswer};
use crate::llm::{LlmClient, LlmError};
use crate::prompt::{build_correction_messages, build_sql_messages};
use crate::sql_guard::{self, SqlGuardError};
use mediquery_data::{DatabaseError, DatabasePool, DatabaseSchema, QueryError, QueryResult};

/// Largest row limit a caller may request
pub const MAX_ROW_LIMIT: usize = 1000;

/// Query service errors
#[derive(Debug, Error)]
pub enum QueryServiceError {
    /// Invalid request
    #[error("Validation error: {0}")]
    Validation(String),

    /// The model could not be reached or returned nothing usable
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// SQLite failed the statement
    #[error("Query execution failed: {0}")]
    Execution(String),

    /// The statement is not a single read-only query
    #[error("SQL rejected: {0}")]
    Rejected(#[from] SqlGuardError),

    /// The statement references tables that do not exist
    #[error("Unknown table(s): {}. Available tables: {}", .tables.join(", "), .available.join(", "))]
    UnknownTables {
        tables: Vec<String>,
        available: Vec<String>,
    },

    /// The database itself is unavailable
    #[error("Database error: {0}")]
    Database(String),

    /// Every attempt of the correction loop failed
    #[error("Could not produce a working query after {} attempt(s)", .attempts.len())]
    Unanswerable { attempts: Vec<Attempt> },
}

impl From<QueryError> for QueryServiceError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Pool(e) => QueryServiceError::Database(e.to_string()),
            QueryError::ZeroRowLimit => {
                QueryServiceError::Validation("max_rows must be at least 1".to_string())
            }
            QueryError::Sqlite(e) => QueryServiceError::Execution(e.to_string()),
        }
    }
}

impl From<DatabaseError> for QueryServiceError {
    fn from(err: DatabaseError) -> Self {
        QueryServiceError::Database(err.to_string())
    }
}

/// Limits of the correction loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryServiceConfig {
    /// LLM round trips per question, at least 1
    pub max_attempts: usize,
    /// Row limit when the request does not set one
    pub max_rows: usize,
}

impl Default for QueryServiceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_rows: 100,
        }
    }
}

impl QueryServiceConfig {
    /// Read `QUERY_MAX_ATTEMPTS` and `QUERY_MAX_ROWS`, falling back to the defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_attempts = env::var("QUERY_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_attempts)
            .max(1);

        let max_rows = env::var("QUERY_MAX_ROWS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_rows)
            .clamp(1, MAX_ROW_LIMIT);

        Self {
            max_attempts,
            max_rows,
        }
    }
}

/// Flatten validator errors into one message
pub fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect::<Vec<String>>()
        .join("; ")
}

/// Trait for answering questions against the hospital database
#[async_trait]
pub trait QueryServiceTrait: Send + Sync {
    /// Translate a question to SQL, correcting failed attempts, and run it
    async fn ask(&self, request: AskRequest) -> Result<QueryAnswer, QueryServiceError>;

    /// Validate and run caller-supplied SQL
    async fn run_sql(
        &self,
        sql: &str,
        max_rows: Option<usize>,
    ) -> Result<QueryResult, QueryServiceError>;

    /// Schema the prompts are grounded on
    fn schema(&self) -> &DatabaseSchema;

    /// Model used for SQL generation
    fn model(&self) -> String;
}

/// NL→SQL service over a read-only pool
pub struct QueryService<L: LlmClient> {
    pool: DatabasePool,
    llm: Arc<L>,
    schema: DatabaseSchema,
    schema_context: String,
    config: QueryServiceConfig,
}

impl<L: LlmClient> QueryService<L> {
    /// Create a service, introspecting the schema once up front
    pub fn new(
        pool: DatabasePool,
        llm: Arc<L>,
        config: QueryServiceConfig,
    ) -> Result<Self, QueryServiceError> {
        let schema = pool.schema()?;
        if schema.is_empty() {
            warn!("Database at {} has no tables", pool.path().display());
        }
        info!("Loaded schema with {} tables", schema.tables.len());

        let schema_context = schema.to_prompt_context();
        Ok(Self {
            pool,
            llm,
            schema,
            schema_context,
            config,
        })
    }

    fn resolve_row_limit(&self, max_rows: Option<usize>) -> Result<usize, QueryServiceError> {
        match max_rows {
            None => Ok(self.config.max_rows),
            Some(rows) if (1..=MAX_ROW_LIMIT).contains(&rows) => Ok(rows),
            Some(_) => Err(QueryServiceError::Validation(format!(
                "max_rows must be between 1 and {}",
                MAX_ROW_LIMIT
            ))),
        }
    }

    /// Run a query on the blocking pool so SQLite never stalls the runtime
    async fn execute(&self, sql: &str, max_rows: usize) -> Result<QueryResult, QueryServiceError> {
        let pool = self.pool.clone();
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || pool.run_query(&sql, max_rows))
            .await
            .map_err(|e| QueryServiceError::Database(e.to_string()))?
            .map_err(QueryServiceError::from)
    }

    /// Guard, ground and run one candidate statement
    async fn check_and_run(&self, sql: &str, max_rows: usize) -> Result<QueryResult, QueryServiceError> {
        let shape = sql_guard::inspect(sql)?;

        let unknown = shape.unknown_tables(&self.schema);
        if !unknown.is_empty() {
            return Err(QueryServiceError::UnknownTables {
                tables: unknown,
                available: self.schema.table_names().into_iter().map(String::from).collect(),
            });
        }

        self.execute(sql, max_rows).await
    }
}

#[async_trait]
impl<L: LlmClient + 'static> QueryServiceTrait for QueryService<L> {
    #[instrument(skip(self, request), fields(model = %self.llm.model()))]
    async fn ask(&self, request: AskRequest) -> Result<QueryAnswer, QueryServiceError> {
        if let Err(errors) = request.validate() {
            return Err(QueryServiceError::Validation(validation_message(&errors)));
        }

        let question = request.question.trim().to_string();
        if question.is_empty() {
            return Err(QueryServiceError::Validation(
                "question: Question must not be blank".to_string(),
            ));
        }
        let max_rows = self.resolve_row_limit(request.max_rows)?;

        let mut attempts: Vec<Attempt> = Vec::new();
        // Previous SQL (or raw reply) and the error it produced
        let mut feedback: Option<(String, String)> = None;

        for attempt in 1..=self.config.max_attempts {
            let messages = match &feedback {
                None => build_sql_messages(&self.schema_context, &question),
                Some((failed, error)) => {
                    build_correction_messages(&self.schema_context, &question, failed, error)
                }
            };

            debug!(attempt, "Requesting SQL from the model");
            let reply = self.llm.complete(&messages).await?;

            let (sql, error) = match sql_guard::extract_sql(&reply) {
                Err(e) => (None, QueryServiceError::from(e)),
                Ok(sql) => match self.check_and_run(&sql, max_rows).await {
                    Ok(result) => {
                        info!(attempt, rows = result.row_count, "Question answered");
                        return Ok(QueryAnswer {
                            id: Uuid::new_v4(),
                            question,
                            sql,
                            result,
                            attempts,
                            model: self.llm.model(),
                            generated_at: Utc::now(),
                        });
                    }
                    Err(e @ QueryServiceError::Database(_)) => return Err(e),
                    Err(e) => (Some(sql), e),
                },
            };

            let error = error.to_string();
            warn!(attempt, error = %error, "Generated SQL was not usable");
            feedback = Some((sql.clone().unwrap_or_else(|| reply.clone()), error.clone()));
            attempts.push(Attempt {
                sql,
                error: Some(error),
            });
        }

        Err(QueryServiceError::Unanswerable { attempts })
    }

    #[instrument(skip(self, sql))]
    async fn run_sql(
        &self,
        sql: &str,
        max_rows: Option<usize>,
    ) -> Result<QueryResult, QueryServiceError> {
        let max_rows = self.resolve_row_limit(max_rows)?;
        let sql = sql.trim().trim_end_matches(';').trim();
        sql_guard::validate_read_only(sql)?;
        self.execute(sql, max_rows).await
    }

    fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    fn model(&self) -> String {
        self.llm.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatRole, MockLlmClient};
    use crate::testing::{create_fixture_database, ScriptedLlmClient};
    use mediquery_data::DatabaseConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn fixture_pool(dir: &TempDir) -> DatabasePool {
        let path = dir.path().join("hospital.db");
        let report = create_fixture_database(&path).unwrap();
        assert!(report.is_complete(), "failures: {:?}", report.failures);

        DatabasePool::open(&DatabaseConfig {
            sqlite_path: path,
            ..DatabaseConfig::default()
        })
        .unwrap()
    }

    fn scripted_service(
        dir: &TempDir,
        replies: &[&str],
    ) -> (QueryService<ScriptedLlmClient>, Arc<ScriptedLlmClient>) {
        let llm = Arc::new(ScriptedLlmClient::new(replies.iter().copied()));
        let service =
            QueryService::new(fixture_pool(dir), llm.clone(), QueryServiceConfig::default())
                .unwrap();
        (service, llm)
    }

    #[tokio::test]
    async fn test_ask_first_attempt() {
        let dir = TempDir::new().unwrap();
        let (service, llm) =
            scripted_service(&dir, &["```sql\nSELECT COUNT(*) AS total FROM patient;\n```"]);

        let answer = service
            .ask(AskRequest::new("How many patients are there?"))
            .await
            .unwrap();

        assert_eq!(answer.sql, "SELECT COUNT(*) AS total FROM patient");
        assert_eq!(answer.result.columns, vec!["total".to_string()]);
        assert_eq!(answer.result.rows, vec![vec![json!(4)]]);
        assert!(answer.attempts.is_empty());
        assert_eq!(answer.model, "scripted-model");

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0][1].content.contains("patient(patient_id INTEGER"));
    }

    #[tokio::test]
    async fn test_ask_corrects_failed_queries() {
        let dir = TempDir::new().unwrap();
        let (service, llm) = scripted_service(
            &dir,
            &[
                "SELECT COUNT(*) FROM patients",
                "SELECT nme FROM doctor",
                "SELECT name FROM doctor ORDER BY name",
            ],
        );

        let answer = service
            .ask(AskRequest::new("List the doctors"))
            .await
            .unwrap();

        assert_eq!(answer.result.row_count, 3);
        assert_eq!(answer.attempts.len(), 2);
        assert_eq!(answer.attempts[0].sql.as_deref(), Some("SELECT COUNT(*) FROM patients"));
        assert!(answer.attempts[0]
            .error
            .as_deref()
            .unwrap()
            .contains("Unknown table(s): patients"));
        assert!(answer.attempts[1].error.as_deref().unwrap().contains("nme"));

        // The second request carries the failed SQL and its error back to the model
        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].len(), 4);
        assert_eq!(requests[1][2].role, ChatRole::Assistant);
        assert_eq!(requests[1][2].content, "SELECT COUNT(*) FROM patients");
        assert!(requests[1][3].content.contains("Available tables: department, doctor, patient"));
    }

    #[tokio::test]
    async fn test_ask_rejects_writes_and_retries() {
        let dir = TempDir::new().unwrap();
        let (service, _llm) = scripted_service(
            &dir,
            &["DELETE FROM patient", "SELECT name FROM patient WHERE patient_id = 10"],
        );

        let answer = service
            .ask(AskRequest::new("Forget Alice"))
            .await
            .unwrap();

        assert_eq!(answer.result.rows, vec![vec![json!("Alice")]]);
        assert!(answer.attempts[0]
            .error
            .as_deref()
            .unwrap()
            .contains("Only read-only SELECT queries are allowed"));
    }

    #[tokio::test]
    async fn test_ask_unanswerable_after_max_attempts() {
        let dir = TempDir::new().unwrap();
        let (service, llm) = scripted_service(
            &dir,
            &["I am not sure.", "SELECT * FROM ward", "DROP TABLE patient", "unused"],
        );

        let err = service
            .ask(AskRequest::new("Which ward is busiest?"))
            .await
            .unwrap_err();

        match err {
            QueryServiceError::Unanswerable { attempts } => {
                assert_eq!(attempts.len(), 3);
                assert_eq!(attempts[1].sql.as_deref(), Some("SELECT * FROM ward"));
            }
            other => panic!("expected Unanswerable, got {:?}", other),
        }
        assert_eq!(llm.remaining(), 1);
    }

    #[tokio::test]
    async fn test_ask_aborts_on_llm_error() {
        let dir = TempDir::new().unwrap();
        let mut mock = MockLlmClient::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Err(LlmError::Status { status: 503, body: "loading".to_string() }));
        mock.expect_model().return_const("mock-model".to_string());

        let service =
            QueryService::new(fixture_pool(&dir), Arc::new(mock), QueryServiceConfig::default())
                .unwrap();

        let err = service
            .ask(AskRequest::new("How many doctors?"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryServiceError::Llm(LlmError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_ask_validates_request() {
        let dir = TempDir::new().unwrap();
        let mut mock = MockLlmClient::new();
        mock.expect_complete().never();
        mock.expect_model().return_const("mock-model".to_string());

        let service =
            QueryService::new(fixture_pool(&dir), Arc::new(mock), QueryServiceConfig::default())
                .unwrap();

        let empty = service.ask(AskRequest::new("")).await;
        assert!(matches!(empty, Err(QueryServiceError::Validation(_))));

        let blank = service.ask(AskRequest::new("   ")).await;
        assert!(matches!(blank, Err(QueryServiceError::Validation(_))));

        let too_many = service
            .ask(AskRequest {
                max_rows: Some(5000),
                ..AskRequest::new("List patients")
            })
            .await;
        assert!(matches!(too_many, Err(QueryServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_run_sql() {
        let dir = TempDir::new().unwrap();
        let (service, llm) = scripted_service(&dir, &[]);

        let result = service
            .run_sql("SELECT name FROM patient ORDER BY patient_id;", Some(2))
            .await
            .unwrap();
        assert_eq!(result.rows, vec![vec![json!("Alice")], vec![json!("Bob")]]);
        assert!(result.truncated);

        let rejected = service.run_sql("UPDATE patient SET name = 'x'", None).await;
        assert!(matches!(
            rejected,
            Err(QueryServiceError::Rejected(SqlGuardError::NotReadOnly(_)))
        ));

        let failed = service.run_sql("SELECT * FROM ward", None).await;
        assert!(matches!(failed, Err(QueryServiceError::Execution(_))));

        assert!(llm.requests().is_empty());
    }

    #[test]
    fn test_schema_and_model() {
        let dir = TempDir::new().unwrap();
        let (service, _llm) = scripted_service(&dir, &[]);
        assert_eq!(service.schema().table_names(), vec!["department", "doctor", "patient"]);
        assert_eq!(QueryServiceTrait::model(&service), "scripted-model");
    }

    #[test]
    fn test_config_defaults() {
        let config = QueryServiceConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_rows, 100);
    }
}
