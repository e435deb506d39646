use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::api::handlers::health::health_check,

        // Query endpoints
        crate::api::handlers::query::ask_question,
        crate::api::handlers::query::run_sql,
        crate::api::handlers::query::get_schema,

        // Chat endpoints
        crate::api::handlers::chat::chat
    ),
    components(
        schemas(
            crate::entities::common::ErrorResponse,
            crate::entities::query::AskQuestionRequest,
            crate::entities::query::SqlRequest,
            crate::entities::query::QueryResultResponse,
            crate::entities::query::AttemptResponse,
            crate::entities::query::QueryAnswerResponse,
            crate::entities::query::ChatRequest,
            crate::entities::query::ChatResponse,
            crate::entities::schema::ColumnResponse,
            crate::entities::schema::ForeignKeyResponse,
            crate::entities::schema::TableResponse,
            crate::entities::schema::SchemaResponse,
            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::health::ComponentHealthStatus
        )
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "query", description = "Natural-language and SQL queries over the hospital database"),
        (name = "chat", description = "Free-form prompts to the language model")
    ),
    info(
        title = "MediQuery API",
        version = "0.1.0",
        description = "Ask questions about a hospital database in plain language",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;
