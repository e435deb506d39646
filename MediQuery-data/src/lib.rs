// MediQuery Data
// This crate handles every interaction with the SQLite hospital database

// Database connection management
pub mod database;

// Loading a MySQL hospital dump into SQLite
pub mod loader;

// Schema introspection used to ground LLM prompts
pub mod schema;

// Sandboxed read-only query execution
pub mod executor;

pub use database::{DatabaseConfig, DatabaseError, DatabasePool};
pub use executor::{QueryError, QueryResult};
pub use schema::DatabaseSchema;
