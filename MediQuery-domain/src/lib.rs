// MediQuery Domain
// This crate turns natural-language questions into validated, read-only SQL

// Services that implement business logic
pub mod services;

// Domain entities
pub mod entities;

// Health checks and system status
pub mod health;

// Language model access
pub mod llm;

// Prompt construction for SQL generation
pub mod prompt;

// Extraction and validation of generated SQL
pub mod sql_guard;

// Re-export the database module from mediquery-data for convenience
pub use mediquery_data::database;

// Testing utilities - only available with mock feature
#[cfg(any(test, feature = "mock"))]
pub mod testing;
