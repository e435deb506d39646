use thiserror::Error;

// Database modules
pub mod connection;

// Re-export database connection functions
pub use connection::*;

/// Database error enum
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// SQLite connection pool error
    #[error("SQLite connection pool error: {0}")]
    SqlitePoolError(#[from] r2d2::Error),

    /// Database file does not exist
    #[error("Database file not found: {0}")]
    NotFound(String),

    /// Database pool already initialized
    #[error("Database pool is already initialized")]
    PoolAlreadyInitialized,

    /// Database pool not initialized
    #[error("Database pool is not initialized")]
    PoolNotInitialized,
}
