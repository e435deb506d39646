//! Database connection module for MediQuery
//!
//! The query side of the application only ever reads the hospital database.
//! Every pooled connection is opened with `SQLITE_OPEN_READ_ONLY` and has
//! `PRAGMA query_only` switched on, so generated SQL cannot modify data even
//! if it slips past validation.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use tracing::{debug, error, info};

use super::DatabaseError;
use crate::executor::{self, QueryError, QueryResult};
use crate::schema::{self, DatabaseSchema};

/// Global database pool used by the binaries
static DB_POOL: OnceCell<DatabasePool> = OnceCell::new();

/// Default location of the hospital database
pub const DEFAULT_SQLITE_PATH: &str = "hospital.db";

/// Pooled connection handed out by [`DatabasePool::connection`]
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub sqlite_path: PathBuf,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            max_connections: 5,
            timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sqlite_path = env::var("DB_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.sqlite_path);

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_connections);

        let timeout_seconds = env::var("DB_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.timeout_seconds);

        info!(
            "Database configuration: path={}, max_connections={}, timeout={}s",
            sqlite_path.display(),
            max_connections,
            timeout_seconds
        );

        Self {
            sqlite_path,
            max_connections,
            timeout_seconds,
        }
    }
}

/// Read-only connection pool over the hospital database
#[derive(Clone)]
pub struct DatabasePool {
    pool: Arc<r2d2::Pool<SqliteConnectionManager>>,
    path: PathBuf,
}

impl fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.pool.state();
        f.debug_struct("DatabasePool")
            .field("path", &self.path)
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .finish()
    }
}

impl DatabasePool {
    /// Open a read-only pool over an existing SQLite file
    pub fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let path = config.sqlite_path.clone();

        if !path.is_file() {
            error!("SQLite database not found at {}", path.display());
            return Err(DatabaseError::NotFound(path.display().to_string()));
        }

        info!("Opening read-only SQLite pool at: {}", path.display());

        let manager = SqliteConnectionManager::file(&path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI)
            .with_init(|conn| conn.execute_batch("PRAGMA query_only = ON;"));

        let pool = r2d2::Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_secs(config.timeout_seconds))
            .build(manager)?;

        // Test connection to make sure it works
        pool.get()?;
        info!("SQLite connection pool created successfully");

        Ok(Self {
            pool: Arc::new(pool),
            path,
        })
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check out a connection from the pool
    pub fn connection(&self) -> Result<PooledConnection, DatabaseError> {
        Ok(self.pool.get()?)
    }

    /// Number of user tables; reads only the catalog
    pub fn table_count(&self) -> Result<usize, DatabaseError> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    /// Introspect the schema of the hospital database
    pub fn schema(&self) -> Result<DatabaseSchema, DatabaseError> {
        let conn = self.connection()?;
        Ok(schema::introspect(&conn)?)
    }

    /// Run a single read-only query, returning at most `max_rows` rows
    pub fn run_query(&self, sql: &str, max_rows: usize) -> Result<QueryResult, QueryError> {
        debug!("Running read-only query: {}", sql);
        let conn = self.pool.get()?;
        executor::execute_read_only(&conn, sql, max_rows)
    }
}

/// Initialize the global database connection pool
pub fn initialize_database_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    if DB_POOL.get().is_some() {
        return Err(DatabaseError::PoolAlreadyInitialized);
    }

    let pool = DatabasePool::open(config)?;

    DB_POOL
        .set(pool.clone())
        .map_err(|_| DatabaseError::PoolAlreadyInitialized)?;

    Ok(pool)
}

/// Get the global database connection pool
pub fn get_db_pool() -> Result<DatabasePool, DatabaseError> {
    DB_POOL.get().cloned().ok_or(DatabaseError::PoolNotInitialized)
}

/// Get information about a database connection pool
pub fn get_connection_info(pool: &DatabasePool) -> String {
    match pool.connection() {
        Ok(conn) => {
            let location = conn
                .query_row("PRAGMA database_list", [], |row| row.get::<_, String>(2))
                .map(|path| {
                    if path.is_empty() {
                        "SQLite in-memory database".to_string()
                    } else {
                        format!("SQLite database at {}", path)
                    }
                })
                .unwrap_or_else(|_| "SQLite database (path unknown)".to_string());

            let state = pool.pool.state();
            format!(
                "{} (connections: active={}, idle={})",
                location, state.connections, state.idle_connections
            )
        }
        Err(e) => {
            error!("Failed to get SQLite connection: {}", e);
            format!("SQLite connection error: {}", e)
        }
    }
}
