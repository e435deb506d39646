//! Sandboxed execution of generated SQL.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors raised while executing a query
#[derive(Debug, Error)]
pub enum QueryError {
    /// SQLite rejected or failed the statement
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A row limit of zero would always return nothing
    #[error("Row limit must be at least 1")]
    ZeroRowLimit,
}

/// Rows returned by a query, as JSON values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    /// True when more rows were available than the limit allowed
    pub truncated: bool,
}

/// Execute a single statement on a `query_only` connection.
///
/// `PRAGMA query_only` is switched on before the statement runs and stays
/// on for the lifetime of the connection.
pub fn execute_read_only(
    conn: &Connection,
    sql: &str,
    max_rows: usize,
) -> Result<QueryResult, QueryError> {
    if max_rows == 0 {
        return Err(QueryError::ZeroRowLimit);
    }

    conn.execute_batch("PRAGMA query_only = ON;")?;

    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    let mut truncated = false;
    let mut cursor = stmt.query([])?;

    while let Some(row) = cursor.next()? {
        if rows.len() == max_rows {
            truncated = true;
            break;
        }

        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(to_json(row.get_ref(index)?));
        }
        rows.push(values);
    }

    debug!("Query returned {} rows (truncated={})", rows.len(), truncated);

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn admissions() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE admission (id INTEGER PRIMARY KEY, patient TEXT, cost REAL, notes TEXT, scan BLOB);
             INSERT INTO admission VALUES (1, 'Alice', 120.5, NULL, x'CAFE');
             INSERT INTO admission VALUES (2, 'Bob', 80.0, 'follow-up', NULL);
             INSERT INTO admission VALUES (3, 'Carol', 42.25, NULL, NULL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_value_conversion() {
        let conn = admissions();
        let result = execute_read_only(
            &conn,
            "SELECT id, patient, cost, notes, scan FROM admission WHERE id = 1",
            10,
        )
        .unwrap();

        assert_eq!(result.columns, vec!["id", "patient", "cost", "notes", "scan"]);
        assert_eq!(
            result.rows,
            vec![vec![json!(1), json!("Alice"), json!(120.5), Value::Null, json!("cafe")]]
        );
        assert!(!result.truncated);
    }

    #[test]
    fn test_row_limit_truncates() {
        let conn = admissions();
        let result = execute_read_only(&conn, "SELECT patient FROM admission ORDER BY id", 2).unwrap();

        assert_eq!(result.row_count, 2);
        assert!(result.truncated);
        assert_eq!(result.rows[1], vec![json!("Bob")]);
    }

    #[test]
    fn test_exact_limit_is_not_truncated() {
        let conn = admissions();
        let result = execute_read_only(&conn, "SELECT patient FROM admission", 3).unwrap();
        assert_eq!(result.row_count, 3);
        assert!(!result.truncated);
    }

    #[test]
    fn test_zero_limit() {
        let conn = admissions();
        let result = execute_read_only(&conn, "SELECT 1", 0);
        assert!(matches!(result, Err(QueryError::ZeroRowLimit)));
    }

    #[test]
    fn test_writes_are_refused() {
        let conn = admissions();
        let result = execute_read_only(&conn, "DELETE FROM admission", 10);
        assert!(matches!(result, Err(QueryError::Sqlite(_))));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM admission", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let conn = admissions();
        let result = execute_read_only(&conn, "SELECT diagnosis FROM admission", 10);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("no such column"), "unexpected: {}", message);
    }
}
