//! Builds the SQLite hospital database from a MySQL dump.
//!
//! The dump is rewritten with a fixed, ordered set of rules so that MySQL
//! column types and table options become valid SQLite, split into individual
//! statements and executed one by one. A failing statement does not stop the
//! load; it is recorded in the [`LoadReport`] together with a hint.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::database::DEFAULT_SQLITE_PATH;

/// Default MySQL dump consumed by the loader
pub const DEFAULT_SQL_FILE: &str = "hospital.sql";

/// Errors raised while building the database
#[derive(Debug, Error)]
pub enum LoaderError {
    /// SQL file does not exist
    #[error("SQL file not found: {0}")]
    FileNotFound(PathBuf),

    /// SQL path exists but is not a regular file
    #[error("Path is not a file: {0}")]
    NotAFile(PathBuf),

    /// SQL file has no content
    #[error("SQL file is empty: {0}")]
    EmptyFile(PathBuf),

    /// Script contains only whitespace
    #[error("Empty SQL script provided")]
    EmptyScript,

    /// Script has no executable statements after conversion
    #[error("No valid SQL commands found in the file")]
    NoCommands,

    /// A rewrite rule failed to compile
    #[error("Error in SQL conversion: {0}")]
    Conversion(#[from] regex::Error),

    /// Existing database could not be replaced
    #[error("Cannot delete existing database {path}. File may be in use: {source}")]
    CannotRemoveDatabase {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// SQLite error outside of individual statements
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Where to read the dump from and where to write the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// MySQL dump to load
    pub sql_file: PathBuf,
    /// SQLite file to (re)create
    pub database_path: PathBuf,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            sql_file: PathBuf::from(DEFAULT_SQL_FILE),
            database_path: PathBuf::from(DEFAULT_SQLITE_PATH),
        }
    }
}

/// A statement that SQLite refused
#[derive(Debug, Clone, Serialize)]
pub struct CommandFailure {
    /// 1-based position among the executed commands
    pub index: usize,
    pub command: String,
    pub error: String,
    pub hint: Option<&'static str>,
}

/// Outcome of [`create_database`]
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub database_path: PathBuf,
    pub total_commands: usize,
    pub successful_commands: usize,
    /// MySQL session statements (`SET ...`) dropped before execution
    pub skipped_commands: usize,
    pub failures: Vec<CommandFailure>,
    /// Unterminated text left at the end of the script
    pub trailing: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadReport {
    pub fn failed_commands(&self) -> usize {
        self.total_commands - self.successful_commands
    }

    /// True when every command was executed successfully
    pub fn is_complete(&self) -> bool {
        self.successful_commands == self.total_commands
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for failure in &self.failures {
            writeln!(
                f,
                "Error executing command {}/{}:",
                failure.index, self.total_commands
            )?;
            writeln!(f, "Command: {}", failure.command)?;
            writeln!(f, "Error: {}", failure.error)?;
            if let Some(hint) = failure.hint {
                writeln!(f, "Hint: {}", hint)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Database creation completed:")?;
        writeln!(f, "- Total commands: {}", self.total_commands)?;
        writeln!(f, "- Successful commands: {}", self.successful_commands)?;
        writeln!(f, "- Failed commands: {}", self.failed_commands())?;
        if self.skipped_commands > 0 {
            writeln!(f, "- Skipped MySQL session commands: {}", self.skipped_commands)?;
        }
        writeln!(f)?;

        if self.is_complete() {
            write!(f, "Database created successfully!")
        } else {
            write!(f, "Warning: Database created with some errors.")
        }
    }
}

/// Commands produced by [`split_sql_commands`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitScript {
    pub commands: Vec<String>,
    pub trailing: Option<String>,
}

struct RewriteRule {
    pattern: Regex,
    replacement: &'static str,
}

static REWRITE_RULES: OnceCell<Vec<RewriteRule>> = OnceCell::new();

/// Ordered MySQL-to-SQLite rewrites. Table options go before the bare
/// `AUTO_INCREMENT` keyword so `AUTO_INCREMENT=5` does not leave `=5` behind.
const RULES: &[(&str, &str)] = &[
    (r"(?i)\s*\bAUTO_INCREMENT\s*=\s*\d+", ""),
    (r"(?i)\bAUTO_INCREMENT\b", ""),
    (r"(?i)\b(?:tiny|small|medium|big)?int\s*\(\s*\d+\s*\)", "INTEGER"),
    (r"(?i)\b(?:var)?char\s*\(\s*\d+\s*\)", "TEXT"),
    (r"(?i)\bdecimal\b(?:\s*\(\s*\d+\s*(?:,\s*\d+\s*)?\))?", "REAL"),
    (r"(?i)\bdouble\b(?:\s+precision\b)?(?:\s*\(\s*\d+\s*(?:,\s*\d+\s*)?\))?", "REAL"),
    (r"(?im)^\s*CREATE\s+DATABASE\b[^;]*;", ""),
    (r"(?im)^\s*USE\s+[^;]*;", ""),
    (r"(?im)^\s*(?:UN)?LOCK\s+TABLES\b[^;]*;", ""),
    (r"(?im)^\s*(?:START\s+TRANSACTION|BEGIN(?:\s+TRANSACTION)?|COMMIT)\s*;", ""),
    (r"(?i)\bENGINE\s*=\s*\w+", ""),
    (r"(?i)\b(?:DEFAULT\s+)?(?:CHARSET|CHARACTER\s+SET)\s*=?\s*\w+", ""),
    (r"(?i)\bCOLLATE\s*=?\s*\w+", ""),
    (r#"(?i)\bUNIQUE\s+(?:KEY|INDEX)\s+[`"\w]+\s*\("#, "UNIQUE ("),
    (r#"(?i),\s*(?:FULLTEXT\s+|SPATIAL\s+)?(?:KEY|INDEX)\s+[`"\w]+\s*\([^)]*\)"#, ""),
];

fn rewrite_rules() -> Result<&'static [RewriteRule], LoaderError> {
    let rules = REWRITE_RULES.get_or_try_init(|| {
        RULES
            .iter()
            .map(|&(pattern, replacement)| {
                Ok::<_, regex::Error>(RewriteRule {
                    pattern: Regex::new(pattern)?,
                    replacement,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()
    })?;
    Ok(rules)
}

/// Validate that the SQL file exists and is readable
pub fn validate_sql_file(path: &Path) -> Result<(), LoaderError> {
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(LoaderError::NotAFile(path.to_path_buf()));
    }
    if fs::metadata(path)?.len() == 0 {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok(())
}

/// Convert MySQL syntax to SQLite compatible syntax
pub fn convert_mysql_to_sqlite(sql: &str) -> Result<String, LoaderError> {
    if sql.trim().is_empty() {
        return Err(LoaderError::EmptyScript);
    }

    let (mut converted, literals) = mask_literals(sql);
    for rule in rewrite_rules()? {
        converted = rule
            .pattern
            .replace_all(&converted, rule.replacement)
            .into_owned();
    }
    Ok(restore_literals(&converted, &literals))
}

/// Delimits a masked literal. Dumps escape NUL inside strings as `\0`, so the
/// raw character never occurs in the script itself.
const LITERAL_MARK: char = '\u{0}';

/// Swap every quoted string literal for a numbered placeholder so the rewrite
/// rules never touch stored values. Quotes inside comments are ignored.
fn mask_literals(sql: &str) -> (String, Vec<&str>) {
    let bytes = sql.as_bytes();
    let mut masked = String::with_capacity(sql.len());
    let mut literals = Vec::new();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                let end = literal_end(bytes, i);
                masked.push_str(&sql[copied..i]);
                masked.push(LITERAL_MARK);
                masked.push_str(&literals.len().to_string());
                masked.push(LITERAL_MARK);
                literals.push(&sql[i..end]);
                i = end;
                copied = end;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = line_end(bytes, i),
            b'#' => i = line_end(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..]
                    .find("*/")
                    .map(|offset| i + 2 + offset + 2)
                    .unwrap_or(bytes.len());
            }
            _ => i += 1,
        }
    }
    masked.push_str(&sql[copied..]);

    (masked, literals)
}

/// Index just past the quote closing the literal opened at `start`.
/// Handles both backslash escapes and doubled quotes.
fn literal_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut j = start + 1;
    while j < bytes.len() {
        if bytes[j] == b'\\' {
            j += 2;
        } else if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
            } else {
                return j + 1;
            }
        } else {
            j += 1;
        }
    }
    bytes.len()
}

fn line_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|offset| start + offset)
        .unwrap_or(bytes.len())
}

fn restore_literals(masked: &str, literals: &[&str]) -> String {
    let mut restored = String::with_capacity(masked.len());
    let mut parts = masked.split(LITERAL_MARK);

    if let Some(head) = parts.next() {
        restored.push_str(head);
    }
    while let Some(index) = parts.next() {
        match index.parse::<usize>().ok().and_then(|n| literals.get(n)) {
            Some(literal) => restored.push_str(literal),
            None => restored.push_str(index),
        }
        if let Some(rest) = parts.next() {
            restored.push_str(rest);
        }
    }

    restored
}

/// Split a script into individual commands, one per terminating `;`
pub fn split_sql_commands(script: &str) -> SplitScript {
    let mut commands = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    let normalized = script.replace("\r\n", "\n");

    for line in normalized.split('\n') {
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") {
            continue;
        }

        current.push(line);

        if line.ends_with(';') {
            let command = current.join(" ");
            if !command.trim_matches(|c| c == ';' || c == ' ').is_empty() {
                commands.push(command);
            }
            current.clear();
        }
    }

    let trailing = if current.is_empty() {
        None
    } else {
        let remaining = current.join(" ");
        warn!("Found incomplete SQL command: {}", remaining);
        Some(remaining)
    };

    SplitScript { commands, trailing }
}

/// MySQL session statements (`SET NAMES`, `SET time_zone`, ...) have no
/// SQLite meaning
fn is_session_statement(command: &str) -> bool {
    command
        .split_whitespace()
        .next()
        .map(|keyword| keyword.eq_ignore_ascii_case("SET"))
        .unwrap_or(false)
}

/// Map an SQLite error message to a remediation hint
pub fn hint_for_error(message: &str) -> Option<&'static str> {
    let message = message.to_lowercase();
    if message.contains("syntax error") {
        Some("This appears to be a syntax error. Check the SQL command format.")
    } else if message.contains("no such table") {
        Some("Referenced table doesn't exist. Check table creation order.")
    } else if message.contains("foreign key") {
        Some("Foreign key constraint failed. Check referenced table and key.")
    } else {
        None
    }
}

/// Create the SQLite database from the MySQL dump, replacing any existing file
pub fn create_database(config: &LoaderConfig) -> Result<LoadReport, LoaderError> {
    let started_at = Utc::now();
    let sql_path = config.sql_file.as_path();
    let db_path = config.database_path.as_path();

    validate_sql_file(sql_path)?;

    if db_path.exists() {
        info!("Removing existing database at {}", db_path.display());
        fs::remove_file(db_path).map_err(|source| LoaderError::CannotRemoveDatabase {
            path: db_path.to_path_buf(),
            source,
        })?;
    }

    let script = fs::read_to_string(sql_path)?;
    let script = convert_mysql_to_sqlite(&script)?;
    let split = split_sql_commands(&script);

    let (session, commands): (Vec<String>, Vec<String>) = split
        .commands
        .into_iter()
        .partition(|command| is_session_statement(command));

    if commands.is_empty() {
        return Err(LoaderError::NoCommands);
    }

    info!(
        "Loading {} commands from {} into {}",
        commands.len(),
        sql_path.display(),
        db_path.display()
    );

    let mut conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let total_commands = commands.len();
    let mut successful_commands = 0;
    let mut failures = Vec::new();

    let tx = conn.transaction()?;
    for (i, command) in commands.into_iter().enumerate() {
        let index = i + 1;
        match tx.execute_batch(&command) {
            Ok(()) => {
                debug!("Executed command {}/{}", index, total_commands);
                successful_commands += 1;
            }
            Err(e) => {
                let error = e.to_string();
                warn!("Error executing command {}/{}: {}", index, total_commands, error);
                failures.push(CommandFailure {
                    index,
                    hint: hint_for_error(&error),
                    command,
                    error,
                });
            }
        }
    }
    tx.commit()?;

    let report = LoadReport {
        database_path: db_path.to_path_buf(),
        total_commands,
        successful_commands,
        skipped_commands: session.len(),
        failures,
        trailing: split.trailing,
        started_at,
        finished_at: Utc::now(),
    };

    if report.is_complete() {
        info!("Database created successfully at {}", db_path.display());
    } else {
        warn!(
            "Database created with {} failed commands",
            report.failed_commands()
        );
    }

    Ok(report)
}
