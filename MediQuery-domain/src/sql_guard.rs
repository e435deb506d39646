//! Extraction and validation of model-generated SQL.
//!
//! Models wrap SQL in markdown fences, prefix it with prose or append a
//! second statement. [`extract_sql`] recovers the first statement, and
//! [`inspect`] parses it with the SQLite dialect and rejects anything that is
//! not a single read-only query.

use std::collections::HashSet;
use std::ops::ControlFlow;

use sqlparser::ast::{visit_relations, Query, SetExpr, Statement, Visit, Visitor};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use mediquery_data::DatabaseSchema;

/// Keywords that open a statement; text starting with one is taken verbatim
const STATEMENT_KEYWORDS: &[&str] = &[
    "select", "with", "values", "insert", "update", "delete", "replace", "drop", "create",
    "alter", "pragma", "attach", "detach", "explain", "vacuum",
];

/// Why generated SQL was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlGuardError {
    #[error("No SQL statement found in the model response")]
    NoSql,

    #[error("SQL statement is empty")]
    Empty,

    #[error("SQL syntax error: {0}")]
    Parse(String),

    #[error("Expected a single statement, found {0}")]
    MultipleStatements(usize),

    #[error("Only read-only SELECT queries are allowed, found {0}")]
    NotReadOnly(String),
}

/// Tables referenced by an accepted query, CTE names excluded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryShape {
    pub tables: Vec<String>,
}

impl QueryShape {
    /// Referenced tables the schema does not define. SQLite's own catalog
    /// tables and `pragma_*` functions are always allowed.
    pub fn unknown_tables(&self, schema: &DatabaseSchema) -> Vec<String> {
        self.tables
            .iter()
            .filter(|name| {
                let lower = name.to_ascii_lowercase();
                !lower.starts_with("sqlite_")
                    && !lower.starts_with("pragma_")
                    && schema.table(name).is_none()
            })
            .cloned()
            .collect()
    }
}

/// Pull the first SQL statement out of a model response
pub fn extract_sql(response: &str) -> Result<String, SqlGuardError> {
    let text = strip_code_fence(response);
    let text = strip_label(text);

    let text = if starts_with_statement_keyword(text) {
        text
    } else if let Some(i) = first_query_line(text) {
        &text[i..]
    } else {
        find_keyword(text, "select").map(|i| &text[i..]).unwrap_or(text)
    };

    let statement = first_statement(text).trim();
    if statement.is_empty() {
        Err(SqlGuardError::NoSql)
    } else {
        Ok(statement.to_string())
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text.trim();
    };

    let after = &text[open + 3..];
    let body = match after.find('\n') {
        Some(i) if after[..i].trim().chars().all(|c| c.is_ascii_alphanumeric()) => &after[i + 1..],
        _ => after,
    };

    let end = body.find("```").unwrap_or(body.len());
    body[..end].trim()
}

fn strip_label(text: &str) -> &str {
    match text.get(..4) {
        Some(label) if label.eq_ignore_ascii_case("sql:") => text[4..].trim_start(),
        _ => text,
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn starts_with_statement_keyword(text: &str) -> bool {
    let first = text
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    STATEMENT_KEYWORDS.contains(&first.as_str())
}

/// Byte offset of the first line opening a `SELECT` or a CTE
fn first_query_line(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        if opens_query(line.trim_start()) {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

fn opens_query(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|word| !word.is_empty())
        .take(3)
        .collect();

    match words.as_slice() {
        ["select", ..] => true,
        ["with", "recursive", ..] => true,
        ["with", _, "as"] => true,
        _ => false,
    }
}

/// Byte offset of the first whole-word, case-insensitive match of `keyword`
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    let bytes = lower.as_bytes();

    lower.match_indices(keyword).map(|(i, _)| i).find(|&i| {
        let before = i == 0 || !is_word_byte(bytes[i - 1]);
        let end = i + keyword.len();
        let after = end == bytes.len() || !is_word_byte(bytes[end]);
        before && after
    })
}

/// Text up to the first `;` that is not inside a quoted string or identifier
fn first_statement(text: &str) -> &str {
    let mut quote: Option<char> = None;

    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                ';' => return &text[..i],
                _ => {}
            },
        }
    }

    text
}

/// Parse `sql` and accept it only if it is a single read-only query
pub fn inspect(sql: &str) -> Result<QueryShape, SqlGuardError> {
    let statements = Parser::parse_sql(&SQLiteDialect {}, sql)
        .map_err(|e| SqlGuardError::Parse(e.to_string()))?;

    match statements.as_slice() {
        [] => return Err(SqlGuardError::Empty),
        [Statement::Query(_)] => {}
        [other] => return Err(SqlGuardError::NotReadOnly(statement_kind(other))),
        many => return Err(SqlGuardError::MultipleStatements(many.len())),
    }

    let mut check = ReadOnlyCheck::default();
    if let ControlFlow::Break(err) = statements[0].visit(&mut check) {
        return Err(err);
    }
    let cte_names = check.cte_names;

    let mut tables: Vec<String> = Vec::new();
    let _ = visit_relations(&statements[0], |relation| {
        if let Some(ident) = relation.0.last() {
            let name = &ident.value;
            let known = tables.iter().any(|table| table.eq_ignore_ascii_case(name));
            if !known && !cte_names.contains(&name.to_ascii_lowercase()) {
                tables.push(name.clone());
            }
        }
        ControlFlow::<()>::Continue(())
    });

    Ok(QueryShape { tables })
}

/// Accept only a single read-only query
pub fn validate_read_only(sql: &str) -> Result<(), SqlGuardError> {
    inspect(sql).map(|_| ())
}

/// Tables referenced by `sql` that `schema` does not define
pub fn unknown_tables(sql: &str, schema: &DatabaseSchema) -> Result<Vec<String>, SqlGuardError> {
    Ok(inspect(sql)?.unknown_tables(schema))
}

fn statement_kind(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("statement")
        .to_uppercase()
}

/// Visits every query node: CTEs, derived tables and expression subqueries
#[derive(Default)]
struct ReadOnlyCheck {
    cte_names: HashSet<String>,
}

impl Visitor for ReadOnlyCheck {
    type Break = SqlGuardError;

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.cte_names.insert(cte.alias.name.value.to_ascii_lowercase());
            }
        }

        match check_set_expr(&query.body) {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => ControlFlow::Break(err),
        }
    }
}

/// Nested `Query` nodes are reached by the visitor, so only set operations
/// are followed here
fn check_set_expr(expr: &SetExpr) -> Result<(), SqlGuardError> {
    match expr {
        SetExpr::Select(select) if select.into.is_some() => {
            Err(SqlGuardError::NotReadOnly("SELECT INTO".to_string()))
        }
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left)?;
            check_set_expr(right)
        }
        SetExpr::Insert(_) => Err(SqlGuardError::NotReadOnly("INSERT".to_string())),
        SetExpr::Update(_) => Err(SqlGuardError::NotReadOnly("UPDATE".to_string())),
        _ => Ok(()),
    }
}
