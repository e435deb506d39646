//! Schema representation of the hospital database.
//!
//! The schema is read straight from SQLite (`sqlite_master` and the
//! `pragma_table_info` / `pragma_foreign_key_list` table-valued functions)
//! and rendered into a compact text form that is embedded in LLM prompts.

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

/// A column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Declared type, empty when the column has none
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// A foreign key from one column to another table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    /// `None` when the key points at the referenced table's primary key
    pub references_column: Option<String>,
}

/// A user table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub foreign_keys: Vec<ForeignKey>,
    pub row_count: u64,
}

impl TableSchema {
    /// Look up a column by name, ignoring case
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }
}

/// All user tables of a database, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseSchema {
    pub tables: Vec<TableSchema>,
}

impl DatabaseSchema {
    /// Look up a table by name, ignoring case
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|table| table.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Render the schema for inclusion in a prompt.
    ///
    /// One line per table, e.g. `patient(patient_id INTEGER PRIMARY KEY, name TEXT NOT NULL)`,
    /// followed by one `-- a.x references b.y` line per foreign key.
    pub fn to_prompt_context(&self) -> String {
        let mut lines = Vec::new();

        for table in &self.tables {
            let columns = table
                .columns
                .iter()
                .map(|column| {
                    let mut definition = column.name.clone();
                    if !column.data_type.is_empty() {
                        definition.push(' ');
                        definition.push_str(&column.data_type);
                    }
                    if column.primary_key {
                        definition.push_str(" PRIMARY KEY");
                    }
                    if column.not_null {
                        definition.push_str(" NOT NULL");
                    }
                    definition
                })
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("{}({})", table.name, columns));

            for key in &table.foreign_keys {
                let target = match &key.references_column {
                    Some(column) => format!("{}.{}", key.references_table, column),
                    None => key.references_table.clone(),
                };
                lines.push(format!(
                    "-- {}.{} references {}",
                    table.name, key.column, target
                ));
            }
        }

        lines.join("\n")
    }
}

/// Quote an identifier for interpolation into SQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Read the schema of every user table
pub fn introspect(conn: &Connection) -> Result<DatabaseSchema, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        tables.push(introspect_table(conn, name)?);
    }

    debug!("Introspected {} tables", tables.len());
    Ok(DatabaseSchema { tables })
}

fn introspect_table(conn: &Connection, name: String) -> Result<TableSchema, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map([&name], |row| {
            Ok(ColumnSchema {
                name: row.get(0)?,
                data_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                not_null: row.get::<_, i64>(2)? != 0,
                primary_key: row.get::<_, i64>(3)? > 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
    )?;
    let foreign_keys = stmt
        .query_map([&name], |row| {
            Ok(ForeignKey {
                column: row.get(0)?,
                references_table: row.get(1)?,
                references_column: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let row_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_identifier(&name)),
        [],
        |row| row.get(0),
    )?;

    Ok(TableSchema {
        name,
        columns,
        foreign_keys,
        row_count: row_count.max(0) as u64,
    })
}
