use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mediquery_data::schema::{ColumnSchema, DatabaseSchema, ForeignKey, TableSchema};

/// Column of a hospital table
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ColumnResponse {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Foreign key from a column to another table
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ForeignKeyResponse {
    pub column: String,
    pub references_table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references_column: Option<String>,
}

/// A hospital table
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TableResponse {
    pub name: String,
    pub columns: Vec<ColumnResponse>,
    pub foreign_keys: Vec<ForeignKeyResponse>,
    pub row_count: u64,
}

/// Schema of the hospital database as shown to the model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SchemaResponse {
    pub tables: Vec<TableResponse>,

    /// Text form embedded in prompts
    pub prompt_context: String,
}

impl From<&ColumnSchema> for ColumnResponse {
    fn from(column: &ColumnSchema) -> Self {
        Self {
            name: column.name.clone(),
            data_type: column.data_type.clone(),
            not_null: column.not_null,
            primary_key: column.primary_key,
        }
    }
}

impl From<&ForeignKey> for ForeignKeyResponse {
    fn from(key: &ForeignKey) -> Self {
        Self {
            column: key.column.clone(),
            references_table: key.references_table.clone(),
            references_column: key.references_column.clone(),
        }
    }
}

impl From<&TableSchema> for TableResponse {
    fn from(table: &TableSchema) -> Self {
        Self {
            name: table.name.clone(),
            columns: table.columns.iter().map(ColumnResponse::from).collect(),
            foreign_keys: table.foreign_keys.iter().map(ForeignKeyResponse::from).collect(),
            row_count: table.row_count,
        }
    }
}

impl From<&DatabaseSchema> for SchemaResponse {
    fn from(schema: &DatabaseSchema) -> Self {
        Self {
            tables: schema.tables.iter().map(TableResponse::from).collect(),
            prompt_context: schema.to_prompt_context(),
        }
    }
}
