use serde::{Deserialize, Serialize};

/// Column types the fixed source-to-destination mapping understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Boolean,
    Integer,
    BigInt,
    Double,
    Text,
    TimestampTz,
    Json,
}

/// Schema of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable,
        }
    }
}

/// Schema of a table, as needed to create and fill the destination copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TableSchema {
    /// Table name. For schemas handed to the destination this is the
    /// destination table name.
    pub name: String,
    /// Columns in table column order.
    pub columns: Vec<ColumnSchema>,
    /// Primary key column name.
    pub primary_key: String,
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnSchema>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            primary_key: primary_key.into(),
        }
    }

    /// Returns the index of the named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Returns the index of the primary key column, if present.
    pub fn primary_key_index(&self) -> Option<usize> {
        self.column_index(&self.primary_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_lookup_by_name() {
        let schema = TableSchema::new(
            "orders",
            vec![
                ColumnSchema::new("id", ColumnType::BigInt, false),
                ColumnSchema::new("updated_at", ColumnType::TimestampTz, false),
            ],
            "id",
        );

        assert_eq!(schema.column_index("updated_at"), Some(1));
        assert_eq!(schema.primary_key_index(), Some(0));
        assert_eq!(schema.column_index("missing"), None);
    }
}
