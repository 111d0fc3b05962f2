///
/// Result column types.
///
/// Declared column types are mapped onto a small closed set; anything
/// unrecognized (or computed) starts as `Unknown` and may later be resolved
/// by the query planner.
///

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    Unknown,
    Text,
    Integer,
    BigInt,
    UnsignedBigInt,
    Double,
    Blob,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Unknown => "UNKNOWN",
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::UnsignedBigInt => "UNSIGNED BIGINT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Blob => "BLOB",
        }
    }

    /// Map a declared column type (as written in CREATE TABLE) to a ColumnType.
    pub fn from_decl(decl: &str) -> ColumnType {
        let decl = decl.trim().to_ascii_uppercase();
        match decl.as_str() {
            "TEXT" | "VARCHAR" | "CHAR" | "CLOB" | "STRING" => ColumnType::Text,
            "INTEGER" | "INT" => ColumnType::Integer,
            "BIGINT" => ColumnType::BigInt,
            "UNSIGNED BIGINT" => ColumnType::UnsignedBigInt,
            "DOUBLE" | "REAL" | "FLOAT" => ColumnType::Double,
            "BLOB" => ColumnType::Blob,
            _ => ColumnType::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != ColumnType::Unknown
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

pub type TableColumns = Vec<ColumnDef>;
