///
/// sysql error types.
///
/// Engine failures carry the primary SQLite result code together with its
/// symbolic name so callers can report a status without consulting SQLite.
/// Contention on the primary connection is never an error; it yields a
/// transient connection instead.
///

use std::path::PathBuf;
use thiserror::Error;

use sysql_std_sqlite3::{return_code_string, sqlite_error_code};

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("Failed to open engine handle: {reason}")]
    Open { reason: String },

    #[error("Query failed ({description}): {message}")]
    Query {
        code: i32,
        description: String,
        message: String,
    },

    #[error("Virtual table '{name}': {reason}")]
    Table { name: String, reason: String },

    #[error("Virtual table '{name}' is already registered")]
    DuplicateTable { name: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("A connection manager is already installed")]
    AlreadyInstalled,

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SqlError>;

impl SqlError {
    pub fn from_engine(e: rusqlite::Error) -> Self {
        let extended = sqlite_error_code(&e);
        let code = if extended < 0 { extended } else { extended & 0xff };
        SqlError::Query {
            code,
            description: return_code_string(code),
            message: e.to_string(),
        }
    }

    pub fn open(e: rusqlite::Error) -> Self {
        SqlError::Open {
            reason: e.to_string(),
        }
    }

    /// Primary SQLite result code of an engine failure.
    pub fn code(&self) -> Option<i32> {
        match self {
            SqlError::Query { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SqlError {
    fn from(e: rusqlite::Error) -> Self {
        SqlError::from_engine(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = SqlError::Open {
            reason: "out of memory".to_string(),
        };
        assert!(err.to_string().contains("Failed to open engine handle"));
        assert!(err.to_string().contains("out of memory"));

        let err = SqlError::DuplicateTable {
            name: "processes".to_string(),
        };
        assert!(err.to_string().contains("'processes'"));
        assert!(err.to_string().contains("already registered"));

        let err = SqlError::ConfigNotFound {
            path: PathBuf::from("/tmp/sysql.toml"),
        };
        assert!(err.to_string().contains("/tmp/sysql.toml"));

        let err = SqlError::Table {
            name: "users".to_string(),
            reason: "generator failed".to_string(),
        };
        assert_eq!(err.to_string(), "Virtual table 'users': generator failed");
    }

    #[test]
    fn test_from_engine_uses_primary_code() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let engine_err = conn.execute_batch("SELECT * FROM no_such_table").unwrap_err();
        let err = SqlError::from_engine(engine_err);

        assert_eq!(err.code(), Some(1));
        match &err {
            SqlError::Query {
                description,
                message,
                ..
            } => {
                assert_eq!(description, "SQLITE_ERROR");
                assert!(message.contains("no_such_table"));
            }
            other => panic!("expected query error, got {:?}", other),
        }
        assert!(err.to_string().contains("SQLITE_ERROR"));
    }

    #[test]
    fn test_from_non_engine_error() {
        let err: SqlError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.code(), Some(-1));
        assert!(err.to_string().contains("Error code: -1"));
    }
}
