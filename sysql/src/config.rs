///
/// Connection manager configuration.
///
/// ```toml
/// disabled_tables = "kernel_info, yara"
/// soft_heap_limit = 5242880
/// ```
///
/// Both keys are optional. The disabled-table list is a comma-delimited
/// string; whitespace around names and empty entries are ignored.
///

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SqlError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub disabled_tables: String,
    pub soft_heap_limit: i64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            disabled_tables: String::new(),
            soft_heap_limit: sysql_std_sqlite3::SOFT_HEAP_LIMIT,
        }
    }
}

impl ManagerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ManagerConfig = toml::from_str(content)?;
        if config.soft_heap_limit < 0 {
            return Err(SqlError::Config(format!(
                "soft_heap_limit must be non-negative, got {}",
                config.soft_heap_limit
            )));
        }
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SqlError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn with_disabled_tables(mut self, disabled: impl Into<String>) -> Self {
        self.disabled_tables = disabled.into();
        self
    }

    pub fn disabled_set(&self) -> HashSet<String> {
        parse_disabled_tables(&self.disabled_tables)
    }
}

pub fn parse_disabled_tables(list: &str) -> HashSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

/// `<config dir>/sysql/sysql.toml`, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sysql").join("sysql.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_disabled_tables_ignores_whitespace_and_empties() {
        let a = parse_disabled_tables("foo,bar");
        let b = parse_disabled_tables(" bar , foo ,,");
        assert_eq!(a, b);
        assert!(a.contains("foo"));
        assert!(a.contains("bar"));
        assert_eq!(a.len(), 2);

        assert!(parse_disabled_tables("").is_empty());
        assert!(parse_disabled_tables(" , ,").is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ManagerConfig::default());
        assert_eq!(config.soft_heap_limit, 5 * 1024 * 1024);
        assert!(config.disabled_set().is_empty());
    }

    #[test]
    fn test_from_toml_str() {
        let config = ManagerConfig::from_toml_str(
            r#"
disabled_tables = "a, b"
soft_heap_limit = 1024
"#,
        )
        .unwrap();
        assert_eq!(config.soft_heap_limit, 1024);
        assert_eq!(config.disabled_set().len(), 2);
    }

    #[test]
    fn test_rejects_negative_limit() {
        let err = ManagerConfig::from_toml_str("soft_heap_limit = -1").unwrap_err();
        assert!(matches!(err, SqlError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = ManagerConfig::from_toml_str("disabled_tables = [").unwrap_err();
        assert!(matches!(err, SqlError::Toml(_)));
    }

    #[test]
    fn test_from_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sysql.toml");
        std::fs::write(&path, "disabled_tables = \"yara\"\n").unwrap();

        let config = ManagerConfig::from_path(&path).unwrap();
        assert!(config.disabled_set().contains("yara"));

        let missing = temp.path().join("missing.toml");
        let err = ManagerConfig::from_path(&missing).unwrap_err();
        assert!(matches!(err, SqlError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_default_config_path_suffix() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("sysql/sysql.toml"));
        }
    }
}
