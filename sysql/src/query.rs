///
/// Query execution.
///
/// - `query_internal` / `query_internal_text`: run one statement on an
///   instance, collecting typed or text rows
/// - `get_query_columns_internal`: result column names and types, using
///   declared types first and the planner only for what remains unknown
/// - `SqlInternal`: run a query through a manager and classify it as
///   event-based when any table it touched declares `EVENT_BASED`
///

use sysql_std_sqlite3::{QueryData, QueryDataTyped, materialize};

use crate::attributes::TableAttributes;
use crate::columns::{ColumnDef, ColumnType, TableColumns};
use crate::errors::{Result, SqlError};
use crate::instance::DbInstance;
use crate::manager::DbManager;
use crate::planner::QueryPlanner;

pub fn query_internal(query: &str, instance: &DbInstance) -> Result<QueryDataTyped> {
    let rows = materialize(instance.db(), query).map_err(SqlError::from_engine)?;
    Ok(rows.into_typed())
}

pub fn query_internal_text(query: &str, instance: &DbInstance) -> Result<QueryData> {
    let rows = materialize(instance.db(), query).map_err(SqlError::from_engine)?;
    Ok(rows.to_text())
}

pub fn get_query_columns_internal(query: &str, instance: &DbInstance) -> Result<TableColumns> {
    let mut columns = {
        let stmt = instance.db().prepare(query).map_err(SqlError::from_engine)?;
        let declared: TableColumns = stmt
            .columns()
            .iter()
            .map(|c| {
                let column_type = c
                    .decl_type()
                    .map(ColumnType::from_decl)
                    .unwrap_or(ColumnType::Unknown);
                ColumnDef::new(c.name(), column_type)
            })
            .collect();
        declared
    };

    if columns.iter().any(|c| !c.column_type.is_known()) {
        let planner = QueryPlanner::new(query, instance)?;
        planner.apply_types(&mut columns);
    }
    Ok(columns)
}

#[derive(Debug)]
pub struct SqlInternal {
    rows: QueryDataTyped,
    tables: Vec<String>,
    event_based: bool,
}

impl SqlInternal {
    /// Run `query` through the process-wide manager.
    pub fn new(query: &str, use_cache: bool) -> Result<Self> {
        Self::run(DbManager::global(), query, use_cache)
    }

    pub fn run(manager: &DbManager, query: &str, use_cache: bool) -> Result<Self> {
        let instance = manager.get()?;
        instance.set_use_cache(use_cache);

        let result = query_internal(query, &instance);
        let tables = instance.affected_tables();
        let event_based = TableAttributes::aggregate(
            tables
                .iter()
                .filter_map(|name| manager.registry().attributes(name)),
        )
        .is_event_based();
        instance.clear_affected_tables();

        Ok(Self {
            rows: result?,
            tables,
            event_based,
        })
    }

    pub fn rows(&self) -> &QueryDataTyped {
        &self.rows
    }

    pub fn rows_text(&self) -> QueryData {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(k, v)| (k.clone(), sysql_std_sqlite3::value_to_text(v)))
                    .collect()
            })
            .collect()
    }

    pub fn into_rows(self) -> QueryDataTyped {
        self.rows
    }

    /// Tables the query touched.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn event_based(&self) -> bool {
        self.event_based
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::registry::TableRegistry;
    use crate::registry::test_tables::simple_table;
    use rusqlite::types::Value as SqlValue;
    use std::sync::Arc;

    fn manager() -> DbManager {
        let registry = Arc::new(TableRegistry::new());
        registry.register(simple_table("plain", 2)).unwrap();
        registry
            .register(simple_table("events", 1).with_attributes(TableAttributes::EVENT_BASED))
            .unwrap();
        DbManager::new(ManagerConfig::default(), registry)
    }

    #[test]
    fn test_query_internal() {
        let manager = manager();
        let instance = manager.get().unwrap();
        let rows = query_internal("SELECT id, label FROM plain ORDER BY id", &instance).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], SqlValue::Integer(1));

        let text = query_internal_text("SELECT id FROM plain WHERE id = 2", &instance).unwrap();
        assert_eq!(text[0]["id"], "2");
    }

    #[test]
    fn test_query_error_carries_code() {
        let manager = manager();
        let instance = manager.get().unwrap();
        let err = query_internal("SELECT * FROM nope", &instance).unwrap_err();
        assert_eq!(err.code(), Some(1));
    }

    #[test]
    fn test_columns_from_declared_types() {
        let manager = manager();
        let instance = manager.get().unwrap();
        let columns = get_query_columns_internal("SELECT id, label FROM plain", &instance).unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnDef::new("id", ColumnType::BigInt),
                ColumnDef::new("label", ColumnType::Text),
            ]
        );
    }

    #[test]
    fn test_columns_use_planner_for_expressions() {
        let manager = manager();
        let instance = manager.get().unwrap();
        let columns =
            get_query_columns_internal("SELECT label, 'x' || label AS tagged FROM plain", &instance)
                .unwrap();
        assert_eq!(columns[0].column_type, ColumnType::Text);
        assert_eq!(columns[1].name, "tagged");
        assert_eq!(columns[1].column_type, ColumnType::Text);
    }

    #[test]
    fn test_event_based_classification() {
        let manager = manager();

        let plain = SqlInternal::run(&manager, "SELECT * FROM plain", false).unwrap();
        assert!(!plain.event_based());
        assert_eq!(plain.rows().len(), 2);
        assert_eq!(plain.tables(), &["plain".to_string()]);

        let joined =
            SqlInternal::run(&manager, "SELECT * FROM plain, events", true).unwrap();
        assert!(joined.event_based());
        assert_eq!(joined.rows().len(), 2);

        let text = joined.rows_text();
        assert_eq!(text[0]["label"], "row1");
        assert_eq!(joined.into_rows().len(), 2);
    }

    #[test]
    fn test_run_clears_state() {
        let manager = manager();
        SqlInternal::run(&manager, "SELECT * FROM plain WHERE id = 1", true).unwrap();
        let table = manager.registry().get("plain").unwrap();
        assert!(!table.has_query_state());

        let instance = manager.get().unwrap();
        assert!(instance.affected_tables().is_empty());
        assert!(!instance.use_cache());
    }

    #[test]
    fn test_run_propagates_errors() {
        let manager = manager();
        let err = SqlInternal::run(&manager, "SELEC nonsense", false).unwrap_err();
        assert!(matches!(err, SqlError::Query { .. }));
    }
}
