///
/// # Query Planner
///
/// Infers result column types for queries whose columns carry no declared
/// type (expressions, aggregates, literals) by reading the engine's own
/// introspection output:
///
/// - `EXPLAIN QUERY PLAN <q>` yields the tables the query scans
/// - `EXPLAIN <q>` yields the compiled program, one row per opcode
///
/// `apply_types()` walks the program once. Catalog opcodes type their
/// target register, copy opcodes propagate a known type from P1 to P2, and
/// `ResultRow` marks the register window holding the output columns. This
/// is a heuristic without control-flow analysis; columns it cannot resolve
/// stay `UNKNOWN`.
///

use std::collections::HashMap;

use sysql_std_sqlite3::QueryData;
use tracing::trace;

use crate::columns::{ColumnType, TableColumns};
use crate::errors::Result;
use crate::instance::DbInstance;
use crate::opcodes::{self, Register};
use crate::query::query_internal_text;

pub struct QueryPlanner {
    program: QueryData,
    tables: Vec<String>,
}

fn register_field(row: &sysql_std_sqlite3::Row, register: Register) -> Option<i64> {
    let field = row.get(register.column_name())?;
    match field.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            trace!(
                register = register.column_name(),
                field = field.as_str(),
                "skipping unparseable register"
            );
            None
        }
    }
}

impl QueryPlanner {
    pub fn new(query: &str, instance: &DbInstance) -> Result<Self> {
        let plan = query_internal_text(&format!("EXPLAIN QUERY PLAN {}", query), instance)?;
        let program = query_internal_text(&format!("EXPLAIN {}", query), instance)?;

        let mut tables: Vec<String> = Vec::new();
        for row in &plan {
            let Some(table) = row.get("detail").and_then(|d| scanned_table(d)) else {
                continue;
            };
            if !tables.contains(&table) {
                tables.push(table);
            }
        }

        Ok(Self { program, tables })
    }

    /// Tables scanned or searched by the query, in first-seen plan order.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn program(&self) -> &QueryData {
        &self.program
    }

    /// Fill in `UNKNOWN` column types from the compiled program.
    ///
    /// Returns true only when every column ends up with a known type.
    pub fn apply_types(&self, columns: &mut TableColumns) -> bool {
        let mut register_types: HashMap<i64, ColumnType> = HashMap::new();
        let mut windows: Vec<(i64, i64)> = Vec::new();

        for row in &self.program {
            let Some(opcode) = row.get("opcode") else {
                continue;
            };

            if let Some(entry) = opcodes::lookup(opcode) {
                if let Some(register) = register_field(row, entry.register) {
                    register_types.entry(register).or_insert(entry.column_type);
                }
            } else if opcodes::is_copy(opcode) {
                let source = register_field(row, Register::P1);
                let target = register_field(row, Register::P2);
                if let (Some(source), Some(target)) = (source, target) {
                    if let Some(&column_type) = register_types.get(&source) {
                        register_types.entry(target).or_insert(column_type);
                    }
                }
            } else if opcode == "ResultRow" {
                let start = register_field(row, Register::P1);
                let count = register_field(row, Register::P2);
                if let (Some(start), Some(count)) = (start, count) {
                    windows.push((start, count));
                }
            }
        }

        for (start, count) in windows {
            for (offset, column) in columns.iter_mut().enumerate().take(count.max(0) as usize) {
                if column.column_type.is_known() {
                    continue;
                }
                if let Some(&column_type) = register_types.get(&(start + offset as i64)) {
                    column.column_type = column_type;
                }
            }
        }

        columns.iter().all(|c| c.column_type.is_known())
    }
}

/// Table name from a `SCAN`/`SEARCH` plan detail.
///
/// Subquery and constant-row scans name no table and yield None.
pub fn scanned_table(detail: &str) -> Option<String> {
    let mut words = detail.split_whitespace();
    match words.next()? {
        "SCAN" | "SEARCH" => {}
        _ => return None,
    }
    let mut name = words.next()?;
    if name == "TABLE" {
        name = words.next()?;
    }
    if matches!(name, "CONSTANT" | "SUBQUERY") || name.starts_with('(') {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnDef;
    use crate::config::ManagerConfig;
    use crate::manager::DbManager;
    use crate::registry::TableRegistry;
    use crate::registry::test_tables::simple_table;
    use std::sync::Arc;

    fn manager() -> DbManager {
        let registry = Arc::new(TableRegistry::new());
        registry.register(simple_table("widgets", 3)).unwrap();
        DbManager::new(ManagerConfig::default(), registry)
    }

    fn unknown(names: &[&str]) -> TableColumns {
        names
            .iter()
            .map(|n| ColumnDef::new(*n, ColumnType::Unknown))
            .collect()
    }

    #[test]
    fn test_scanned_table() {
        assert_eq!(scanned_table("SCAN processes"), Some("processes".to_string()));
        assert_eq!(scanned_table("SCAN TABLE users"), Some("users".to_string()));
        assert_eq!(
            scanned_table("SEARCH t USING INTEGER PRIMARY KEY (rowid=?)"),
            Some("t".to_string())
        );
        assert_eq!(
            scanned_table("SCAN widgets VIRTUAL TABLE INDEX 0:"),
            Some("widgets".to_string())
        );
        assert_eq!(scanned_table("SCAN CONSTANT ROW"), None);
        assert_eq!(scanned_table("SCAN SUBQUERY 1"), None);
        assert_eq!(scanned_table("SCAN (subquery-1)"), None);
        assert_eq!(scanned_table("USE TEMP B-TREE FOR ORDER BY"), None);
        assert_eq!(scanned_table("SCAN"), None);
    }

    #[test]
    fn test_tables_from_plan() {
        let manager = manager();
        let instance = manager.get().unwrap();
        let planner = QueryPlanner::new("SELECT * FROM widgets", &instance).unwrap();
        assert_eq!(planner.tables(), &["widgets".to_string()]);
        assert!(!planner.program().is_empty());
    }

    #[test]
    fn test_literal_types() {
        let manager = manager();
        let instance = manager.get().unwrap();
        let query = "SELECT 1 AS one, 'x' AS s, 2.5 AS r";
        let planner = QueryPlanner::new(query, &instance).unwrap();

        let mut columns = unknown(&["one", "s", "r"]);
        assert!(planner.apply_types(&mut columns));
        assert_eq!(columns[0].column_type, ColumnType::Integer);
        assert_eq!(columns[1].column_type, ColumnType::Text);
        assert_eq!(columns[2].column_type, ColumnType::Double);
        assert!(planner.tables().is_empty());
    }

    #[test]
    fn test_known_columns_are_kept() {
        let manager = manager();
        let instance = manager.get().unwrap();
        let planner = QueryPlanner::new("SELECT 1 AS one", &instance).unwrap();

        let mut columns = vec![ColumnDef::new("one", ColumnType::Blob)];
        assert!(planner.apply_types(&mut columns));
        assert_eq!(columns[0].column_type, ColumnType::Blob);
    }

    #[test]
    fn test_unresolved_column_stays_unknown() {
        let manager = manager();
        let instance = manager.get().unwrap();
        let planner = QueryPlanner::new("SELECT abs(id) FROM widgets", &instance).unwrap();

        let mut columns = unknown(&["abs(id)"]);
        assert!(!planner.apply_types(&mut columns));
        assert_eq!(columns[0].column_type, ColumnType::Unknown);
    }

    #[test]
    fn test_apply_types_on_synthetic_program() {
        let row = |opcode: &str, p1: &str, p2: &str, p3: &str| -> sysql_std_sqlite3::Row {
            [("opcode", opcode), ("p1", p1), ("p2", p2), ("p3", p3)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        let planner = QueryPlanner {
            program: vec![
                row("Concat", "1", "2", "9"),
                row("SCopy", "9", "3", "0"),
                row("Integer", "7", "4", "0"),
                row("Noop", "x", "y", "z"),
                row("Int64", "0", "bogus", "0"),
                row("ResultRow", "3", "3", "0"),
            ],
            tables: Vec::new(),
        };

        let mut columns = unknown(&["a", "b", "c"]);
        assert!(!planner.apply_types(&mut columns));
        assert_eq!(columns[0].column_type, ColumnType::Text);
        assert_eq!(columns[1].column_type, ColumnType::Integer);
        assert_eq!(columns[2].column_type, ColumnType::Unknown);
    }
}
