///
/// # sysql: SQL over live system state
///
/// Connection arbitration, query introspection and event classification
/// for SQLite engines whose tables are virtual and generated on demand.
///
/// ## Library Usage
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use sysql::{DbManager, ManagerConfig, SqlInternal, TableRegistry};
///
/// let registry = Arc::new(TableRegistry::new());
/// registry.register(processes_table()?)?;
/// let manager = DbManager::install(DbManager::new(ManagerConfig::default(), registry))?;
///
/// let result = SqlInternal::new("SELECT pid, name FROM processes", false)?;
/// if result.event_based() { /* ... */ }
/// ```
///
/// ## Pieces
///
/// - `DbManager`: one primary handle, try-locked per request; transient
///   handles for contended callers
/// - `DbInstance`: one session on a handle; clears per-query table state on drop
/// - `QueryPlanner`: table list and result types from EXPLAIN output
/// - `SqlInternal`: query execution plus event-based classification
///

pub mod attributes;
pub mod columns;
pub mod config;
pub mod errors;
pub mod handle;
pub mod instance;
pub mod manager;
pub mod opcodes;
pub mod planner;
pub mod query;
pub mod registry;
pub mod session;
pub mod vtab;

pub use attributes::TableAttributes;
pub use columns::{ColumnDef, ColumnType, TableColumns};
pub use config::{ManagerConfig, default_config_path, parse_disabled_tables};
pub use errors::{Result, SqlError};
pub use instance::DbInstance;
pub use manager::DbManager;
pub use planner::QueryPlanner;
pub use query::{SqlInternal, get_query_columns_internal, query_internal, query_internal_text};
pub use registry::{
    Constraint, ConstraintOp, QueryContext, TableGenerator, TableRegistry, TableRows,
    VirtualTableContent,
};
pub use sysql_std_sqlite3::{QueryData, QueryDataTyped, Row, RowTyped};
