///
/// sysql SQLite3 Engine Boundary
///
/// Every engine handle sysql hands out is opened and queried through this
/// crate. Uses rusqlite with bundled SQLite for zero system dependency.
///
/// Architecture:
/// - Handles are plain in-memory rusqlite Connections tuned for transient,
///   virtual-table-only workloads (no journal, no page cache).
/// - A process-wide soft heap limit bounds SQLite's arena growth.
/// - Query results are eagerly materialized into MaterializedRows so callers
///   never hold rusqlite's borrowed Rows across a connection lock.
/// - The raw sqlite3_exec path streams text rows through a C-ABI callback.
///
/// Functions:
/// - Open: open_optimized
/// - Query: materialize, value_to_text
/// - Errors: sqlite_error_code, return_code_string
/// - Raw exec: query_data_callback, exec_with_callback
///

pub mod sqlite;

pub use sqlite::*;
