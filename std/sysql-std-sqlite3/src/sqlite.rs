///
/// SQLite3 engine primitives for sysql.
///
/// Row shapes:
/// - Row / QueryData: column name → text, NULL rendered as an empty string
/// - RowTyped / QueryDataTyped: column name → SQLite value
///
/// Error handling returns rusqlite::Result; callers map the extended result
/// code through return_code_string() for human-readable status messages.
///

use std::collections::BTreeMap;
use std::ffi::{CStr, CString, c_char, c_int, c_void};

use rusqlite::{Connection, ffi, types::Value as SqlValue};

/// Soft heap limit applied whenever an engine handle is opened.
pub const SOFT_HEAP_LIMIT: i64 = 5 * 1024 * 1024;

const MEMORY_PRAGMAS: &[(&str, &str)] = &[
    ("synchronous", "OFF"),
    ("temp_store", "MEMORY"),
    ("cache_size", "0"),
];

pub type Row = BTreeMap<String, String>;
pub type QueryData = Vec<Row>;

pub type RowTyped = BTreeMap<String, SqlValue>;
pub type QueryDataTyped = Vec<RowTyped>;

pub fn sqlite_error_code(e: &rusqlite::Error) -> i32 {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => err.extended_code,
        _ => -1,
    }
}

pub fn return_code_string(code: i32) -> String {
    let name = match code & 0xff {
        0 => "SQLITE_OK",
        1 => "SQLITE_ERROR",
        2 => "SQLITE_INTERNAL",
        3 => "SQLITE_PERM",
        4 => "SQLITE_ABORT",
        5 => "SQLITE_BUSY",
        6 => "SQLITE_LOCKED",
        7 => "SQLITE_NOMEM",
        8 => "SQLITE_READONLY",
        9 => "SQLITE_INTERRUPT",
        10 => "SQLITE_IOERR",
        11 => "SQLITE_CORRUPT",
        12 => "SQLITE_NOTFOUND",
        13 => "SQLITE_FULL",
        14 => "SQLITE_CANTOPEN",
        15 => "SQLITE_PROTOCOL",
        16 => "SQLITE_EMPTY",
        17 => "SQLITE_SCHEMA",
        18 => "SQLITE_TOOBIG",
        19 => "SQLITE_CONSTRAINT",
        20 => "SQLITE_MISMATCH",
        21 => "SQLITE_MISUSE",
        22 => "SQLITE_NOLFS",
        23 => "SQLITE_AUTH",
        24 => "SQLITE_FORMAT",
        25 => "SQLITE_RANGE",
        26 => "SQLITE_NOTADB",
        27 => "SQLITE_NOTICE",
        28 => "SQLITE_WARNING",
        100 => "SQLITE_ROW",
        101 => "SQLITE_DONE",
        _ => return format!("Error code: {}", code),
    };
    if code < 0 {
        return format!("Error code: {}", code);
    }
    name.to_string()
}

/// Open an in-memory handle tuned for virtual-table workloads.
///
/// The soft heap limit is process-wide in SQLite; applying it on every open
/// keeps it in force after a handle reset.
pub fn open_optimized(soft_heap_limit: i64) -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    for &(name, value) in MEMORY_PRAGMAS {
        conn.pragma_update(None, name, value)?;
    }
    conn.pragma_update_and_check(None, "journal_mode", "OFF", |row| row.get::<_, String>(0))?;
    unsafe {
        ffi::sqlite3_soft_heap_limit64(soft_heap_limit);
    }
    Ok(conn)
}

pub struct MaterializedRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl MaterializedRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_typed(self) -> QueryDataTyped {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|values| columns.iter().cloned().zip(values).collect())
            .collect()
    }

    pub fn to_text(&self) -> QueryData {
        self.rows
            .iter()
            .map(|values| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(values.iter().map(value_to_text))
                    .collect()
            })
            .collect()
    }
}

/// Run a single statement and collect every row.
pub fn materialize(conn: &Connection, sql: &str) -> rusqlite::Result<MaterializedRows> {
    let mut stmt = conn.prepare(sql)?;
    let col_count = stmt.column_count();
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let rows = stmt
        .query_map([], |row| {
            let mut values = Vec::with_capacity(col_count);
            for i in 0..col_count {
                values.push(row.get::<_, SqlValue>(i)?);
            }
            Ok(values)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(MaterializedRows { columns, rows })
}

pub fn value_to_text(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => String::new(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

/// Row callback for sqlite3_exec.
///
/// `argument` must point at a live `QueryData`; each invocation appends one row.
///
/// # Safety
///
/// Only pass this to sqlite3_exec together with a `*mut QueryData` argument.
pub unsafe extern "C" fn query_data_callback(
    argument: *mut c_void,
    argc: c_int,
    argv: *mut *mut c_char,
    column: *mut *mut c_char,
) -> c_int {
    if argument.is_null() || column.is_null() {
        return ffi::SQLITE_MISUSE;
    }

    let results = unsafe { &mut *(argument as *mut QueryData) };
    let mut row = Row::new();
    for i in 0..usize::try_from(argc).unwrap_or(0) {
        let name_ptr = unsafe { *column.add(i) };
        if name_ptr.is_null() {
            continue;
        }
        let name = unsafe { CStr::from_ptr(name_ptr) }.to_string_lossy().into_owned();

        let value_ptr = if argv.is_null() {
            std::ptr::null_mut()
        } else {
            unsafe { *argv.add(i) }
        };
        let value = if value_ptr.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(value_ptr) }.to_string_lossy().into_owned()
        };
        row.insert(name, value);
    }
    results.push(row);
    ffi::SQLITE_OK
}

/// Stream the rows of `sql` into `results` through sqlite3_exec.
pub fn exec_with_callback(
    conn: &Connection,
    sql: &str,
    results: &mut QueryData,
) -> rusqlite::Result<()> {
    let c_sql = CString::new(sql).map_err(rusqlite::Error::NulError)?;
    let mut errmsg: *mut c_char = std::ptr::null_mut();

    let rc = unsafe {
        ffi::sqlite3_exec(
            conn.handle(),
            c_sql.as_ptr(),
            Some(query_data_callback),
            results as *mut QueryData as *mut c_void,
            &mut errmsg,
        )
    };
    if rc == ffi::SQLITE_OK {
        return Ok(());
    }

    let message = if errmsg.is_null() {
        None
    } else {
        let message = unsafe { CStr::from_ptr(errmsg) }.to_string_lossy().into_owned();
        unsafe { ffi::sqlite3_free(errmsg as *mut c_void) };
        Some(message)
    };
    Err(rusqlite::Error::SqliteFailure(ffi::Error::new(rc), message))
}
