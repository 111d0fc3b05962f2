///
/// sysql-std-functions - SQL Function Extensions
///
/// Scalar functions added to every engine handle before any virtual table is
/// attached. Each category has its own registration routine; all of them are
/// idempotent since SQLite replaces a function registered twice under the
/// same name and arity.
///
/// - **Math**: sqrt, log, log10, ceil, floor, power, pi, degrees, radians, sin, cos, tan
/// - **Strings**: split, concat_ws, inet_aton, version_compare
/// - **Hashing**: md5, sha1, sha256 (lowercase hex digests)
/// - **Operation**: in_cidr_block
/// - **Encoding**: to_base64, from_base64, conditional_to_base64, to_hex
/// - **Filesystem**: path_basename, path_dirname, path_join, file_exists
///
/// NULL arguments produce NULL results, with the exception of concat_ws which
/// skips NULL parts.
///

pub mod encoding;
pub mod filesystem;
pub mod hashing;
pub mod math;
pub mod operation;
pub mod strings;

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Result};

pub fn register_math_extensions(conn: &Connection) -> Result<()> {
    math::register(conn)
}

pub fn register_string_extensions(conn: &Connection) -> Result<()> {
    strings::register(conn)
}

pub fn register_hashing_extensions(conn: &Connection) -> Result<()> {
    hashing::register(conn)
}

pub fn register_operation_extensions(conn: &Connection) -> Result<()> {
    operation::register(conn)
}

pub fn register_encoding_extensions(conn: &Connection) -> Result<()> {
    encoding::register(conn)
}

pub fn register_filesystem_extensions(conn: &Connection) -> Result<()> {
    filesystem::register(conn)
}

/// Register every function category on `conn`.
pub fn register_all(conn: &Connection) -> Result<()> {
    register_math_extensions(conn)?;
    register_string_extensions(conn)?;
    register_hashing_extensions(conn)?;
    register_operation_extensions(conn)?;
    register_encoding_extensions(conn)?;
    register_filesystem_extensions(conn)?;
    Ok(())
}

pub(crate) fn deterministic() -> FunctionFlags {
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC
}

pub(crate) fn user_error(message: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(message.into().into())
}

/// Argument `idx` as raw bytes; numbers use their SQL text form.
pub(crate) fn arg_bytes(ctx: &Context<'_>, idx: usize) -> Option<Vec<u8>> {
    match ctx.get_raw(idx) {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string().into_bytes()),
        ValueRef::Real(f) => Some(f.to_string().into_bytes()),
        ValueRef::Text(t) => Some(t.to_vec()),
        ValueRef::Blob(b) => Some(b.to_vec()),
    }
}

pub(crate) fn arg_text(ctx: &Context<'_>, idx: usize) -> Option<String> {
    arg_bytes(ctx, idx).map(|b| String::from_utf8_lossy(&b).into_owned())
}

/// Argument `idx` coerced to a real the way SQLite coerces numeric
/// arguments: text and blobs use their longest numeric prefix, or 0.0.
pub(crate) fn arg_real(ctx: &Context<'_>, idx: usize) -> Option<f64> {
    match ctx.get_raw(idx) {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(numeric_prefix(t)),
    }
}

fn numeric_prefix(bytes: &[u8]) -> f64 {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start();
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(text.len());
    (1..=end)
        .rev()
        .find_map(|len| text[..len].parse::<f64>().ok())
        .unwrap_or(0.0)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_register_all_is_idempotent() {
        let conn = conn();
        register_all(&conn).unwrap();
        let v: f64 = eval(&conn, "sqrt(16)");
        assert_eq!(v, 4.0);
    }

    #[test]
    fn test_single_category_registration() {
        let conn = Connection::open_in_memory().unwrap();
        register_hashing_extensions(&conn).unwrap();
        let digest: String = eval(&conn, "md5('')");
        assert_eq!(digest, "d41d8cd98f00b204e9800998ecf8427e");
        assert!(conn.query_row("SELECT to_base64('x')", [], |r| r.get::<_, String>(0)).is_err());
    }
}
