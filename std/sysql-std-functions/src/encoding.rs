///
/// Encoding functions.
///
/// - `to_base64(x)`: standard base64 with padding
/// - `from_base64(x)`: decoded text (lossy UTF-8), NULL if `x` is not base64
/// - `conditional_to_base64(x)`: `x` unchanged when it is printable ASCII,
///   otherwise its base64 encoding
/// - `to_hex(x)`: integers as `0x` plus 16 hex digits, text and blobs as the
///   lowercase hex of their bytes
///

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Result};

use crate::{arg_bytes, deterministic};

pub fn is_printable(data: &[u8]) -> bool {
    data.iter()
        .all(|&b| (0x20..=0x7e).contains(&b) || b == b'\t' || b == b'\n' || b == b'\r')
}

pub fn register(conn: &Connection) -> Result<()> {
    conn.create_scalar_function("to_base64", 1, deterministic(), |ctx| {
        Ok(arg_bytes(ctx, 0).map(|data| STANDARD.encode(data)))
    })?;

    conn.create_scalar_function("from_base64", 1, deterministic(), |ctx| {
        Ok(arg_bytes(ctx, 0).and_then(|data| {
            STANDARD
                .decode(data.trim_ascii())
                .ok()
                .map(|decoded| String::from_utf8_lossy(&decoded).into_owned())
        }))
    })?;

    conn.create_scalar_function("conditional_to_base64", 1, deterministic(), |ctx| {
        Ok(arg_bytes(ctx, 0).map(|data| {
            if is_printable(&data) {
                String::from_utf8_lossy(&data).into_owned()
            } else {
                STANDARD.encode(data)
            }
        }))
    })?;

    conn.create_scalar_function("to_hex", 1, deterministic(), |ctx| {
        if let ValueRef::Integer(i) = ctx.get_raw(0) {
            return Ok(Some(format!("0x{:016x}", i)));
        }
        Ok(arg_bytes(ctx, 0).map(hex::encode))
    })?;
    Ok(())
}
