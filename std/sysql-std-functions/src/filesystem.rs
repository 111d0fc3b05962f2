///
/// Filesystem path functions.
///
/// Path manipulation is purely lexical. `file_exists` touches the filesystem
/// and is therefore registered without the deterministic flag.
///

use std::path::{Path, PathBuf};

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Result};

use crate::{arg_text, deterministic};

pub fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn dirname(path: &str) -> String {
    match Path::new(path).parent() {
        Some(parent) if parent.as_os_str().is_empty() => ".".to_string(),
        Some(parent) => parent.to_string_lossy().into_owned(),
        None => path.to_string(),
    }
}

pub fn register(conn: &Connection) -> Result<()> {
    conn.create_scalar_function("path_basename", 1, deterministic(), |ctx| {
        Ok(arg_text(ctx, 0).map(|p| basename(&p)))
    })?;

    conn.create_scalar_function("path_dirname", 1, deterministic(), |ctx| {
        Ok(arg_text(ctx, 0).map(|p| dirname(&p)))
    })?;

    conn.create_scalar_function("path_join", -1, deterministic(), |ctx| {
        let mut joined = PathBuf::new();
        for i in 0..ctx.len() {
            match arg_text(ctx, i) {
                Some(part) => joined.push(part),
                None => return Ok(None),
            }
        }
        Ok(Some(joined.to_string_lossy().into_owned()))
    })?;

    conn.create_scalar_function("file_exists", 1, FunctionFlags::SQLITE_UTF8, |ctx| {
        Ok(arg_text(ctx, 0).map(|p| Path::new(&p).exists() as i64))
    })?;
    Ok(())
}
