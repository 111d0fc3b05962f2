///
/// String functions.
///
/// - `split(str, tokens, index)`: split on any character of `tokens`, drop
///   empty parts, return the part at zero-based `index` (NULL if out of range)
/// - `concat_ws(sep, ...)`: join non-NULL arguments with `sep`
/// - `inet_aton(ip)`: dotted IPv4 to its 32-bit integer, NULL if malformed
/// - `version_compare(a, b)`: -1, 0 or 1 comparing dotted version strings
///

use std::cmp::Ordering;
use std::net::Ipv4Addr;

use rusqlite::{Connection, Result};

use crate::{arg_text, deterministic, user_error};

pub fn split_index(input: &str, tokens: &str, index: usize) -> Option<String> {
    input
        .split(|c: char| tokens.contains(c))
        .filter(|part| !part.is_empty())
        .nth(index)
        .map(String::from)
}

pub fn inet_aton(ip: &str) -> Option<i64> {
    ip.trim().parse::<Ipv4Addr>().ok().map(|a| i64::from(u32::from(a)))
}

pub fn version_compare(a: &str, b: &str) -> Ordering {
    let parts = |s: &str| -> Vec<String> {
        s.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    };
    let (left, right) = (parts(a), parts(b));

    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).map(String::as_str).unwrap_or("0");
        let r = right.get(i).map(String::as_str).unwrap_or("0");
        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

pub fn register(conn: &Connection) -> Result<()> {
    conn.create_scalar_function("split", 3, deterministic(), |ctx| {
        let (Some(input), Some(tokens)) = (arg_text(ctx, 0), arg_text(ctx, 1)) else {
            return Ok(None);
        };
        let index: Option<i64> = ctx.get(2)?;
        let Some(index) = index.and_then(|i| usize::try_from(i).ok()) else {
            return Ok(None);
        };
        Ok(split_index(&input, &tokens, index))
    })?;

    conn.create_scalar_function("concat_ws", -1, deterministic(), |ctx| {
        if ctx.len() < 1 {
            return Err(user_error("concat_ws requires a separator"));
        }
        let Some(sep) = arg_text(ctx, 0) else {
            return Ok(None);
        };
        let parts: Vec<String> = (1..ctx.len()).filter_map(|i| arg_text(ctx, i)).collect();
        Ok(Some(parts.join(&sep)))
    })?;

    conn.create_scalar_function("inet_aton", 1, deterministic(), |ctx| {
        Ok(arg_text(ctx, 0).and_then(|ip| inet_aton(&ip)))
    })?;

    conn.create_scalar_function("version_compare", 2, deterministic(), |ctx| {
        let (Some(a), Some(b)) = (arg_text(ctx, 0), arg_text(ctx, 1)) else {
            return Ok(None);
        };
        Ok(Some(version_compare(&a, &b) as i64))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_split() {
        let conn = conn();
        assert_eq!(eval::<String>(&conn, "split('a,b,,c', ',', 2)"), "c");
        assert_eq!(eval::<String>(&conn, "split('a b:c', ' :', 1)"), "b");
        assert_eq!(eval::<Option<String>>(&conn, "split('a,b', ',', 5)"), None);
        assert_eq!(eval::<Option<String>>(&conn, "split(NULL, ',', 0)"), None);
    }

    #[test]
    fn test_concat_ws_skips_nulls() {
        let conn = conn();
        assert_eq!(eval::<String>(&conn, "concat_ws('-', 'a', NULL, 'b', 3)"), "a-b-3");
        assert_eq!(eval::<String>(&conn, "concat_ws(',')"), "");
    }

    #[test]
    fn test_inet_aton() {
        let conn = conn();
        assert_eq!(eval::<i64>(&conn, "inet_aton('1.2.3.4')"), 16909060);
        assert_eq!(eval::<i64>(&conn, "inet_aton('255.255.255.255')"), 4294967295);
        assert_eq!(eval::<Option<i64>>(&conn, "inet_aton('1.2.3')"), None);
    }

    #[test]
    fn test_version_compare() {
        assert_eq!(version_compare("1.10", "1.9"), Ordering::Greater);
        assert_eq!(version_compare("1.0", "1"), Ordering::Equal);
        assert_eq!(version_compare("2.0-rc1", "2.0-rc2"), Ordering::Less);

        let conn = conn();
        assert_eq!(eval::<i64>(&conn, "version_compare('1.10', '1.9')"), 1);
        assert_eq!(eval::<i64>(&conn, "version_compare('1.2.3', '1.2.3')"), 0);
        assert_eq!(eval::<i64>(&conn, "version_compare('0.9', '1')"), -1);
    }
}
