///
/// Hashing functions returning lowercase hex digests.
///
/// Text and blob arguments are hashed as raw bytes; numbers are hashed in
/// their SQL text form.
///

use md5::Md5;
use rusqlite::{Connection, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::{arg_bytes, deterministic};

fn hex_digest<D: Digest>(data: &[u8]) -> String {
    hex::encode(D::digest(data))
}

pub fn register(conn: &Connection) -> Result<()> {
    let digests: [(&str, fn(&[u8]) -> String); 3] = [
        ("md5", hex_digest::<Md5>),
        ("sha1", hex_digest::<Sha1>),
        ("sha256", hex_digest::<Sha256>),
    ];
    for (name, digest) in digests {
        conn.create_scalar_function(name, 1, deterministic(), move |ctx| {
            Ok(arg_bytes(ctx, 0).map(|data| digest(&data)))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;

    #[test]
    fn test_known_digests() {
        let conn = conn();
        assert_eq!(
            eval::<String>(&conn, "md5('abc')"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            eval::<String>(&conn, "sha1('abc')"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            eval::<String>(&conn, "sha256('abc')"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_blob_matches_text() {
        let conn = conn();
        let text: String = eval(&conn, "sha256('abc')");
        let blob: String = eval(&conn, "sha256(X'616263')");
        assert_eq!(text, blob);
    }

    #[test]
    fn test_null_input() {
        let conn = conn();
        assert_eq!(eval::<Option<String>>(&conn, "md5(NULL)"), None);
    }
}
