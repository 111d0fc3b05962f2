///
/// Network operation functions.
///
/// `in_cidr_block(cidr, ip)` returns 1 when `ip` falls inside `cidr` and 0
/// otherwise. IPv4 and IPv6 are both accepted; mixing families never matches.
/// A malformed CIDR block or address is a query error.
///

use std::net::IpAddr;

use rusqlite::{Connection, Result};

use crate::{arg_text, deterministic, user_error};

fn prefix_mask(bits: u32, width: u32) -> u128 {
    if bits == 0 {
        0
    } else {
        (u128::MAX << (width - bits)) & (u128::MAX >> (128 - width))
    }
}

fn to_bits(addr: IpAddr) -> (u128, u32) {
    match addr {
        IpAddr::V4(a) => (u128::from(u32::from(a)), 32),
        IpAddr::V6(a) => (u128::from(a), 128),
    }
}

pub fn in_cidr_block(cidr: &str, ip: &str) -> std::result::Result<bool, String> {
    let (network, prefix) = cidr
        .trim()
        .split_once('/')
        .ok_or_else(|| format!("invalid CIDR block: {}", cidr))?;
    let network: IpAddr = network
        .parse()
        .map_err(|_| format!("invalid CIDR block: {}", cidr))?;
    let prefix: u32 = prefix
        .parse()
        .map_err(|_| format!("invalid CIDR prefix: {}", cidr))?;
    let address: IpAddr = ip
        .trim()
        .parse()
        .map_err(|_| format!("invalid IP address: {}", ip))?;

    let (net_bits, width) = to_bits(network);
    if prefix > width {
        return Err(format!("invalid CIDR prefix: {}", cidr));
    }
    let (addr_bits, addr_width) = to_bits(address);
    if addr_width != width {
        return Ok(false);
    }
    let mask = prefix_mask(prefix, width);
    Ok(net_bits & mask == addr_bits & mask)
}

pub fn register(conn: &Connection) -> Result<()> {
    conn.create_scalar_function("in_cidr_block", 2, deterministic(), |ctx| {
        let (Some(cidr), Some(ip)) = (arg_text(ctx, 0), arg_text(ctx, 1)) else {
            return Ok(None);
        };
        in_cidr_block(&cidr, &ip)
            .map(|inside| Some(inside as i64))
            .map_err(user_error)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_ipv4_blocks() {
        assert_eq!(in_cidr_block("10.0.0.0/8", "10.1.2.3"), Ok(true));
        assert_eq!(in_cidr_block("10.0.0.0/8", "11.0.0.1"), Ok(false));
        assert_eq!(in_cidr_block("0.0.0.0/0", "8.8.8.8"), Ok(true));
        assert_eq!(in_cidr_block("192.168.1.5/32", "192.168.1.5"), Ok(true));
    }

    #[test]
    fn test_ipv6_blocks() {
        assert_eq!(in_cidr_block("fe80::/10", "fe80::1"), Ok(true));
        assert_eq!(in_cidr_block("fe80::/10", "2001:db8::1"), Ok(false));
        assert_eq!(in_cidr_block("fe80::/10", "10.0.0.1"), Ok(false));
    }

    #[test]
    fn test_malformed_input() {
        assert!(in_cidr_block("10.0.0.0", "10.0.0.1").is_err());
        assert!(in_cidr_block("10.0.0.0/33", "10.0.0.1").is_err());
        assert!(in_cidr_block("10.0.0.0/8", "not-an-ip").is_err());
    }

    #[test]
    fn test_sql_function() {
        let conn = conn();
        assert_eq!(eval::<i64>(&conn, "in_cidr_block('10.0.0.0/8', '10.1.2.3')"), 1);
        assert_eq!(eval::<i64>(&conn, "in_cidr_block('10.0.0.0/8', '12.1.2.3')"), 0);
        assert_eq!(eval::<Option<i64>>(&conn, "in_cidr_block(NULL, '1.1.1.1')"), None);
        assert!(
            conn.query_row("SELECT in_cidr_block('bogus', '1.1.1.1')", [], |r| r.get::<_, i64>(0))
                .is_err()
        );
    }
}
