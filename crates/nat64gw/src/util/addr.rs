//! Address parsing and prefix-matching utilities.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};

/// Parse an IP address with prefix length (CIDR notation).
/// Returns (address, prefix_length). A bare address gets a host-length prefix.
pub fn parse_prefix(s: &str) -> Result<(IpAddr, u8)> {
    let (addr_str, prefix_str) = match s.split_once('/') {
        Some((a, p)) => (a, Some(p)),
        None => (s, None),
    };

    let addr: IpAddr = addr_str
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid address: {}", addr_str)))?;
    let max_prefix = if addr.is_ipv4() { 32 } else { 128 };

    let prefix = match prefix_str {
        Some(p) => p
            .trim()
            .parse::<u8>()
            .map_err(|_| Error::InvalidConfig(format!("invalid prefix length: {}", p)))?,
        None => max_prefix,
    };

    if prefix > max_prefix {
        return Err(Error::InvalidConfig(format!(
            "{} exceeds maximum {} for address family",
            prefix, max_prefix
        )));
    }

    Ok((addr, prefix))
}

/// Parse an IPv6 address with optional prefix length.
pub fn parse_ipv6_prefix(s: &str) -> Result<(Ipv6Addr, u8)> {
    match parse_prefix(s)? {
        (IpAddr::V6(addr), len) => Ok((addr, len)),
        (IpAddr::V4(_), _) => Err(Error::InvalidConfig(format!("not an IPv6 prefix: {}", s))),
    }
}

/// Network mask with the top `prefix_len` bits set.
#[inline]
pub const fn ipv6_mask(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else if prefix_len >= 128 {
        !0
    } else {
        !0u128 << (128 - prefix_len as u32)
    }
}

/// Check if an IPv4 address is in a given prefix.
pub fn ipv4_in_prefix(addr: Ipv4Addr, prefix_addr: Ipv4Addr, prefix_len: u8) -> bool {
    if prefix_len == 0 {
        return true;
    }
    if prefix_len > 32 {
        return false;
    }

    let mask = !0u32 << (32 - prefix_len);
    let addr_bits = u32::from(addr);
    let prefix_bits = u32::from(prefix_addr);

    (addr_bits & mask) == (prefix_bits & mask)
}

/// Check if an IPv6 address is in a given prefix.
pub fn ipv6_in_prefix(addr: Ipv6Addr, prefix_addr: Ipv6Addr, prefix_len: u8) -> bool {
    if prefix_len > 128 {
        return false;
    }
    let mask = ipv6_mask(prefix_len);
    (u128::from(addr) & mask) == (u128::from(prefix_addr) & mask)
}
