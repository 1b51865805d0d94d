//! Shared utilities.

pub mod addr;
pub mod ifname;
#[cfg(test)]
pub(crate) mod log_capture;

pub use addr::{ipv6_in_prefix, parse_ipv6_prefix, parse_prefix};
pub use ifname::{IFNAME_MAX, IfName};
