//! Classic IPv4 route management.
//!
//! IPv6 routes use rtnetlink instead; see [`crate::netlink::route`].

mod legacy;

pub use legacy::{LegacyRoute, LegacyRouteManager, RouteTable, RtEntry};
