//! Minimal rtnetlink client for IPv6 route management.
//!
//! Messages are assembled by hand with [`MessageBuilder`] and sent over a
//! dedicated `NETLINK_ROUTE` socket. Replies are matched by sequence number
//! and bounded by a deadline.

pub mod attr;
pub mod builder;
pub mod message;
pub mod route;
pub mod socket;

pub use builder::MessageBuilder;
pub use message::{MessageIter, NlMsgError, NlMsgHdr, NlMsgType, decode_ack};
pub use route::{DEFAULT_REPLY_TIMEOUT, GatewayRoutes, Ipv6Route, NetlinkRouteManager, RtMsg};
pub use socket::{NetlinkSocket, RouteTransport};
