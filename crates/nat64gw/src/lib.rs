//! Control plane for a NAT64 IPv4-over-IPv6 TUN gateway on Linux.
//!
//! This crate creates and addresses the TUN interface, installs the kernel
//! routes that steer gateway traffic into it, and translates addresses
//! between IPv4 and a NAT64 IPv6 prefix. The packet loop that reads and
//! writes the device lives elsewhere; it gets the device through
//! [`InterfaceHandle::device_mut`].
//!
//! # Features
//!
//! - `serde` - `Deserialize` for [`GatewayConfig`]
//!
//! # Example
//!
//! ```ignore
//! use nat64gw::{GatewayConfig, InterfaceHandle, NetlinkRouteManager};
//!
//! #[tokio::main]
//! async fn main() -> nat64gw::Result<()> {
//!     let config = GatewayConfig::builder()
//!         .interface("nat64")
//!         .ipv4("192.0.2.1/24")?
//!         .ipv6_source("2001:db8::2/64")?
//!         .build()?;
//!
//!     let handle = InterfaceHandle::open(config.interface())?;
//!     let iface = handle.configurator();
//!     if let Some((addr, mask)) = config.ipv4() {
//!         iface.set_ipv4(addr, mask)?;
//!     }
//!     iface.set_mtu(config.mtu())?;
//!     iface.bring_up()?;
//!
//!     let Some(source) = config.source() else {
//!         return Ok(());
//!     };
//!     iface.set_ipv6(source.address, source.prefix_len)?;
//!
//!     let routes = NetlinkRouteManager::new()?.timeout(config.reply_timeout());
//!     routes
//!         .install(
//!             iface.index()?,
//!             source.address,
//!             config.prefix(),
//!             config.metric_base(),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Address translation
//!
//! ```
//! use std::net::Ipv4Addr;
//! use nat64gw::{AddressTranslator, TranslationPrefix};
//!
//! let translator = AddressTranslator::new(TranslationPrefix::well_known());
//! let v6 = translator.to_ipv6(Ipv4Addr::new(192, 0, 2, 33));
//! assert_eq!(v6.to_string(), "64:ff9b::c000:221");
//! assert_eq!(translator.to_ipv4(v6, false), Some(Ipv4Addr::new(192, 0, 2, 33)));
//! ```

pub mod config;
pub mod error;
pub mod iface;
pub mod netlink;
pub mod route;
pub mod translate;
pub mod tuntap;
pub mod util;

pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use error::{Error, Result};
pub use iface::{InterfaceConfigurator, InterfaceHandle};
pub use netlink::NetlinkRouteManager;
pub use route::{LegacyRoute, LegacyRouteManager};
pub use translate::{AddressTranslator, TranslationPrefix};
pub use tuntap::TunDevice;
