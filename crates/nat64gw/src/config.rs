//! Gateway configuration.
//!
//! [`GatewayConfig`] carries every value the control plane needs from its
//! caller: interface name, addresses, translation prefix, MTU, route metric
//! baseline and the netlink reply deadline.
//!
//! ```ignore
//! use nat64gw::GatewayConfig;
//!
//! let config = GatewayConfig::builder()
//!     .interface("nat64")
//!     .ipv4("192.0.2.1/24")?
//!     .ipv4_peer("192.0.2.2")?
//!     .ipv6_source("2001:db8::2/64")?
//!     .prefix("64:ff9b::/96")?
//!     .mtu(1500)
//!     .metric_base(1)
//!     .build()?;
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::netlink::route::DEFAULT_REPLY_TIMEOUT;
use crate::route::LegacyRoute;
use crate::translate::{AddressTranslator, TranslationPrefix};
use crate::util::addr::parse_prefix;
use crate::util::{IfName, parse_ipv6_prefix};

/// Default interface name.
pub const DEFAULT_INTERFACE: &str = "nat64";

/// Default MTU.
pub const DEFAULT_MTU: u32 = 1500;

/// Smallest MTU an IPv6 link may have.
pub const MIN_MTU: u32 = 1280;

/// Default metric baseline.
pub const DEFAULT_METRIC_BASE: u32 = 1;

/// Largest baseline that still fits the legacy route entry (`baseline + 1`
/// must fit a signed 16-bit metric).
pub const MAX_METRIC_BASE: u32 = i16::MAX as u32 - 1;

/// An IPv6 address with its on-link prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Source {
    /// The host address, matched by exact equality.
    pub address: Ipv6Addr,
    /// Prefix length used when binding it to the interface.
    pub prefix_len: u8,
}

/// Everything the caller supplies to bring the gateway up.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawGatewayConfig"))]
pub struct GatewayConfig {
    interface: String,
    ipv4_address: Option<Ipv4Addr>,
    ipv4_netmask: Option<Ipv4Addr>,
    ipv4_peer: Option<Ipv4Addr>,
    ipv6_source: Option<Ipv6Source>,
    prefix: TranslationPrefix,
    mtu: u32,
    metric_base: u32,
    reply_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            ipv4_address: None,
            ipv4_netmask: None,
            ipv4_peer: None,
            ipv6_source: None,
            prefix: TranslationPrefix::well_known(),
            mtu: DEFAULT_MTU,
            metric_base: DEFAULT_METRIC_BASE,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    /// Defaults: `nat64`, `64:ff9b::/96`, MTU 1500, baseline 1, 5 s timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the defaults and override fields one at a time.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        IfName::new(&self.interface)?;

        if self.mtu < MIN_MTU || self.mtu > u32::from(u16::MAX) {
            return Err(Error::InvalidConfig(format!(
                "MTU {} outside {}..={}",
                self.mtu,
                MIN_MTU,
                u16::MAX
            )));
        }

        // Metric 0 selects the kernel default (1024), ranking the source
        // route below the prefix route.
        if self.metric_base == 0 || self.metric_base > MAX_METRIC_BASE {
            return Err(Error::InvalidConfig(format!(
                "metric baseline {} outside 1..={}",
                self.metric_base, MAX_METRIC_BASE
            )));
        }

        if self.reply_timeout.is_zero() {
            return Err(Error::InvalidConfig("reply timeout must be non-zero".to_string()));
        }

        if let Some(source) = &self.ipv6_source
            && self.prefix.contains(source.address)
        {
            return Err(Error::InvalidConfig(format!(
                "source address {} lies inside translation prefix {}",
                source.address, self.prefix
            )));
        }

        Ok(())
    }

    /// Requested interface name.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// IPv4 address and netmask, when both are set.
    pub fn ipv4(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        self.ipv4_address.zip(self.ipv4_netmask)
    }

    /// Point-to-point peer and IPv4 route gateway.
    pub fn peer(&self) -> Option<Ipv4Addr> {
        self.ipv4_peer
    }

    /// Host IPv6 address bound to the interface.
    pub fn source(&self) -> Option<Ipv6Source> {
        self.ipv6_source
    }

    /// NAT64 translation prefix.
    pub fn prefix(&self) -> &TranslationPrefix {
        &self.prefix
    }

    /// Interface MTU.
    pub fn mtu(&self) -> u32 {
        self.mtu
    }

    /// Route metric baseline.
    pub fn metric_base(&self) -> u32 {
        self.metric_base
    }

    /// Deadline for each netlink acknowledgment.
    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// A translator over the configured prefix with the default filter.
    pub fn translator(&self) -> AddressTranslator {
        AddressTranslator::new(self.prefix)
    }

    /// The IPv4 default route via the peer, if a peer is configured.
    pub fn legacy_route(&self, device: &IfName) -> Option<LegacyRoute> {
        let baseline = u16::try_from(self.metric_base).ok()?;
        self.ipv4_peer.map(|gateway| {
            LegacyRoute::new(device, gateway)
                .metric(baseline)
                .mtu(self.mtu)
        })
    }
}

/// Builder for [`GatewayConfig`].
///
/// String inputs are parsed as they are set; cross-field checks run in
/// [`build`](Self::build).
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Start from [`GatewayConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requested interface name.
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.config.interface = name.into();
        self
    }

    /// Set the IPv4 address and netmask from CIDR notation
    /// (`192.0.2.1/24`). A bare address gets a /32 mask.
    pub fn ipv4(mut self, cidr: &str) -> Result<Self> {
        match parse_prefix(cidr)? {
            (IpAddr::V4(addr), len) => {
                self.config.ipv4_address = Some(addr);
                self.config.ipv4_netmask = Some(ipv4_netmask(len));
                Ok(self)
            }
            (IpAddr::V6(_), _) => Err(Error::InvalidConfig(format!(
                "not an IPv4 address: {}",
                cidr
            ))),
        }
    }

    /// Set the IPv4 address and netmask directly.
    pub fn ipv4_addr(mut self, address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        self.config.ipv4_address = Some(address);
        self.config.ipv4_netmask = Some(netmask);
        self
    }

    /// Set the point-to-point peer, also used as the IPv4 route gateway.
    pub fn ipv4_peer(mut self, peer: &str) -> Result<Self> {
        let peer = peer
            .trim()
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("invalid IPv4 peer: {}", peer)))?;
        self.config.ipv4_peer = Some(peer);
        Ok(self)
    }

    /// Set the host IPv6 address (`2001:db8::2/64`). A bare address gets /128.
    pub fn ipv6_source(mut self, cidr: &str) -> Result<Self> {
        let (address, prefix_len) = parse_ipv6_prefix(cidr)?;
        self.config.ipv6_source = Some(Ipv6Source {
            address,
            prefix_len,
        });
        Ok(self)
    }

    /// Set the NAT64 translation prefix (`64:ff9b::/96`).
    pub fn prefix(mut self, cidr: &str) -> Result<Self> {
        self.config.prefix = TranslationPrefix::parse(cidr)?;
        Ok(self)
    }

    /// Set the interface MTU.
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.config.mtu = mtu;
        self
    }

    /// Set the route metric baseline. The source route uses it, the prefix
    /// route and the IPv4 route use `baseline + 1`.
    pub fn metric_base(mut self, baseline: u32) -> Self {
        self.config.metric_base = baseline;
        self
    }

    /// Set the netlink reply deadline.
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.reply_timeout = timeout;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<GatewayConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Netmask with the top `len` bits set.
fn ipv4_netmask(len: u8) -> Ipv4Addr {
    let bits = if len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(len.min(32)))
    };
    Ipv4Addr::from(bits)
}

/// String form accepted from configuration files.
#[cfg(feature = "serde")]
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawGatewayConfig {
    interface: Option<String>,
    ipv4: Option<String>,
    ipv4_peer: Option<String>,
    ipv6_source: Option<String>,
    prefix: Option<String>,
    mtu: Option<u32>,
    metric_base: Option<u32>,
    reply_timeout_ms: Option<u64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawGatewayConfig> for GatewayConfig {
    type Error = Error;

    fn try_from(raw: RawGatewayConfig) -> Result<Self> {
        let mut config = GatewayConfig::builder();
        if let Some(name) = raw.interface {
            config = config.interface(name);
        }
        if let Some(cidr) = raw.ipv4 {
            config = config.ipv4(&cidr)?;
        }
        if let Some(peer) = raw.ipv4_peer {
            config = config.ipv4_peer(&peer)?;
        }
        if let Some(cidr) = raw.ipv6_source {
            config = config.ipv6_source(&cidr)?;
        }
        if let Some(cidr) = raw.prefix {
            config = config.prefix(&cidr)?;
        }
        if let Some(mtu) = raw.mtu {
            config = config.mtu(mtu);
        }
        if let Some(baseline) = raw.metric_base {
            config = config.metric_base(baseline);
        }
        if let Some(ms) = raw.reply_timeout_ms {
            config = config.reply_timeout(Duration::from_millis(ms));
        }
        config.build()
    }
}
