//! IPv4/IPv6 address translation under a NAT64 prefix.
//!
//! Addresses are embedded following RFC 6052 §2.2: the IPv4 octets follow the
//! prefix and skip octet 8 (bits 64..71, the "u" octet), which stays zero.
//!
//! ```ignore
//! use nat64gw::translate::{AddressTranslator, TranslationPrefix};
//!
//! let translator = AddressTranslator::new(TranslationPrefix::well_known());
//! let v6 = translator.to_ipv6("192.0.2.1".parse()?);
//! assert_eq!(v6, "64:ff9b::c000:201".parse::<std::net::Ipv6Addr>()?);
//! assert_eq!(translator.to_ipv4(v6, false), Some("192.0.2.1".parse()?));
//! ```

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::util::addr::{ipv4_in_prefix, ipv6_in_prefix, ipv6_mask, parse_ipv6_prefix};

/// Prefix lengths permitted by RFC 6052.
pub const VALID_PREFIX_LENGTHS: [u8; 6] = [32, 40, 48, 56, 64, 96];

/// Octet index of the reserved "u" octet.
const U_OCTET: usize = 8;

/// The well-known NAT64 prefix `64:ff9b::/96`.
pub const WELL_KNOWN_PREFIX: Ipv6Addr = Ipv6Addr::new(0x64, 0xff9b, 0, 0, 0, 0, 0, 0);

/// Where the IPv4 value lives inside a translated IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embedding {
    /// RFC 6052 layout for the prefix length.
    Rfc6052,
    /// Always the low-order 32 bits, regardless of prefix length.
    LowOrder,
}

impl Embedding {
    /// Map the `pseudo` flag of [`AddressTranslator::to_ipv4`].
    pub fn from_pseudo(pseudo: bool) -> Self {
        if pseudo { Self::LowOrder } else { Self::Rfc6052 }
    }
}

/// A validated NAT64 translation prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TranslationPrefix {
    addr: Ipv6Addr,
    len: u8,
}

impl TranslationPrefix {
    /// Create a prefix, rejecting lengths outside RFC 6052, set host bits, or
    /// a non-zero "u" octet.
    pub fn new(addr: Ipv6Addr, len: u8) -> Result<Self> {
        if !VALID_PREFIX_LENGTHS.contains(&len) {
            return Err(Error::InvalidPrefix(format!(
                "{}/{}: length must be one of 32, 40, 48, 56, 64 or 96",
                addr, len
            )));
        }
        if u128::from(addr) & !ipv6_mask(len) != 0 {
            return Err(Error::InvalidPrefix(format!(
                "{}/{}: bits after the prefix length must be zero",
                addr, len
            )));
        }
        if addr.octets()[U_OCTET] != 0 {
            return Err(Error::InvalidPrefix(format!(
                "{}/{}: bits 64..71 must be zero",
                addr, len
            )));
        }
        Ok(Self { addr, len })
    }

    /// `64:ff9b::/96`.
    pub fn well_known() -> Self {
        Self {
            addr: WELL_KNOWN_PREFIX,
            len: 96,
        }
    }

    /// Parse CIDR notation, e.g. `64:ff9b::/96`.
    pub fn parse(s: &str) -> Result<Self> {
        let (addr, len) = parse_ipv6_prefix(s)?;
        Self::new(addr, len)
    }

    /// The network address.
    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    /// The prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    /// Check if `candidate` falls inside this prefix, comparing exactly
    /// `len` bits.
    pub fn contains(&self, candidate: Ipv6Addr) -> bool {
        ipv6_in_prefix(candidate, self.addr, self.len)
    }

    /// Octet indices that carry the IPv4 address for this prefix length.
    fn embedded_octets(&self, embedding: Embedding) -> [usize; 4] {
        if embedding == Embedding::LowOrder {
            return [12, 13, 14, 15];
        }
        let mut positions = [0usize; 4];
        let mut idx = usize::from(self.len / 8);
        for pos in positions.iter_mut() {
            if idx == U_OCTET {
                idx += 1;
            }
            *pos = idx;
            idx += 1;
        }
        positions
    }
}

impl fmt::Display for TranslationPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

impl FromStr for TranslationPrefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Embed `ip` into `prefix`.
pub fn to_ipv6(ip: Ipv4Addr, prefix: &TranslationPrefix) -> Ipv6Addr {
    let mut octets = prefix.addr.octets();
    for (pos, byte) in prefix
        .embedded_octets(Embedding::Rfc6052)
        .into_iter()
        .zip(ip.octets())
    {
        octets[pos] = byte;
    }
    Ipv6Addr::from(octets)
}

/// True iff the low-order 32 bits of `prefix` are zero.
pub fn valid_prefix(prefix: Ipv6Addr) -> bool {
    u128::from(prefix) & 0xffff_ffff == 0
}

/// Full-width equality of two IPv6 addresses.
pub fn matches_source(a: &Ipv6Addr, b: &Ipv6Addr) -> bool {
    a.octets() == b.octets()
}

/// Which IPv4 destinations may be translated.
///
/// The default rejects "this network" (0.0.0.0/8), loopback, multicast,
/// the 240/4 reserved block, and the limited broadcast address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Filter {
    unspecified: bool,
    loopback: bool,
    multicast: bool,
    reserved: bool,
    broadcast: bool,
    link_local: bool,
    denied: Vec<(Ipv4Addr, u8)>,
}

impl Default for Ipv4Filter {
    fn default() -> Self {
        Self {
            unspecified: true,
            loopback: true,
            multicast: true,
            reserved: true,
            broadcast: true,
            link_local: false,
            denied: Vec::new(),
        }
    }
}

impl Ipv4Filter {
    /// Create the default filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter that accepts every address.
    pub fn permissive() -> Self {
        Self {
            unspecified: false,
            loopback: false,
            multicast: false,
            reserved: false,
            broadcast: false,
            link_local: false,
            denied: Vec::new(),
        }
    }

    /// Reject 0.0.0.0/8.
    pub fn reject_unspecified(mut self, value: bool) -> Self {
        self.unspecified = value;
        self
    }

    /// Reject 127.0.0.0/8.
    pub fn reject_loopback(mut self, value: bool) -> Self {
        self.loopback = value;
        self
    }

    /// Reject 224.0.0.0/4.
    pub fn reject_multicast(mut self, value: bool) -> Self {
        self.multicast = value;
        self
    }

    /// Reject 240.0.0.0/4 (excluding the broadcast address, see
    /// [`reject_broadcast`](Self::reject_broadcast)).
    pub fn reject_reserved(mut self, value: bool) -> Self {
        self.reserved = value;
        self
    }

    /// Reject 255.255.255.255.
    pub fn reject_broadcast(mut self, value: bool) -> Self {
        self.broadcast = value;
        self
    }

    /// Reject 169.254.0.0/16.
    pub fn reject_link_local(mut self, value: bool) -> Self {
        self.link_local = value;
        self
    }

    /// Reject an additional network.
    pub fn deny(mut self, network: Ipv4Addr, prefix_len: u8) -> Self {
        self.denied.push((network, prefix_len.min(32)));
        self
    }

    /// Check whether `ip` may be translated.
    pub fn allows(&self, ip: Ipv4Addr) -> bool {
        if self.broadcast && ip.is_broadcast() {
            return false;
        }
        if self.unspecified && ip.octets()[0] == 0 {
            return false;
        }
        if self.loopback && ip.is_loopback() {
            return false;
        }
        if self.multicast && ip.is_multicast() {
            return false;
        }
        if self.reserved && !ip.is_broadcast() && ip.octets()[0] >= 240 {
            return false;
        }
        if self.link_local && ip.is_link_local() {
            return false;
        }
        !self
            .denied
            .iter()
            .any(|&(net, len)| ipv4_in_prefix(ip, net, len))
    }
}

/// Stateless translation under a configured prefix.
#[derive(Debug, Clone)]
pub struct AddressTranslator {
    prefix: TranslationPrefix,
    filter: Ipv4Filter,
}

impl AddressTranslator {
    /// Create a translator with the default [`Ipv4Filter`].
    pub fn new(prefix: TranslationPrefix) -> Self {
        Self {
            prefix,
            filter: Ipv4Filter::default(),
        }
    }

    /// Replace the IPv4 filter.
    pub fn with_filter(mut self, filter: Ipv4Filter) -> Self {
        self.filter = filter;
        self
    }

    /// The configured prefix.
    pub fn prefix(&self) -> &TranslationPrefix {
        &self.prefix
    }

    /// The configured filter.
    pub fn filter(&self) -> &Ipv4Filter {
        &self.filter
    }

    /// Extract the IPv4 address embedded in `candidate`.
    ///
    /// `pseudo` selects [`Embedding::LowOrder`] instead of the RFC 6052
    /// layout. Returns `None` when the candidate is outside the prefix.
    pub fn to_ipv4(&self, candidate: Ipv6Addr, pseudo: bool) -> Option<Ipv4Addr> {
        self.to_ipv4_with(candidate, Embedding::from_pseudo(pseudo))
    }

    /// Extract the IPv4 address embedded in `candidate` using `embedding`.
    pub fn to_ipv4_with(&self, candidate: Ipv6Addr, embedding: Embedding) -> Option<Ipv4Addr> {
        if !self.prefix.contains(candidate) {
            return None;
        }
        let octets = candidate.octets();
        let [a, b, c, d] = self.prefix.embedded_octets(embedding);
        Some(Ipv4Addr::new(octets[a], octets[b], octets[c], octets[d]))
    }

    /// Embed `ip` into the configured prefix.
    pub fn to_ipv6(&self, ip: Ipv4Addr) -> Ipv6Addr {
        to_ipv6(ip, &self.prefix)
    }

    /// Check `ip` against the configured filter.
    pub fn validate_ipv4(&self, ip: Ipv4Addr) -> bool {
        self.filter.allows(ip)
    }

    /// Validate and embed an IPv4 destination.
    pub fn translate_destination(&self, ip: Ipv4Addr) -> Option<Ipv6Addr> {
        self.validate_ipv4(ip).then(|| self.to_ipv6(ip))
    }

    /// Compare the first `prefix.prefix_len()` bits of `a` and `b`.
    pub fn matches_prefix(&self, a: &Ipv6Addr, b: &Ipv6Addr) -> bool {
        ipv6_in_prefix(*a, *b, self.prefix.len)
    }
}
