//! TUN interface addressing and activation.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::ioctl::{AddrKind, AddrRequest, ControlSocket, FlagsRequest, In6IfReq, InterfaceControl, MtuRequest};
use crate::error::{Error, Result};
use crate::tuntap::TunDevice;
use crate::util::IfName;

/// Interface flags as reported by `SIOCGIFFLAGS`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InterfaceFlags(libc::c_short);

impl InterfaceFlags {
    /// Interface is administratively up.
    pub const UP: Self = Self(libc::IFF_UP as libc::c_short);
    /// Resources allocated.
    pub const RUNNING: Self = Self(libc::IFF_RUNNING as libc::c_short);
    /// Point-to-point link.
    pub const POINTOPOINT: Self = Self(libc::IFF_POINTOPOINT as libc::c_short);
    /// No ARP.
    pub const NOARP: Self = Self(libc::IFF_NOARP as libc::c_short);

    /// Wrap raw flag bits.
    pub const fn from_bits(bits: libc::c_short) -> Self {
        Self(bits)
    }

    /// Raw flag bits.
    pub const fn bits(self) -> libc::c_short {
        self.0
    }

    /// True if every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of both flag sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True if [`UP`](Self::UP) is set.
    pub fn is_up(self) -> bool {
        self.contains(Self::UP)
    }

    /// True if [`RUNNING`](Self::RUNNING) is set.
    pub fn is_running(self) -> bool {
        self.contains(Self::RUNNING)
    }
}

impl fmt::Debug for InterfaceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterfaceFlags({:#x})", self.0)
    }
}

/// Applies addresses, MTU and link state to one named interface.
///
/// All calls are blocking ioctls and none is retried. Multi-step
/// operations are not rolled back when a later step fails.
#[derive(Debug)]
pub struct InterfaceConfigurator<C = ControlSocket> {
    control: C,
    name: IfName,
}

impl InterfaceConfigurator<ControlSocket> {
    /// Configure `name` through a fresh control socket.
    pub fn new(name: IfName) -> Result<Self> {
        Ok(Self::with_control(name, ControlSocket::new()?))
    }
}

impl<C: InterfaceControl> InterfaceConfigurator<C> {
    /// Configure `name` through an existing control handle.
    pub fn with_control(name: IfName, control: C) -> Self {
        Self { control, name }
    }

    /// The interface name.
    pub fn name(&self) -> &IfName {
        &self.name
    }

    /// The control handle.
    pub fn control(&self) -> &C {
        &self.control
    }

    fn set_ipv4_slot(&self, kind: AddrKind, addr: Ipv4Addr) -> Result<()> {
        let req = AddrRequest::new(&self.name, kind, addr);
        self.control.set_ipv4(&req).map_err(|source| {
            tracing::warn!(
                interface = %self.name,
                address = %addr,
                operation = kind.operation(),
                error = %source,
                "IPv4 address ioctl failed"
            );
            Error::AddressAssignmentFailed {
                interface: self.name.to_string(),
                operation: kind.operation(),
                source,
            }
        })
    }

    /// Assign the local IPv4 address, then the netmask.
    ///
    /// If the netmask call fails the address stays assigned.
    pub fn set_ipv4(&self, address: Ipv4Addr, netmask: Ipv4Addr) -> Result<()> {
        tracing::debug!(interface = %self.name, address = %address, netmask = %netmask, "assigning IPv4 address");
        self.set_ipv4_slot(AddrKind::Local, address)?;
        self.set_ipv4_slot(AddrKind::Netmask, netmask)?;
        tracing::debug!(interface = %self.name, address = %address, netmask = %netmask, "IPv4 address assigned");
        Ok(())
    }

    /// Set the point-to-point peer address.
    pub fn set_ipv4_peer(&self, peer: Ipv4Addr) -> Result<()> {
        tracing::debug!(interface = %self.name, peer = %peer, "setting IPv4 peer");
        self.set_ipv4_slot(AddrKind::Peer, peer)?;
        tracing::debug!(interface = %self.name, peer = %peer, "IPv4 peer set");
        Ok(())
    }

    /// Resolve the interface index, then bind `address/prefix_len`.
    pub fn set_ipv6(&self, address: Ipv6Addr, prefix_len: u8) -> Result<()> {
        if prefix_len > 128 {
            return Err(Error::InvalidPrefix(format!("{}/{}", address, prefix_len)));
        }
        tracing::debug!(interface = %self.name, address = %address, prefix_len, "assigning IPv6 address");

        let ifindex = self.index()?;
        let req = In6IfReq::new(address, prefix_len, ifindex);
        self.control.set_ipv6(&req).map_err(|source| {
            tracing::warn!(interface = %self.name, address = %address, error = %source, "IPv6 bind failed");
            Error::AddressBindFailed {
                interface: self.name.to_string(),
                address,
                prefix_len,
                source,
            }
        })?;
        tracing::debug!(interface = %self.name, address = %address, prefix_len, ifindex, "IPv6 address bound");
        Ok(())
    }

    /// Set the MTU.
    pub fn set_mtu(&self, mtu: u32) -> Result<()> {
        tracing::debug!(interface = %self.name, mtu, "setting MTU");
        let req = MtuRequest::new(&self.name, mtu)?;
        self.control
            .set_mtu(&req)
            .map_err(|source| self.control_failed("SIOCSIFMTU", source))?;
        tracing::debug!(interface = %self.name, mtu, "MTU set");
        Ok(())
    }

    /// Current MTU.
    pub fn mtu(&self) -> Result<u32> {
        tracing::trace!(interface = %self.name, "reading MTU");
        self.control
            .mtu(&self.name)
            .map_err(|source| self.control_failed("SIOCGIFMTU", source))
    }

    /// Current flags.
    pub fn flags(&self) -> Result<InterfaceFlags> {
        tracing::trace!(interface = %self.name, "reading flags");
        self.control
            .flags(&self.name)
            .map(InterfaceFlags::from_bits)
            .map_err(|source| self.control_failed("SIOCGIFFLAGS", source))
    }

    /// Mark the interface up and running, keeping every flag already set.
    pub fn bring_up(&self) -> Result<()> {
        let current = self.flags()?;
        let wanted = current.union(InterfaceFlags::UP.union(InterfaceFlags::RUNNING));
        tracing::debug!(interface = %self.name, flags = ?wanted, "bringing interface up");

        let req = FlagsRequest::new(&self.name, wanted.bits());
        self.control
            .set_flags(&req)
            .map_err(|source| self.control_failed("SIOCSIFFLAGS", source))?;
        tracing::debug!(interface = %self.name, "interface up");
        Ok(())
    }

    /// Kernel interface index.
    pub fn index(&self) -> Result<u32> {
        tracing::trace!(interface = %self.name, "resolving interface index");
        let index = self.control.index(&self.name).map_err(|source| {
            tracing::warn!(interface = %self.name, error = %source, "index resolution failed");
            Error::IndexResolutionFailed {
                interface: self.name.to_string(),
                source,
            }
        })?;
        tracing::trace!(interface = %self.name, index, "interface index resolved");
        Ok(index)
    }

    fn control_failed(&self, operation: &'static str, source: std::io::Error) -> Error {
        tracing::warn!(interface = %self.name, operation, error = %source, "interface ioctl failed");
        Error::InterfaceControlFailed {
            interface: self.name.to_string(),
            operation,
            source,
        }
    }
}

/// A TUN interface together with the means to configure it.
///
/// Dropping the handle closes the device and the control sockets.
#[derive(Debug)]
pub struct InterfaceHandle {
    device: TunDevice,
    configurator: InterfaceConfigurator<ControlSocket>,
}

impl InterfaceHandle {
    /// Create the TUN interface `requested` and open its control sockets.
    ///
    /// Names longer than 15 bytes are truncated. The handle is named after
    /// what the kernel reports back.
    pub fn open(requested: &str) -> Result<Self> {
        let name = IfName::new(requested)?;
        let device = TunDevice::open(&name)?;
        let configurator = InterfaceConfigurator::new(device.name().clone())?;
        Ok(Self {
            device,
            configurator,
        })
    }

    /// Interface name.
    pub fn name(&self) -> &IfName {
        self.device.name()
    }

    /// The TUN device.
    pub fn device(&self) -> &TunDevice {
        &self.device
    }

    /// The TUN device, for the packet loop.
    pub fn device_mut(&mut self) -> &mut TunDevice {
        &mut self.device
    }

    /// The configurator for this interface.
    pub fn configurator(&self) -> &InterfaceConfigurator<ControlSocket> {
        &self.configurator
    }

    /// Split into device and configurator.
    pub fn into_parts(self) -> (TunDevice, InterfaceConfigurator<ControlSocket>) {
        (self.device, self.configurator)
    }
}
