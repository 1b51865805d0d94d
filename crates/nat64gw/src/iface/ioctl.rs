//! Interface-control ioctls.
//!
//! Every operation gets its own request type, built fresh from an
//! [`IfName`] and the values it carries. Nothing is reused between calls.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use crate::error::{Error, Result};
use crate::util::IfName;

// Socket configuration ioctls (from linux/sockios.h)
pub(crate) const SIOCADDRT: libc::c_ulong = 0x890B;
pub(crate) const SIOCDELRT: libc::c_ulong = 0x890C;
const SIOCGIFFLAGS: libc::c_ulong = 0x8913;
const SIOCSIFFLAGS: libc::c_ulong = 0x8914;
const SIOCSIFADDR: libc::c_ulong = 0x8916;
const SIOCSIFDSTADDR: libc::c_ulong = 0x8918;
const SIOCSIFNETMASK: libc::c_ulong = 0x891C;
const SIOCGIFMTU: libc::c_ulong = 0x8921;
const SIOCSIFMTU: libc::c_ulong = 0x8922;
const SIOCGIFINDEX: libc::c_ulong = 0x8933;

/// Which IPv4 address slot an [`AddrRequest`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrKind {
    /// Local address (`SIOCSIFADDR`).
    Local,
    /// Netmask (`SIOCSIFNETMASK`).
    Netmask,
    /// Point-to-point peer (`SIOCSIFDSTADDR`).
    Peer,
}

impl AddrKind {
    fn request(self) -> libc::c_ulong {
        match self {
            AddrKind::Local => SIOCSIFADDR,
            AddrKind::Netmask => SIOCSIFNETMASK,
            AddrKind::Peer => SIOCSIFDSTADDR,
        }
    }

    /// Name of the ioctl, for errors and logs.
    pub fn operation(self) -> &'static str {
        match self {
            AddrKind::Local => "SIOCSIFADDR",
            AddrKind::Netmask => "SIOCSIFNETMASK",
            AddrKind::Peer => "SIOCSIFDSTADDR",
        }
    }
}

/// Encode an IPv4 address as a generic `sockaddr`.
pub fn sockaddr_v4(addr: Ipv4Addr) -> libc::sockaddr {
    let sin = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: 0,
        sin_addr: libc::in_addr {
            s_addr: u32::from_ne_bytes(addr.octets()),
        },
        sin_zero: [0; 8],
    };
    // SAFETY: sockaddr_in and sockaddr are both 16 bytes of plain data.
    unsafe { std::mem::transmute::<libc::sockaddr_in, libc::sockaddr>(sin) }
}

/// Decode a `sockaddr` holding an IPv4 address.
pub fn sockaddr_to_v4(sa: &libc::sockaddr) -> Option<Ipv4Addr> {
    if i32::from(sa.sa_family) != libc::AF_INET {
        return None;
    }
    // SAFETY: both are 16 bytes of plain data and the family is AF_INET.
    let sin = unsafe { std::mem::transmute::<libc::sockaddr, libc::sockaddr_in>(*sa) };
    Some(Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes()))
}

/// An `ifreq` carrying only the interface name.
fn named_ifreq(name: &IfName) -> libc::ifreq {
    // SAFETY: ifreq is plain old data; all-zero is a valid value.
    let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
    name.write_to(&mut ifr.ifr_name);
    ifr
}

/// Set one IPv4 address slot of an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrRequest {
    /// Target interface.
    pub name: IfName,
    /// Which slot to write.
    pub kind: AddrKind,
    /// The address.
    pub addr: Ipv4Addr,
}

impl AddrRequest {
    /// Create a request.
    pub fn new(name: &IfName, kind: AddrKind, addr: Ipv4Addr) -> Self {
        Self {
            name: name.clone(),
            kind,
            addr,
        }
    }

    /// Encode as an `ifreq`.
    pub fn to_ifreq(&self) -> libc::ifreq {
        let mut ifr = named_ifreq(&self.name);
        ifr.ifr_ifru.ifru_addr = sockaddr_v4(self.addr);
        ifr
    }
}

/// Replace the interface flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagsRequest {
    /// Target interface.
    pub name: IfName,
    /// Complete flag word to write.
    pub flags: libc::c_short,
}

impl FlagsRequest {
    /// Create a request.
    pub fn new(name: &IfName, flags: libc::c_short) -> Self {
        Self {
            name: name.clone(),
            flags,
        }
    }

    /// Encode as an `ifreq`.
    pub fn to_ifreq(&self) -> libc::ifreq {
        let mut ifr = named_ifreq(&self.name);
        ifr.ifr_ifru.ifru_flags = self.flags;
        ifr
    }
}

/// Set the interface MTU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtuRequest {
    /// Target interface.
    pub name: IfName,
    /// New MTU.
    pub mtu: libc::c_int,
}

impl MtuRequest {
    /// Create a request. MTUs beyond `c_int` are rejected.
    pub fn new(name: &IfName, mtu: u32) -> Result<Self> {
        let mtu = libc::c_int::try_from(mtu)
            .map_err(|_| Error::InvalidConfig(format!("MTU {} out of range", mtu)))?;
        Ok(Self {
            name: name.clone(),
            mtu,
        })
    }

    /// Encode as an `ifreq`.
    pub fn to_ifreq(&self) -> libc::ifreq {
        let mut ifr = named_ifreq(&self.name);
        ifr.ifr_ifru.ifru_mtu = self.mtu;
        ifr
    }
}

/// IPv6 address assignment request (mirrors struct in6_ifreq).
///
/// Must be issued on an `AF_INET6` socket.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct In6IfReq {
    /// Address to bind.
    pub ifr6_addr: libc::in6_addr,
    /// Prefix length.
    pub ifr6_prefixlen: u32,
    /// Interface index.
    pub ifr6_ifindex: libc::c_int,
}

impl In6IfReq {
    /// Create a request for interface `ifindex`.
    pub fn new(addr: Ipv6Addr, prefix_len: u8, ifindex: u32) -> Self {
        Self {
            ifr6_addr: libc::in6_addr {
                s6_addr: addr.octets(),
            },
            ifr6_prefixlen: u32::from(prefix_len),
            ifr6_ifindex: ifindex as libc::c_int,
        }
    }

    /// The address carried.
    pub fn addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.ifr6_addr.s6_addr)
    }
}

impl fmt::Debug for In6IfReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("In6IfReq")
            .field("addr", &self.addr())
            .field("prefix_len", &self.ifr6_prefixlen)
            .field("ifindex", &self.ifr6_ifindex)
            .finish()
    }
}

/// The interface-control operations the configurator needs.
///
/// [`ControlSocket`] performs them against the kernel.
pub trait InterfaceControl {
    /// Write one IPv4 address slot.
    fn set_ipv4(&self, req: &AddrRequest) -> io::Result<()>;

    /// Bind an IPv6 address.
    fn set_ipv6(&self, req: &In6IfReq) -> io::Result<()>;

    /// Read the interface flags (`SIOCGIFFLAGS`).
    fn flags(&self, name: &IfName) -> io::Result<libc::c_short>;

    /// Write the interface flags (`SIOCSIFFLAGS`).
    fn set_flags(&self, req: &FlagsRequest) -> io::Result<()>;

    /// Read the MTU (`SIOCGIFMTU`).
    fn mtu(&self, name: &IfName) -> io::Result<u32>;

    /// Write the MTU (`SIOCSIFMTU`).
    fn set_mtu(&self, req: &MtuRequest) -> io::Result<()>;

    /// Resolve the interface index (`SIOCGIFINDEX`).
    fn index(&self, name: &IfName) -> io::Result<u32>;
}

impl<T: InterfaceControl + ?Sized> InterfaceControl for &T {
    fn set_ipv4(&self, req: &AddrRequest) -> io::Result<()> {
        (**self).set_ipv4(req)
    }

    fn set_ipv6(&self, req: &In6IfReq) -> io::Result<()> {
        (**self).set_ipv6(req)
    }

    fn flags(&self, name: &IfName) -> io::Result<libc::c_short> {
        (**self).flags(name)
    }

    fn set_flags(&self, req: &FlagsRequest) -> io::Result<()> {
        (**self).set_flags(req)
    }

    fn mtu(&self, name: &IfName) -> io::Result<u32> {
        (**self).mtu(name)
    }

    fn set_mtu(&self, req: &MtuRequest) -> io::Result<()> {
        (**self).set_mtu(req)
    }

    fn index(&self, name: &IfName) -> io::Result<u32> {
        (**self).index(name)
    }
}

/// Datagram sockets used as ioctl handles.
///
/// IPv4 and route requests go through the `AF_INET` socket; IPv6 address
/// assignment needs an `AF_INET6` one.
#[derive(Debug)]
pub struct ControlSocket {
    inet: OwnedFd,
    inet6: OwnedFd,
}

fn dgram_socket(domain: libc::c_int) -> Result<OwnedFd> {
    // SAFETY: plain socket(2) call.
    let fd = unsafe { libc::socket(domain, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(Error::SocketSetupFailed(io::Error::last_os_error()));
    }
    // SAFETY: fd was just returned by socket(2) and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Issue `request` on `fd` with `arg` as the in/out buffer.
fn ioctl<T>(fd: RawFd, request: libc::c_ulong, arg: &mut T) -> io::Result<()> {
    // SAFETY: arg is a live, correctly sized request struct for `request`.
    let ret = unsafe { libc::ioctl(fd, request, arg as *mut T) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl ControlSocket {
    /// Open both control sockets.
    pub fn new() -> Result<Self> {
        let inet = dgram_socket(libc::AF_INET)?;
        let inet6 = dgram_socket(libc::AF_INET6)?;
        Ok(Self { inet, inet6 })
    }

    /// Issue an ioctl on the `AF_INET` socket.
    pub(crate) fn ioctl_inet<T>(&self, request: libc::c_ulong, arg: &mut T) -> io::Result<()> {
        ioctl(self.inet.as_raw_fd(), request, arg)
    }
}

impl InterfaceControl for ControlSocket {
    fn set_ipv4(&self, req: &AddrRequest) -> io::Result<()> {
        self.ioctl_inet(req.kind.request(), &mut req.to_ifreq())
    }

    fn set_ipv6(&self, req: &In6IfReq) -> io::Result<()> {
        let mut req = *req;
        ioctl(self.inet6.as_raw_fd(), SIOCSIFADDR, &mut req)
    }

    fn flags(&self, name: &IfName) -> io::Result<libc::c_short> {
        let mut ifr = named_ifreq(name);
        self.ioctl_inet(SIOCGIFFLAGS, &mut ifr)?;
        // SAFETY: SIOCGIFFLAGS fills ifru_flags.
        Ok(unsafe { ifr.ifr_ifru.ifru_flags })
    }

    fn set_flags(&self, req: &FlagsRequest) -> io::Result<()> {
        self.ioctl_inet(SIOCSIFFLAGS, &mut req.to_ifreq())
    }

    fn mtu(&self, name: &IfName) -> io::Result<u32> {
        let mut ifr = named_ifreq(name);
        self.ioctl_inet(SIOCGIFMTU, &mut ifr)?;
        // SAFETY: SIOCGIFMTU fills ifru_mtu.
        let mtu = unsafe { ifr.ifr_ifru.ifru_mtu };
        Ok(mtu as u32)
    }

    fn set_mtu(&self, req: &MtuRequest) -> io::Result<()> {
        self.ioctl_inet(SIOCSIFMTU, &mut req.to_ifreq())
    }

    fn index(&self, name: &IfName) -> io::Result<u32> {
        let mut ifr = named_ifreq(name);
        self.ioctl_inet(SIOCGIFINDEX, &mut ifr)?;
        // SAFETY: SIOCGIFINDEX fills ifru_ifindex.
        let index = unsafe { ifr.ifr_ifru.ifru_ifindex };
        Ok(index as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> IfName {
        IfName::new("tun-test0").unwrap()
    }

    #[test]
    fn test_sockaddr_v4() {
        let addr = Ipv4Addr::new(192, 0, 2, 1);
        let sa = sockaddr_v4(addr);
        assert_eq!(i32::from(sa.sa_family), libc::AF_INET);
        assert_eq!(sockaddr_to_v4(&sa), Some(addr));
    }

    #[test]
    fn test_addr_request() {
        let req = AddrRequest::new(&name(), AddrKind::Netmask, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(req.kind.request(), SIOCSIFNETMASK);
        assert_eq!(req.kind.operation(), "SIOCSIFNETMASK");

        let ifr = req.to_ifreq();
        assert_eq!(IfName::from_kernel(&ifr.ifr_name).unwrap(), name());
        let sa = unsafe { ifr.ifr_ifru.ifru_addr };
        assert_eq!(sockaddr_to_v4(&sa), Some(Ipv4Addr::new(255, 255, 255, 0)));
    }

    #[test]
    fn test_flags_and_mtu_requests() {
        let ifr = FlagsRequest::new(&name(), 0x41).to_ifreq();
        assert_eq!(unsafe { ifr.ifr_ifru.ifru_flags }, 0x41);

        let ifr = MtuRequest::new(&name(), 1480).unwrap().to_ifreq();
        assert_eq!(unsafe { ifr.ifr_ifru.ifru_mtu }, 1480);

        assert!(MtuRequest::new(&name(), u32::MAX).is_err());
    }

    #[test]
    fn test_in6_ifreq_layout() {
        assert_eq!(std::mem::size_of::<In6IfReq>(), 24);
        let req = In6IfReq::new("2001:db8::1".parse().unwrap(), 64, 9);
        assert_eq!(req.addr(), "2001:db8::1".parse::<Ipv6Addr>().unwrap());
        assert_eq!(req.ifr6_prefixlen, 64);
        assert_eq!(req.ifr6_ifindex, 9);
    }
}
