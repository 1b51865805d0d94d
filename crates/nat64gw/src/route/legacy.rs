//! IPv4 routes through the classic `SIOCADDRT`/`SIOCDELRT` interface.

use std::ffi::CString;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::{Error, Result};
use crate::iface::{ControlSocket, SIOCADDRT, SIOCDELRT, sockaddr_v4};
use crate::util::IfName;

/// Kernel route entry for the classic route ioctls.
pub type RtEntry = libc::rtentry;

/// A default IPv4 route via a gateway, pinned to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRoute {
    device: IfName,
    gateway: Ipv4Addr,
    metric: u16,
    mtu: Option<u32>,
}

impl LegacyRoute {
    /// Route everything (0.0.0.0/0) via `gateway` on `device`.
    pub fn new(device: &IfName, gateway: Ipv4Addr) -> Self {
        Self {
            device: device.clone(),
            gateway,
            metric: 0,
            mtu: None,
        }
    }

    /// Set the baseline metric.
    ///
    /// The entry carries `baseline + 1`; the kernel subtracts one from a
    /// non-zero `rt_metric`, so the installed priority equals `baseline`.
    pub fn metric(mut self, baseline: u16) -> Self {
        self.metric = baseline;
        self
    }

    /// Attach an MTU hint (`RTF_MTU`).
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = Some(mtu);
        self
    }

    /// Output device.
    pub fn device(&self) -> &IfName {
        &self.device
    }

    /// Next-hop gateway.
    pub fn gateway(&self) -> Ipv4Addr {
        self.gateway
    }

    /// Build the kernel entry. `dev` must outlive every use of the result.
    pub fn to_entry(&self, dev: &CString) -> Result<RtEntry> {
        let rt_metric = libc::c_short::try_from(u32::from(self.metric) + 1).map_err(|_| {
            Error::InvalidConfig(format!("route metric {} out of range", self.metric))
        })?;

        let mut entry: RtEntry = unsafe { std::mem::zeroed() };
        entry.rt_dst = sockaddr_v4(Ipv4Addr::UNSPECIFIED);
        entry.rt_gateway = sockaddr_v4(self.gateway);
        entry.rt_genmask = sockaddr_v4(Ipv4Addr::UNSPECIFIED);
        entry.rt_flags = libc::RTF_UP | libc::RTF_GATEWAY;
        if let Some(mtu) = self.mtu {
            entry.rt_flags |= libc::RTF_MTU;
            entry.rt_mtu = libc::c_ulong::from(mtu);
        }
        entry.rt_metric = rt_metric;
        entry.rt_dev = dev.as_ptr() as *mut libc::c_char;
        Ok(entry)
    }

    fn device_cstring(&self) -> Result<CString> {
        CString::new(self.device.as_str())
            .map_err(|_| Error::InvalidName(self.device.to_string()))
    }
}

/// Route table mutations through classic route ioctls.
pub trait RouteTable {
    /// Submit `SIOCADDRT`.
    fn add_route(&self, entry: &RtEntry) -> io::Result<()>;

    /// Submit `SIOCDELRT`.
    fn del_route(&self, entry: &RtEntry) -> io::Result<()>;
}

impl<T: RouteTable + ?Sized> RouteTable for &T {
    fn add_route(&self, entry: &RtEntry) -> io::Result<()> {
        (**self).add_route(entry)
    }

    fn del_route(&self, entry: &RtEntry) -> io::Result<()> {
        (**self).del_route(entry)
    }
}

impl RouteTable for ControlSocket {
    fn add_route(&self, entry: &RtEntry) -> io::Result<()> {
        let mut entry = *entry;
        self.ioctl_inet(SIOCADDRT, &mut entry)
    }

    fn del_route(&self, entry: &RtEntry) -> io::Result<()> {
        let mut entry = *entry;
        self.ioctl_inet(SIOCDELRT, &mut entry)
    }
}

/// Installs and removes [`LegacyRoute`]s.
#[derive(Debug)]
pub struct LegacyRouteManager<C = ControlSocket> {
    table: C,
}

impl LegacyRouteManager<ControlSocket> {
    /// Use a fresh control socket.
    pub fn new() -> Result<Self> {
        Ok(Self::with_table(ControlSocket::new()?))
    }
}

impl<C: RouteTable> LegacyRouteManager<C> {
    /// Use an existing route table handle.
    pub fn with_table(table: C) -> Self {
        Self { table }
    }

    /// The underlying route table handle.
    pub fn table(&self) -> &C {
        &self.table
    }

    /// Install `route`. A duplicate fails with EEXIST.
    pub fn add(&self, route: &LegacyRoute) -> Result<()> {
        tracing::debug!(
            interface = %route.device,
            gateway = %route.gateway,
            metric = route.metric,
            mtu = ?route.mtu,
            "adding IPv4 route"
        );
        let dev = route.device_cstring()?;
        let entry = route.to_entry(&dev)?;
        self.table.add_route(&entry).map_err(|source| {
            tracing::warn!(interface = %route.device, gateway = %route.gateway, error = %source, "IPv4 route add failed");
            Error::RouteInstallFailed {
                destination: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                prefix_len: 0,
                source: Box::new(Error::Io(source)),
            }
        })?;
        tracing::debug!(interface = %route.device, gateway = %route.gateway, "IPv4 route added");
        Ok(())
    }

    /// Remove `route`. An absent route fails with ESRCH.
    pub fn remove(&self, route: &LegacyRoute) -> Result<()> {
        tracing::debug!(interface = %route.device, gateway = %route.gateway, "removing IPv4 route");
        let dev = route.device_cstring()?;
        let entry = route.to_entry(&dev)?;
        self.table.del_route(&entry).map_err(|source| {
            tracing::warn!(interface = %route.device, gateway = %route.gateway, error = %source, "IPv4 route removal failed");
            Error::RouteRemoveFailed {
                destination: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                prefix_len: 0,
                source: Box::new(Error::Io(source)),
            }
        })?;
        tracing::debug!(interface = %route.device, gateway = %route.gateway, "IPv4 route removed");
        Ok(())
    }
}
