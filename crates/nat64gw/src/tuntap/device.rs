//! TUN device implementation.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, RawFd};

use super::TUN_DEVICE_PATH;
use crate::error::{Error, Result};
use crate::util::IfName;

// TUN ioctl (from linux/if_tun.h)
const TUNSETIFF: libc::c_ulong = 0x400454ca;

/// TUN device (Layer 3).
const IFF_TUN: libc::c_short = 0x0001;
/// No protocol information.
const IFF_NO_PI: libc::c_short = 0x1000;

/// Build the `TUNSETIFF` request for `name`.
pub fn tun_request(name: &IfName) -> libc::ifreq {
    // SAFETY: ifreq is plain old data; all-zero is a valid value.
    let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
    name.write_to(&mut ifr.ifr_name);
    ifr.ifr_ifru.ifru_flags = IFF_TUN | IFF_NO_PI;
    ifr
}

/// An open TUN interface.
///
/// The interface exists for as long as this value is alive; dropping it
/// closes the descriptor and the kernel removes the interface.
#[derive(Debug)]
pub struct TunDevice {
    file: File,
    name: IfName,
}

impl TunDevice {
    /// Open the clone device and attach a TUN interface named `name`.
    ///
    /// The kernel may rewrite the name (for example when it contains a `%d`
    /// template); the returned device records the name it reported back.
    pub fn open(name: &IfName) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(TUN_DEVICE_PATH)
            .map_err(|source| Error::DeviceUnavailable {
                path: TUN_DEVICE_PATH,
                source,
            })?;

        let mut ifr = tun_request(name);

        // SAFETY: fd is open and ifr is a valid ifreq that outlives the call.
        let ret = unsafe { libc::ioctl(file.as_raw_fd(), TUNSETIFF, &mut ifr) };
        if ret < 0 {
            let source = io::Error::last_os_error();
            tracing::warn!(interface = %name, error = %source, "TUNSETIFF failed");
            return Err(Error::InterfaceRejected {
                name: name.to_string(),
                source,
            });
        }

        let name = IfName::from_kernel(&ifr.ifr_name)?;
        tracing::debug!(interface = %name, "TUN interface attached");

        Ok(Self { file, name })
    }

    /// The interface name as reported by the kernel.
    pub fn name(&self) -> &IfName {
        &self.name
    }
}

impl Read for TunDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for TunDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl AsRawFd for TunDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl AsFd for TunDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}
