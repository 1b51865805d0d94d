//! Error types for gateway control-plane operations.

use std::io;
use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring the TUN interface or kernel routes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The TUN device node could not be opened.
    #[error("cannot open {path}: {source}")]
    DeviceUnavailable {
        /// The device node path.
        path: &'static str,
        /// The underlying error.
        source: io::Error,
    },

    /// The kernel refused to create the interface in TUN mode.
    #[error("TUNSETIFF rejected for {name}: {source}")]
    InterfaceRejected {
        /// The requested (possibly truncated) name.
        name: String,
        /// The underlying error.
        source: io::Error,
    },

    /// Invalid interface name.
    #[error("invalid interface name: {0}")]
    InvalidName(String),

    /// One of the IPv4 address ioctls failed.
    #[error("{operation} on {interface} failed: {source}")]
    AddressAssignmentFailed {
        /// The interface name.
        interface: String,
        /// The ioctl that failed (e.g. "SIOCSIFNETMASK").
        operation: &'static str,
        /// The underlying error.
        source: io::Error,
    },

    /// The interface index could not be resolved.
    #[error("cannot resolve index of {interface}: {source}")]
    IndexResolutionFailed {
        /// The interface name.
        interface: String,
        /// The underlying error.
        source: io::Error,
    },

    /// Binding an IPv6 address to the interface failed.
    #[error("cannot bind {address}/{prefix_len} to {interface}: {source}")]
    AddressBindFailed {
        /// The interface name.
        interface: String,
        /// The address being bound.
        address: Ipv6Addr,
        /// The prefix length being bound.
        prefix_len: u8,
        /// The underlying error.
        source: io::Error,
    },

    /// A flags or MTU ioctl failed.
    #[error("ioctl {operation} on {interface} failed: {source}")]
    InterfaceControlFailed {
        /// The interface name.
        interface: String,
        /// The ioctl name.
        operation: &'static str,
        /// The underlying error.
        source: io::Error,
    },

    /// The kernel refused to install a route.
    #[error("cannot install route {destination}/{prefix_len}: {source}")]
    RouteInstallFailed {
        /// Route destination.
        destination: IpAddr,
        /// Route prefix length.
        prefix_len: u8,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// The kernel refused to remove a route.
    #[error("cannot remove route {destination}/{prefix_len}: {source}")]
    RouteRemoveFailed {
        /// Route destination.
        destination: IpAddr,
        /// Route prefix length.
        prefix_len: u8,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Kernel returned a non-zero status in an error envelope.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Reply was malformed.
    #[error("netlink protocol error: {0}")]
    NetlinkProtocolError(String),

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// No reply arrived before the deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// A control or netlink socket could not be created.
    #[error("socket setup failed: {0}")]
    SocketSetupFailed(#[source] io::Error),

    /// Invalid translation prefix.
    #[error("invalid translation prefix: {0}")]
    InvalidPrefix(String),

    /// Route destination prefix length is not a multiple of 8.
    #[error("prefix length {0} is not byte-aligned")]
    UnalignedPrefix(u8),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a kernel error from an errno value (negative, as carried by
    /// netlink error envelopes).
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Get the errno value if this error came from the kernel.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            Self::Io(source)
            | Self::DeviceUnavailable { source, .. }
            | Self::InterfaceRejected { source, .. }
            | Self::AddressAssignmentFailed { source, .. }
            | Self::IndexResolutionFailed { source, .. }
            | Self::AddressBindFailed { source, .. }
            | Self::InterfaceControlFailed { source, .. }
            | Self::SocketSetupFailed(source) => source.raw_os_error(),
            Self::RouteInstallFailed { source, .. } | Self::RouteRemoveFailed { source, .. } => {
                source.errno()
            }
            _ => None,
        }
    }

    /// Check if this is a "not found" error (ENOENT, ESRCH, ENODEV).
    pub fn is_not_found(&self) -> bool {
        matches!(self.errno(), Some(libc::ENOENT | libc::ESRCH | libc::ENODEV))
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM | libc::EACCES))
    }

    /// Check if this is an "already exists" error (EEXIST).
    pub fn is_already_exists(&self) -> bool {
        self.errno() == Some(libc::EEXIST)
    }

    /// Check if the reply wait expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
